// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Statement execution and atomic blocks.
//!
//! Outside of an atomic block SQLite runs in autocommit mode, so a plain
//! [`LabDb::execute`] is applied as soon as it returns. Operations that need
//! several statements to land together go through [`LabDb::atomic`].

use rusqlite::Params;
use tracing::{trace, warn};

use crate::connection::LabDb;
use crate::error::{Error, Result};
use crate::param::ParamKind;
use crate::query::{Row, collect_rows};

impl LabDb {
    /// Run one statement, binding positional `params`. Returns affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        trace!(sql, "execute");
        Ok(self.conn.execute(sql, params)?)
    }

    /// Row ID of the most recent successful insert on this handle.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Run a query and collect all rows.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Row>> {
        self.query_as(sql, params, &[])
    }

    /// Run a query, decoding column `i` as `kinds[i]` where given.
    pub(crate) fn query_as<P: Params>(
        &self,
        sql: &str,
        params: P,
        kinds: &[Option<ParamKind>],
    ) -> Result<Vec<Row>> {
        trace!(sql, "query");
        let mut stmt = self.conn.prepare(sql)?;
        collect_rows(&mut stmt, params, kinds)
    }

    /// Run one statement in its own transaction.
    ///
    /// Commits on success. On failure the transaction is rolled back and the
    /// original error is returned wrapped in [`Error::Transaction`]. Inside
    /// an enclosing [`LabDb::atomic`] block the statement joins that block.
    pub fn execute_atomic<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.atomic(|db| db.execute(sql, params))
    }

    /// Whether an atomic block is currently open on this handle.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Run `f` as one atomic unit.
    ///
    /// Everything `f` executes is committed once when it returns `Ok`, or
    /// rolled back as a whole when it returns `Err`, in which case the error
    /// comes back as [`Error::Transaction`]. Nested blocks are folded into
    /// the outermost one, which alone decides commit or rollback.
    pub fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        if self.in_transaction() {
            return f(self);
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| Error::transaction(e.into()))?;
        match f(self) {
            Ok(value) => {
                tx.commit().map_err(|e| Error::transaction(e.into()))?;
                Ok(value)
            }
            Err(e) => {
                warn!("Rolling back transaction: {e}");
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {rollback}");
                }
                Err(Error::transaction(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;

    fn db_with_table() -> LabDb {
        let db = LabDb::open_memory().unwrap();
        db.execute("CREATE TABLE t (x INTEGER UNIQUE)", []).unwrap();
        db
    }

    fn count(db: &LabDb) -> i64 {
        db.connection()
            .query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn execute_binds_params() {
        let db = db_with_table();
        assert_eq!(
            db.execute("INSERT INTO t (x) VALUES (?1)", params![7])
                .unwrap(),
            1
        );
        let rows = db.query("SELECT x FROM t", []).unwrap();
        assert_eq!(rows[0].get("x"), Some(&crate::Value::Integer(7)));
    }

    #[test]
    fn execute_atomic_wraps_failure() {
        let db = db_with_table();
        db.execute_atomic("INSERT INTO t (x) VALUES (1)", [])
            .unwrap();
        let err = db
            .execute_atomic("INSERT INTO t (x) VALUES (1)", [])
            .unwrap_err();
        assert!(matches!(err, Error::Transaction { .. }));
        assert!(matches!(err.root_cause(), Error::Sqlite(_)));
        assert!(!db.in_transaction());
        assert_eq!(count(&db), 1);
    }

    #[test]
    fn atomic_block_is_all_or_nothing() {
        let db = db_with_table();
        let err = db
            .atomic(|db| {
                db.execute("INSERT INTO t (x) VALUES (1)", [])?;
                db.execute("INSERT INTO t (x) VALUES (2)", [])?;
                db.execute("INSERT INTO t (x) VALUES (1)", [])?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Transaction { .. }));
        assert_eq!(count(&db), 0);

        db.atomic(|db| {
            db.execute("INSERT INTO t (x) VALUES (1)", [])?;
            db.execute_atomic("INSERT INTO t (x) VALUES (2)", [])
        })
        .unwrap();
        assert_eq!(count(&db), 2);
    }

    #[test]
    fn nested_failure_rolls_back_outer_block() {
        let db = db_with_table();
        let result = db.atomic(|db| {
            db.execute("INSERT INTO t (x) VALUES (5)", [])?;
            db.atomic(|db| db.execute("INSERT INTO nowhere VALUES (1)", []))
        });
        assert!(result.is_err());
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn non_database_errors_also_roll_back() {
        let db = db_with_table();
        let err = db
            .atomic(|db| -> Result<()> {
                db.execute("INSERT INTO t (x) VALUES (3)", [])?;
                Err(Error::NotFound("something".into()))
            })
            .unwrap_err();
        assert!(matches!(err.root_cause(), Error::NotFound(_)));
        assert_eq!(count(&db), 0);
    }
}
