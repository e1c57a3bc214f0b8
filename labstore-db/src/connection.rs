// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::array::ArrayValue;
use crate::error::{Error, Result};
use crate::schema::{SCHEMA_SQL, SCHEMA_VERSION};

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access to an existing store
    ReadOnly,
    /// Read-write access to an existing store
    ReadWrite,
    /// Create the store (and its schema) if it doesn't exist
    Create,
}

/// Handle on an experiment store.
///
/// One handle is meant to be used by one writer at a time; there is no
/// internal locking.
pub struct LabDb {
    pub(crate) conn: Connection,
}

impl LabDb {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let flags = match mode {
            OpenMode::ReadOnly => {
                if !path.exists() {
                    return Err(Error::DatabaseNotFound(path.to_owned()));
                }
                OpenFlags::SQLITE_OPEN_READ_ONLY
            }
            OpenMode::ReadWrite => {
                if !path.exists() {
                    return Err(Error::DatabaseNotFound(path.to_owned()));
                }
                OpenFlags::SQLITE_OPEN_READ_WRITE
            }
            OpenMode::Create => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        };

        let conn = Connection::open_with_flags(path, flags).map_err(|e| Error::Connection {
            path: path.to_owned(),
            source: e,
        })?;
        let db = Self { conn };
        db.install_array_codec()?;

        if mode == OpenMode::Create {
            db.configure_pragmas()?;
            db.create_schema()?;
        } else {
            db.check_schema_version()?;
        }

        debug!("Opened database at {} ({:?})", path.display(), mode);
        Ok(db)
    }

    /// Create an in-memory store (for testing).
    ///
    /// The store is initialized with the full schema.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.install_array_codec()?;
        db.configure_pragmas()?;
        db.create_schema()?;
        debug!("Created in-memory database");
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        Ok(())
    }

    /// Register the array inspection functions on this handle.
    ///
    /// Arrays are encoded and decoded through their `ToSql`/`FromSql` impls;
    /// this makes the same codec available to SQL as `array_dtype(x)`,
    /// `array_ndim(x)` and `array_len(x)`. Registering again replaces the
    /// previous definitions, so calling it more than once is harmless.
    pub fn install_array_codec(&self) -> Result<()> {
        let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
        self.conn.create_scalar_function("array_dtype", 1, flags, |ctx| {
            Ok(ctx.get::<ArrayValue>(0)?.dtype().to_string())
        })?;
        self.conn.create_scalar_function("array_ndim", 1, flags, |ctx| {
            Ok(ctx.get::<ArrayValue>(0)?.shape().len() as i64)
        })?;
        self.conn.create_scalar_function("array_len", 1, flags, |ctx| {
            Ok(ctx.get::<ArrayValue>(0)?.len() as i64)
        })?;
        Ok(())
    }

    /// Create the `experiments` and `runs` tables.
    pub fn create_schema(&self) -> Result<()> {
        self.check_schema_version()?;
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("Created database schema");
        Ok(())
    }

    fn check_schema_version(&self) -> Result<()> {
        let found = self.schema_version()?;
        if found != 0 && found != SCHEMA_VERSION {
            return Err(Error::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
        Ok(())
    }

    /// Schema version recorded in the file, 0 for a fresh file.
    pub fn schema_version(&self) -> Result<i32> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    /// Get raw connection (for advanced usage).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Check if the store has the experiment tables.
    pub fn has_schema(&self) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('experiments', 'runs')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 2)
    }

    /// Check whether a table called `name` exists. Table names are
    /// case-insensitive.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Check whether any schema object (table, index, view or trigger)
    /// already uses `name`. They all share one namespace.
    pub(crate) fn name_in_use(&self, name: &str) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_has_schema() {
        let db = LabDb::open_memory().unwrap();
        assert!(db.has_schema().unwrap());
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn codec_install_is_idempotent() {
        let db = LabDb::open_memory().unwrap();
        db.install_array_codec().unwrap();
        db.install_array_codec().unwrap();
        let array = ArrayValue::from(ndarray::ArrayD::from_elem(ndarray::IxDyn(&[2, 3]), 0u8));
        let n: i64 = db
            .connection()
            .query_row("SELECT array_ndim(?1)", [&array], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn object_names_ignore_case() {
        let db = LabDb::open_memory().unwrap();
        assert!(db.table_exists("RUNS").unwrap());
        assert!(!db.table_exists("IndexRunsExperiment").unwrap());
        assert!(db.name_in_use("indexrunsexperiment").unwrap());
        assert!(!db.name_in_use("sweep-1-1").unwrap());
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(matches!(
            LabDb::open(&path, OpenMode::ReadWrite),
            Err(Error::DatabaseNotFound(_))
        ));
    }

    #[test]
    fn unopenable_location_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("dir.db");
        assert!(matches!(
            LabDb::open(&path, OpenMode::Create),
            Err(Error::Connection { .. })
        ));
    }

    #[test]
    fn foreign_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let db = LabDb::open(&path, OpenMode::Create).unwrap();
            db.connection()
                .pragma_update(None, "user_version", 99)
                .unwrap();
        }
        assert!(matches!(
            LabDb::open(&path, OpenMode::ReadWrite),
            Err(Error::SchemaVersionMismatch { found: 99, .. })
        ));
    }
}
