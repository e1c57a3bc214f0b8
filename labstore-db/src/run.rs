// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Runs and their result tables.
//!
//! Every run owns one table whose name is derived from the experiment's name
//! template. The table starts with only an `id` column; parameters are added
//! as columns later and samples are appended as rows.

use rusqlite::{ErrorCode, params, params_from_iter};
use tracing::debug;

use crate::connection::LabDb;
use crate::error::{Error, Result};
use crate::ident::{NameTemplate, quote, validate_column, validate_table};
use crate::param::ParamSpec;
use crate::query::{Row, one};
use crate::types::{Run, now, unix_to_system_time};
use crate::value::Value;

/// SQLite's default cap on bound variables per statement.
const MAX_VARIABLES: usize = 32766;

const SELECT_RUN: &str = r#"
    SELECT run_id, exp_id, name, result_table_name, result_counter, run_timestamp
    FROM runs
"#;

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        exp_id: row.get(1)?,
        name: row.get(2)?,
        result_table_name: row.get(3)?,
        result_counter: row.get(4)?,
        run_timestamp: unix_to_system_time(row.get(5)?),
    })
}

fn column_list(parameters: &[ParamSpec]) -> Result<String> {
    Ok(parameters
        .iter()
        .map(|p| validate_column(p.name()).map(quote))
        .collect::<Result<Vec<_>>>()?
        .join(", "))
}

fn check_row(parameters: &[ParamSpec], values: &[Value], row: Option<usize>) -> Result<()> {
    if values.len() != parameters.len() {
        return Err(Error::ValueCountMismatch {
            expected: parameters.len(),
            found: values.len(),
            row,
        });
    }
    parameters
        .iter()
        .zip(values)
        .try_for_each(|(p, v)| v.check_kind(p))
}

fn is_unique_violation(e: &Error) -> bool {
    matches!(
        e,
        Error::Sqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl LabDb {
    /// Register a run without touching the experiment's counter.
    ///
    /// Reads the counter and name template, formats the table name with the
    /// incremented counter and inserts the run row. Returns `(counter,
    /// table_name, run_id)`. Callers must persist the counter with
    /// [`LabDb::update_run_counter`]; [`LabDb::create_run`] does all of it.
    pub fn insert_run(&self, exp_id: i64, name: &str) -> Result<(i64, String, i64)> {
        let values = self.select_many_where(
            "experiments",
            &["run_counter", "format_string"],
            "exp_id",
            &Value::Integer(exp_id),
        )?;
        let (counter, template) = match values.as_slice() {
            [Value::Integer(counter), Value::Text(template)] => {
                (*counter + 1, NameTemplate::parse(template)?)
            }
            _ => {
                return Err(Error::NotFound(format!(
                    "run counter and template of experiment {exp_id}"
                )));
            }
        };
        let table = template.format(name, exp_id, counter);
        validate_table(&table)?;

        let inserted = self.execute(
            r#"
            INSERT INTO runs (name, exp_id, result_table_name, result_counter, run_timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![name, exp_id, table, counter, now()],
        );
        match inserted {
            Err(e) if is_unique_violation(&e) => Err(Error::DuplicateTable(table)),
            Err(e) => Err(e),
            Ok(_) => Ok((counter, table, self.last_insert_rowid())),
        }
    }

    /// Persist an experiment's run counter.
    pub fn update_run_counter(&self, exp_id: i64, new_counter: i64) -> Result<()> {
        let updated = self.execute(
            "UPDATE experiments SET run_counter = ?1 WHERE exp_id = ?2",
            params![new_counter, exp_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("experiment {exp_id}")));
        }
        Ok(())
    }

    /// Create a result table with an `id` key plus one column per parameter.
    ///
    /// When `values` is given the first row is inserted as well, in the same
    /// atomic unit as the table creation.
    pub fn create_run_table(
        &self,
        table_name: &str,
        parameters: &[ParamSpec],
        values: Option<&[Value]>,
    ) -> Result<()> {
        validate_table(table_name)?;
        if self.name_in_use(table_name)? {
            return Err(Error::DuplicateTable(table_name.to_owned()));
        }
        let mut columns = vec!["id INTEGER PRIMARY KEY".to_owned()];
        for (i, p) in parameters.iter().enumerate() {
            validate_column(p.name())?;
            if parameters[..i]
                .iter()
                .any(|q| q.name().eq_ignore_ascii_case(p.name()))
            {
                return Err(Error::ColumnExists {
                    table: table_name.to_owned(),
                    column: p.name().to_owned(),
                });
            }
            columns.push(p.column_def());
        }
        if let Some(values) = values {
            check_row(parameters, values, None)?;
        }

        let sql = format!(
            "CREATE TABLE {} ({})",
            quote(table_name),
            columns.join(", ")
        );
        match values {
            Some(values) if !parameters.is_empty() => self.atomic(|db| {
                db.execute(&sql, [])?;
                db.insert_values(table_name, parameters, values)?;
                Ok(())
            })?,
            _ => {
                self.execute(&sql, [])?;
            }
        }
        debug!("Created result table {table_name}");
        Ok(())
    }

    /// Create a run: register it, advance the experiment's counter and
    /// create its (empty) result table, all or nothing.
    ///
    /// Returns `(run_id, table_name)`. Calling this twice creates two runs.
    pub fn create_run(&self, exp_id: i64, name: &str) -> Result<(i64, String)> {
        let (run_id, table) = self.atomic(|db| {
            let (counter, table, run_id) = db.insert_run(exp_id, name)?;
            db.update_run_counter(exp_id, counter)?;
            db.create_run_table(&table, &[], None)?;
            Ok((run_id, table))
        })?;
        debug!("Created run {run_id} of experiment {exp_id} -> {table}");
        Ok((run_id, table))
    }

    /// Add one column per parameter to an existing result table.
    ///
    /// Each column is added in its own atomic step; wrap the call in
    /// [`LabDb::atomic`] to make the whole set all-or-nothing.
    pub fn add_parameter(&self, table_name: &str, parameters: &[ParamSpec]) -> Result<()> {
        validate_table(table_name)?;
        let mut existing = self.table_columns(table_name)?;
        for p in parameters {
            validate_column(p.name())?;
            if existing.iter().any(|c| c.eq_ignore_ascii_case(p.name())) {
                return Err(Error::ColumnExists {
                    table: table_name.to_owned(),
                    column: p.name().to_owned(),
                });
            }
            self.execute_atomic(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote(table_name),
                    p.column_def()
                ),
                [],
            )?;
            existing.push(p.name().to_owned());
        }
        Ok(())
    }

    /// Insert one row, binding `values[i]` to `parameters[i]`.
    ///
    /// Returns the new row's ID. Columns not named in `parameters` stay null.
    pub fn insert_values(
        &self,
        table_name: &str,
        parameters: &[ParamSpec],
        values: &[Value],
    ) -> Result<i64> {
        validate_table(table_name)?;
        check_row(parameters, values, None)?;
        let sql = if parameters.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(table_name))
        } else {
            let placeholders = vec!["?"; parameters.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote(table_name),
                column_list(parameters)?
            )
        };
        self.execute(&sql, params_from_iter(values))?;
        Ok(self.last_insert_rowid())
    }

    /// Insert several rows, each holding one value per parameter.
    ///
    /// Every row is checked up front; rows are written with multi-row
    /// `INSERT` statements inside one atomic block. Returns the ID of the
    /// last inserted row.
    pub fn insert_many_values<R: AsRef<[Value]>>(
        &self,
        table_name: &str,
        parameters: &[ParamSpec],
        rows: &[R],
    ) -> Result<i64> {
        validate_table(table_name)?;
        if rows.is_empty() {
            return Err(Error::EmptyInsert(table_name.to_owned()));
        }
        for (i, row) in rows.iter().enumerate() {
            check_row(parameters, row.as_ref(), Some(i))?;
        }

        if parameters.is_empty() {
            return self.atomic(|db| {
                let mut last = 0;
                for _ in rows {
                    last = db.insert_values(table_name, parameters, &[])?;
                }
                Ok(last)
            });
        }

        let group = format!("({})", vec!["?"; parameters.len()].join(", "));
        let prefix = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote(table_name),
            column_list(parameters)?
        );
        let rows_per_statement = (MAX_VARIABLES / parameters.len()).max(1);

        self.atomic(|db| {
            for chunk in rows.chunks(rows_per_statement) {
                let sql = format!("{prefix}{}", vec![group.as_str(); chunk.len()].join(", "));
                db.execute(
                    &sql,
                    params_from_iter(chunk.iter().flat_map(|r| r.as_ref().iter())),
                )?;
            }
            Ok(db.last_insert_rowid())
        })
    }

    /// Result-table name of the most recent run of an experiment.
    pub fn get_last_run(&self, exp_id: i64) -> Result<String> {
        let rows = self.query(
            r#"
            SELECT result_table_name
            FROM runs
            WHERE exp_id = ?1
            ORDER BY run_timestamp DESC, run_id DESC
            LIMIT 1
            "#,
            [exp_id],
        )?;
        match one(rows, "result_table_name") {
            Ok(Value::Text(name)) => Ok(name),
            Ok(_) | Err(Error::NotFound(_)) => {
                Err(Error::NotFound(format!("runs of experiment {exp_id}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Read parameter columns from a result table.
    ///
    /// Row-ID bounds: with both `start` and `end`, rows with
    /// `start < id <= end`; with only `start`, rows with `id >= start`; with
    /// only `end`, rows with `id <= end`; otherwise every row. Rows come back
    /// in ID order with values decoded per parameter kind. Without
    /// parameters only the `id` column is returned.
    pub fn get_data(
        &self,
        table_name: &str,
        parameters: &[ParamSpec],
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Vec<Row>> {
        validate_table(table_name)?;
        let (columns, kinds) = if parameters.is_empty() {
            ("id".to_owned(), Vec::new())
        } else {
            (
                column_list(parameters)?,
                parameters.iter().map(|p| Some(p.kind())).collect(),
            )
        };
        let (filter, bounds) = match (start, end) {
            (Some(start), Some(end)) => ("WHERE id > ?1 AND id <= ?2", vec![start, end]),
            (Some(start), None) => ("WHERE id >= ?1", vec![start]),
            (None, Some(end)) => ("WHERE id <= ?1", vec![end]),
            (None, None) => ("", Vec::new()),
        };
        let sql = format!(
            "SELECT {columns} FROM {} {filter} ORDER BY id",
            quote(table_name)
        );
        self.query_as(&sql, params_from_iter(bounds), &kinds)
    }

    /// Look up one run.
    pub fn get_run(&self, run_id: i64) -> Result<Run> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_RUN} WHERE run_id = ?1"))?;
        match stmt.query_row([run_id], run_from_row) {
            Ok(run) => Ok(run),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(Error::NotFound(format!("run {run_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs of one experiment, or of all experiments, oldest first.
    pub fn runs(&self, exp_id: Option<i64>) -> Result<Vec<Run>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_RUN} WHERE ?1 IS NULL OR exp_id = ?1 ORDER BY run_id"
        ))?;
        let mut runs = Vec::new();
        let mut rows = stmt.query([exp_id])?;
        while let Some(row) = rows.next()? {
            runs.push(run_from_row(row)?);
        }
        Ok(runs)
    }

    /// Column names of a table, in declaration order.
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<String>> {
        validate_table(table_name)?;
        if !self.table_exists(table_name)? {
            return Err(Error::NotFound(format!("table {table_name}")));
        }
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let mut columns = Vec::new();
        let mut rows = stmt.query([table_name])?;
        while let Some(row) = rows.next()? {
            columns.push(row.get(0)?);
        }
        Ok(columns)
    }

    /// Number of rows stored in a result table.
    pub fn count_rows(&self, table_name: &str) -> Result<u64> {
        validate_table(table_name)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(table_name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
