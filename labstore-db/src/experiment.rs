// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Experiment registry.

use rusqlite::params;
use tracing::debug;

use crate::connection::LabDb;
use crate::error::{Error, Result};
use crate::ident::{DEFAULT_NAME_TEMPLATE, NameTemplate};
use crate::query::one;
use crate::types::{Experiment, now, unix_to_system_time};
use crate::value::Value;

const SELECT_EXPERIMENT: &str = r#"
    SELECT exp_id, name, sample_name, start_time, end_time, format_string, run_counter
    FROM experiments
"#;

fn experiment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Experiment> {
    Ok(Experiment {
        id: row.get(0)?,
        name: row.get(1)?,
        sample_name: row.get(2)?,
        start_time: unix_to_system_time(row.get(3)?),
        end_time: row.get::<_, Option<f64>>(4)?.map(unix_to_system_time),
        name_template: row.get(5)?,
        run_counter: row.get(6)?,
    })
}

impl LabDb {
    /// Register a new experiment and return its ID.
    ///
    /// `name_template` formats result-table names from `(run name,
    /// experiment id, run counter)`; it defaults to `"{}-{}-{}"`.
    pub fn create_experiment(
        &self,
        name: &str,
        sample_name: &str,
        name_template: Option<&str>,
    ) -> Result<i64> {
        let template = NameTemplate::parse(name_template.unwrap_or(DEFAULT_NAME_TEMPLATE))?;
        self.execute_atomic(
            r#"
            INSERT INTO experiments (name, sample_name, start_time, format_string, run_counter)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
            params![name, sample_name, now(), template.as_str()],
        )?;
        let id = self.last_insert_rowid();
        debug!("Created experiment {id} ({name}, sample {sample_name})");
        Ok(id)
    }

    /// Record the end time of an experiment.
    ///
    /// An experiment can only be finished once.
    pub fn finish_experiment(&self, exp_id: i64) -> Result<()> {
        self.atomic(|db| {
            let end =
                db.select_one_where("experiments", "end_time", "exp_id", &Value::Integer(exp_id))?;
            if !end.is_null() {
                return Err(Error::ExperimentFinished(exp_id));
            }
            db.execute(
                "UPDATE experiments SET end_time = ?1 WHERE exp_id = ?2",
                params![now(), exp_id],
            )?;
            Ok(())
        })?;
        debug!("Finished experiment {exp_id}");
        Ok(())
    }

    /// Current run counter of an experiment.
    pub fn get_run_counter(&self, exp_id: i64) -> Result<i64> {
        let rows = self.query(
            "SELECT run_counter FROM experiments WHERE exp_id = ?1",
            [exp_id],
        )?;
        match one(rows, "run_counter") {
            Ok(Value::Integer(counter)) => Ok(counter),
            Ok(other) => Err(Error::NotFound(format!(
                "run counter of experiment {exp_id} (found {})",
                other.kind_name()
            ))),
            Err(Error::NotFound(_)) => Err(Error::NotFound(format!("experiment {exp_id}"))),
            Err(Error::AmbiguousResult { count, .. }) => Err(Error::AmbiguousResult {
                what: format!("experiment {exp_id}"),
                count,
            }),
            Err(e) => Err(e),
        }
    }

    /// Look up one experiment.
    pub fn get_experiment(&self, exp_id: i64) -> Result<Experiment> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_EXPERIMENT} WHERE exp_id = ?1"))?;
        match stmt.query_row([exp_id], experiment_from_row) {
            Ok(e) => Ok(e),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(Error::NotFound(format!("experiment {exp_id}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All experiments, oldest first.
    pub fn experiments(&self) -> Result<Vec<Experiment>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{SELECT_EXPERIMENT} ORDER BY exp_id"))?;
        let mut experiments = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            experiments.push(experiment_from_row(row)?);
        }
        Ok(experiments)
    }
}
