// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use labstore_db::{Experiment, LabDb, Run};

use crate::config::Config;
use crate::error::Result;

/// Inspect and extend an experiment database.
#[derive(Debug, Parser)]
#[command(name = "labstore", version, about)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub(crate) enum Command {
    /// Create the database
    Init,
    /// List experiments
    Experiments,
    /// List runs, optionally of one experiment
    Runs { exp_id: Option<i64> },
    /// Register an experiment
    NewExperiment {
        name: String,
        sample: String,
        /// Result-table name template (defaults to the configured one)
        template: Option<String>,
    },
    /// Create a run and its result table
    NewRun { exp_id: i64, name: String },
    /// Print the newest result table of an experiment
    LastRun { exp_id: i64 },
    /// Record the end time of an experiment
    Finish { exp_id: i64 },
}

impl Command {
    pub(crate) fn run(&self, db: &LabDb, config: &Config, out: &mut impl Write) -> Result<()> {
        match self {
            Command::Init => {
                writeln!(out, "schema version {}", db.schema_version()?)?;
            }
            Command::Experiments => {
                for exp in db.experiments()? {
                    write_experiment(out, &exp)?;
                }
            }
            Command::Runs { exp_id } => {
                for run in db.runs(*exp_id)? {
                    write_run(out, &run)?;
                }
            }
            Command::NewExperiment {
                name,
                sample,
                template,
            } => {
                let template = template.as_deref().unwrap_or(&config.name_template);
                let id = db.create_experiment(name, sample, Some(template))?;
                log::info!("Registered experiment {id} ({name})");
                writeln!(out, "{id}")?;
            }
            Command::NewRun { exp_id, name } => {
                let (run_id, table) = db.create_run(*exp_id, name)?;
                log::info!("Created run {run_id} in experiment {exp_id}");
                writeln!(out, "{run_id}\t{table}")?;
            }
            Command::LastRun { exp_id } => {
                writeln!(out, "{}", db.get_last_run(*exp_id)?)?;
            }
            Command::Finish { exp_id } => {
                db.finish_experiment(*exp_id)?;
                log::info!("Finished experiment {exp_id}");
            }
        }
        Ok(())
    }
}

fn seconds(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn write_experiment(out: &mut impl Write, exp: &Experiment) -> std::io::Result<()> {
    let end = exp
        .end_time
        .map(|t| format!("{:.3}", seconds(t)))
        .unwrap_or_else(|| "running".into());
    writeln!(
        out,
        "{}\t{}\t{}\truns={}\tstart={:.3}\tend={end}",
        exp.id,
        exp.name,
        exp.sample_name,
        exp.run_counter,
        seconds(exp.start_time),
    )
}

fn write_run(out: &mut impl Write, run: &Run) -> std::io::Result<()> {
    writeln!(
        out,
        "{}\texp={}\t{}\t{}",
        run.id, run.exp_id, run.name, run.result_table_name
    )
}
