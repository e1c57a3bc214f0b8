// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! `labstore`: inspect and extend an experiment database from the shell.

mod commands;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use commands::Cli;
use error::Result;

fn inner_main(cli: Cli) -> Result<()> {
    let config = config::load()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    log::debug!("Using database {}", config.db_path.display());
    let db = config.open()?;
    cli.command.run(&db, &config, &mut std::io::stdout().lock())
}

fn main() -> ExitCode {
    match inner_main(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("labstore: {e}");
            ExitCode::FAILURE
        }
    }
}
