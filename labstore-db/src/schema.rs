// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database schema definitions for the experiment store.
//!
//! Result tables are not listed here: each run creates its own table at
//! runtime, see [`crate::LabDb::create_run_table`].

/// Experiments and runs.
pub const SCHEMA_SQL: &str = r#"
create table if not exists experiments (
    exp_id        integer primary key autoincrement not null,
    name          text not null,
    sample_name   text not null,
    start_time    real not null,
    end_time      real,
    format_string text not null,
    run_counter   integer not null default 0 check (run_counter >= 0)
);

create table if not exists runs (
    run_id            integer primary key autoincrement not null,
    name              text not null,
    exp_id            integer not null,
    result_table_name text unique not null collate nocase,
    result_counter    integer not null,
    run_timestamp     real not null,
    foreign key (exp_id) references experiments(exp_id)
);

create index if not exists IndexRunsExperiment on runs(exp_id, run_timestamp);
"#;

/// Schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;
