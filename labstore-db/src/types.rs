// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database row types for experiments and runs.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// An experiment: a series of runs on one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    /// Database row ID
    pub id: i64,
    pub name: String,
    pub sample_name: String,
    pub start_time: SystemTime,
    /// Unset while the experiment is running
    pub end_time: Option<SystemTime>,
    /// Template used to name result tables
    pub name_template: String,
    /// Number of runs created so far
    pub run_counter: i64,
}

impl Experiment {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// One measurement execution within an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Database row ID
    pub id: i64,
    /// Owning experiment
    pub exp_id: i64,
    /// Friendly name given by the caller
    pub name: String,
    /// Name of the table holding this run's samples
    pub result_table_name: String,
    /// Experiment run counter at creation time
    pub result_counter: i64,
    pub run_timestamp: SystemTime,
}

/// Convert fractional Unix seconds to SystemTime.
pub(crate) fn unix_to_system_time(timestamp: f64) -> SystemTime {
    let offset = Duration::try_from_secs_f64(timestamp.abs()).unwrap_or_default();
    if timestamp >= 0.0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Convert SystemTime to fractional Unix seconds.
pub(crate) fn system_time_to_unix(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

pub(crate) fn now() -> f64 {
    system_time_to_unix(SystemTime::now())
}
