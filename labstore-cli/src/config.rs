// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use labstore_db::{DEFAULT_NAME_TEMPLATE, LabDb, NameTemplate, OpenMode};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

fn default_db_path() -> PathBuf {
    PathBuf::from("experiments.db")
}

fn default_name_template() -> String {
    DEFAULT_NAME_TEMPLATE.into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_create() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Location of the experiment database
    #[serde(default = "default_db_path")]
    pub(crate) db_path: PathBuf,

    /// Result-table name template for new experiments
    #[serde(default = "default_name_template")]
    pub(crate) name_template: String,

    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub(crate) log_level: String,

    /// Create the database if it does not exist yet
    #[serde(default = "default_create")]
    pub(crate) create: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            name_template: default_name_template(),
            log_level: default_log_level(),
            create: default_create(),
        }
    }
}

impl Config {
    pub(crate) fn from_file(path: &Path) -> Result<Self> {
        let contents = read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Err(e) = NameTemplate::parse(&self.name_template) {
            return Err(ConfigError::Invalid {
                reason: e.to_string(),
            }
            .into());
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "db_path must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Open the configured database.
    pub(crate) fn open(&self) -> Result<LabDb> {
        let mode = if self.create {
            OpenMode::Create
        } else {
            OpenMode::ReadWrite
        };
        Ok(LabDb::open(&self.db_path, mode)?)
    }
}

/// Load settings from `$LABSTORE_CONFIG`, else `labstore.toml` if present,
/// else defaults.
pub(crate) fn load() -> Result<Config> {
    match std::env::var("LABSTORE_CONFIG") {
        Ok(settings_file) => Config::from_file(Path::new(&settings_file)),
        Err(_) => {
            let local = Path::new("labstore.toml");
            if local.exists() {
                Config::from_file(local)
            } else {
                Ok(Config::default())
            }
        }
    }
}
