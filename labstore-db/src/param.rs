// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Parameter specifications: the typed columns of a result table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ident::{quote, validate_column};

/// Kind of value a parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Real,
    Text,
    Boolean,
    /// Dense numeric array, stored as an encoded blob
    Array,
}

impl ParamKind {
    /// Declared SQL column type.
    pub fn sql_type(self) -> &'static str {
        match self {
            ParamKind::Integer => "INTEGER",
            ParamKind::Real => "REAL",
            ParamKind::Text => "TEXT",
            ParamKind::Boolean => "BOOLEAN",
            ParamKind::Array => "ARRAY",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

impl FromStr for ParamKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(ParamKind::Integer),
            "real" | "float" | "numeric" => Ok(ParamKind::Real),
            "text" => Ok(ParamKind::Text),
            "boolean" | "bool" => Ok(ParamKind::Boolean),
            "array" => Ok(ParamKind::Array),
            _ => Err(Error::UnknownKind(s.to_owned())),
        }
    }
}

/// Describes one measured or derived quantity of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParamSpec")]
pub struct ParamSpec {
    name: String,
    kind: ParamKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, serde_json::Value>,
}

/// Unchecked wire form of [`ParamSpec`].
#[derive(Deserialize)]
struct RawParamSpec {
    name: String,
    kind: ParamKind,
    #[serde(default)]
    metadata: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawParamSpec> for ParamSpec {
    type Error = Error;

    fn try_from(raw: RawParamSpec) -> Result<Self> {
        let mut spec = ParamSpec::new(raw.name, raw.kind)?;
        spec.metadata = raw.metadata;
        Ok(spec)
    }
}

impl ParamSpec {
    /// Create a parameter, validating `name` as a column identifier.
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Result<Self> {
        let name = name.into();
        validate_column(&name)?;
        if name.eq_ignore_ascii_case("id") {
            return Err(Error::InvalidIdentifier(name));
        }
        Ok(Self {
            name,
            kind,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Column definition fragment for `CREATE TABLE` / `ADD COLUMN`.
    pub fn column_def(&self) -> String {
        format!("{} {}", quote(&self.name), self.kind.sql_type())
    }
}
