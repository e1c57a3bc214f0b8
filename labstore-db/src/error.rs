// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for lab store operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::param::ParamKind;

/// Result type for lab store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during lab store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open or create the backing file
    #[error("Failed to open database at '{path}': {source}")]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Database file not found
    #[error("Database not found at: {0}")]
    DatabaseNotFound(PathBuf),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: i32, found: i32 },

    /// A statement or commit failed; the enclosing transaction was rolled back
    #[error("Transaction rolled back: {source}")]
    Transaction {
        #[source]
        source: Box<Error>,
    },

    /// Expected exactly one row, found none
    #[error("Not found: {0}")]
    NotFound(String),

    /// Expected exactly one row, found several
    #[error("Expected one result for {what}, found {count}")]
    AmbiguousResult { what: String, count: usize },

    /// Result table already exists
    #[error("Table already exists: {0}")]
    DuplicateTable(String),

    /// Column already exists on a result table
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists { table: String, column: String },

    /// Number of values does not match the number of parameters
    #[error("Expected {expected} values, got {found}{}", row_suffix(.row))]
    ValueCountMismatch {
        expected: usize,
        found: usize,
        row: Option<usize>,
    },

    /// Value kind does not match the declared parameter kind
    #[error("Parameter '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: ParamKind,
        found: &'static str,
    },

    /// NaN cannot be stored as a scalar; SQLite would turn it into NULL
    #[error("Parameter '{column}' got NaN")]
    NotANumber { column: String },

    /// Parameter kind name not recognized
    #[error("Unknown parameter kind: '{0}'")]
    UnknownKind(String),

    /// Table or column name rejected by the identifier allow-list
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Malformed name template
    #[error("Invalid name template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// Array blob could not be encoded or decoded
    #[error("Array codec error: {0}")]
    ArrayCodec(String),

    /// Experiment already has an end time
    #[error("Experiment {0} is already finished")]
    ExperimentFinished(i64),

    /// Bulk insert called without any rows
    #[error("No rows to insert into '{0}'")]
    EmptyInsert(String),
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" in row {row}"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn transaction(source: Error) -> Self {
        match source {
            e @ Error::Transaction { .. } => e,
            e => Error::Transaction {
                source: Box::new(e),
            },
        }
    }

    /// The innermost error, looking through transaction rollbacks.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Transaction { source } => source.root_cause(),
            e => e,
        }
    }
}
