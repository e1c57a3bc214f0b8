// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! SQLite store for laboratory experiments, runs and measured values.
//!
//! An experiment groups runs on one sample. Every run gets its own result
//! table, named from the experiment's template, whose columns are the
//! measured parameters and whose rows are the samples. Values are scalars
//! or dense numeric arrays; arrays are stored as self-describing blobs.
//!
//! # Key Features
//!
//! - Experiment registry with per-experiment run counters
//! - Atomic run creation (run row, counter and table land together)
//! - Typed parameters, checked against values at bind time
//! - Row-range reads that decode arrays back to `ndarray` arrays
//! - In-memory database for testing
//!
//! # Example
//!
//! ```no_run
//! use labstore_db::{LabDb, OpenMode, ParamKind, ParamSpec, Value};
//!
//! # fn main() -> labstore_db::Result<()> {
//! let db = LabDb::open("experiments.db", OpenMode::Create)?;
//! let exp = db.create_experiment("qubit-sweep", "sample-1", None)?;
//! let (_run_id, table) = db.create_run(exp, "sweep")?;
//!
//! let a = ParamSpec::new("a", ParamKind::Integer)?;
//! db.add_parameter(&table, std::slice::from_ref(&a))?;
//! db.insert_values(&table, std::slice::from_ref(&a), &[Value::from(1)])?;
//!
//! for row in db.get_data(&table, &[a], None, None)? {
//!     println!("{:?}", row.get("a"));
//! }
//! db.finish_experiment(exp)?;
//! # Ok(())
//! # }
//! ```

mod array;
mod connection;
mod error;
mod experiment;
mod ident;
mod param;
mod query;
mod run;
mod schema;
mod transaction;
mod types;
mod value;

pub use array::{ArrayValue, DType};
pub use connection::{LabDb, OpenMode};
pub use error::{Error, Result};
pub use ident::{DEFAULT_NAME_TEMPLATE, NameTemplate, validate_column, validate_table};
pub use param::{ParamKind, ParamSpec};
pub use query::{Row, many, one};
pub use schema::SCHEMA_VERSION;
pub use types::{Experiment, Run};
pub use value::Value;

pub use ndarray;
