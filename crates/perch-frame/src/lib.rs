//! Columnar tables for the perch analysis pipeline
//!
//! This crate loads the two observation CSV files into immutable [`Table`]
//! snapshots over polars DataFrames and provides the cleaning and
//! aggregation steps the later stages consume.
//!
//! # Example
//!
//! ```rust
//! use perch_frame::{aggregate, Table};
//! use polars::prelude::*;
//!
//! let frame = df![
//!     "risk" => [0.0, 1.0, 1.0],
//!     "reward" => [1.0, 0.0, 1.0],
//! ]?;
//! let table = Table::new("events", frame);
//! let crosstab = aggregate::contingency(&table, "risk", "reward")?;
//! assert_eq!(crosstab.total(), 3);
//! # Ok::<(), perch_core::Error>(())
//! ```

pub mod aggregate;
pub mod clean;
pub mod loader;
pub mod schema;
pub mod table;

pub use aggregate::{
    bucketize, bucketize_column, contingency, describe, group_mean, samples_by_group,
    value_counts, BucketAssignment, Buckets, ContingencyTable, Describe, GroupMean, GroupMeans,
    ValueCounts,
};
pub use clean::{coerce_categorical, derive_season, MonthRange, Season, SeasonMapping};
pub use loader::{load_csv, read_csv};
pub use schema::{FieldKind, Schema, EVENT_DATE_COLUMNS, WINDOW_DATE_COLUMNS};
pub use table::{format_number, Categories, Level, Table};
