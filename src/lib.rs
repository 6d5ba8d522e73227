//! perch: bat landing and rat activity analysis
//!
//! Loads the event table (one row per bat landing) and the window table
//! (one row per 30-minute observation window), then runs four stages over
//! them:
//!
//! - [`pipeline::inspect`]: shapes, previews, types and missing values
//! - [`pipeline::describe`]: frequencies, cross-tabulation and bucketed means
//! - [`pipeline::infer`]: chi-square, Mann-Whitney U, logistic regression and
//!   Spearman correlation on the pooled data
//! - [`pipeline::seasonal`]: the same questions split by winter and spring,
//!   written to a summary file
//!
//! The statistics live in the workspace crates re-exported here.

pub mod config;
pub mod pipeline;

pub use config::{AnalysisConfig, BucketConfig};
pub use pipeline::{
    DescribeReport, Dataset, InspectReport, SeasonalReport, Stage, TestReport, SUMMARY_FILE,
};

pub use perch_core as core;
pub use perch_effect as effect;
pub use perch_frame as frame;
pub use perch_inference as inference;
pub use perch_report as report;
