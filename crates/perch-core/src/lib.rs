//! Shared foundations for the perch analysis crates
//!
//! This crate holds the pieces every stage of the analysis needs:
//!
//! - [`Error`] / [`Result`]: one error type for loading, cleaning, testing and reporting
//! - [`ranking`]: average ranks with tie handling, used by the rank-sum test and
//!   Spearman's rho
//! - [`moments`]: means, interpolated quantiles, Pearson correlation and line fits over `f64` slices
//!
//! # Example
//!
//! ```rust
//! use perch_core::ranking::average_ranks;
//!
//! let ranks = average_ranks(&[10.0, 20.0, 20.0, 30.0]);
//! assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
//! ```

pub mod error;
pub mod moments;
pub mod ranking;

pub use error::{Error, ModelFitWarning, Result};
