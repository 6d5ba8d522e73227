//! Hypothesis tests for the perch analysis pipeline
//!
//! Every test is a pure function of its inputs and returns a typed result
//! that converts into the [`TestResult`] union consumed by reporting.
//!
//! - [`ChiSquareTest`]: independence of two categorical variables, with
//!   Yates' correction on 2×2 tables and Cramér's V
//! - [`MannWhitney`]: two-sided rank-sum test with rank-biserial effect size
//! - [`spearman`]: rank correlation with a t-approximation p-value
//! - [`LogisticRegression`]: binary outcome on numeric and dummy-coded
//!   categorical predictors, with Wald intervals and odds ratios
//!
//! Tests that cannot run on the given sample return a recoverable
//! [`perch_core::Error`] (`InsufficientSample`, `Degenerate` or `ModelFit`).
//!
//! # Example
//!
//! ```rust
//! use perch_frame::{ContingencyTable, Level};
//! use perch_inference::ChiSquareTest;
//!
//! let levels = vec![Level::Number(0.0), Level::Number(1.0)];
//! let table = ContingencyTable::from_counts(
//!     "risk",
//!     "reward",
//!     levels.clone(),
//!     levels,
//!     vec![vec![40, 10], vec![5, 45]],
//! )?;
//! let result = ChiSquareTest::new().test(&table)?;
//! assert!(result.p_value < 0.05);
//! # Ok::<(), perch_core::Error>(())
//! ```

mod chi_square;
mod correlation;
mod design;
pub mod distribution;
mod logistic;
mod rank_sum;
mod result;

pub use chi_square::{expected_counts, ChiSquareResult, ChiSquareTest};
pub use correlation::{spearman, spearman_columns, spearman_matrix, CorrelationMatrix, SpearmanResult};
pub use design::{DesignColumn, DesignMatrix, ModelSpec, Term};
pub use logistic::{Coefficient, LogisticFit, LogisticRegression, PredictorValue};
pub use rank_sum::{MannWhitney, PValueMethod, RankSumResult};
pub use result::{TestKind, TestResult};
