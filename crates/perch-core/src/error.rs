//! Error types for the perch analysis pipeline
//!
//! Provides a unified error type for all perch crates. Loading and schema
//! errors are fatal; sample-size, degenerate-input and model-fit errors only
//! invalidate the single test that raised them.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for perch operations
#[derive(Error, Debug)]
pub enum Error {
    /// A data file could not be opened, read or parsed
    #[error("Failed to load {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    /// A required column is absent from a table
    #[error("Missing column `{column}` in {table}")]
    MissingColumn { column: String, table: String },

    /// A column exists but holds the wrong kind of values
    #[error("Column `{column}` has type {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: String,
        found: String,
    },

    /// Too few observations in a group for the requested test
    #[error("Insufficient sample for {group}: need at least {required}, got {actual}")]
    InsufficientSample {
        group: String,
        required: usize,
        actual: usize,
    },

    /// A regression could not be fitted
    #[error("Model fit unavailable: {0}")]
    ModelFit(ModelFitWarning),

    /// The statistic is undefined for this input (zero marginal, constant series)
    #[error("Degenerate input: {0}")]
    Degenerate(String),

    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chart or report rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// A dataframe operation failed
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a logistic regression fit is reported as unavailable
#[derive(Debug, Clone, PartialEq)]
pub enum ModelFitWarning {
    /// Newton iterations hit the cap without meeting the tolerance
    NotConverged { iterations: usize },
    /// A predictor column takes a single value in the fitted sample
    ConstantPredictor { term: String },
    /// The information matrix could not be inverted
    SingularInformation,
    /// The outcome does not take exactly two values
    NonBinaryOutcome { levels: usize },
    /// More parameters than usable observations
    TooFewObservations { observations: usize, parameters: usize },
}

impl fmt::Display for ModelFitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged { iterations } => {
                write!(f, "did not converge after {iterations} iterations")
            }
            Self::ConstantPredictor { term } => {
                write!(f, "predictor `{term}` is constant within the sample")
            }
            Self::SingularInformation => write!(f, "information matrix is singular"),
            Self::NonBinaryOutcome { levels } => {
                write!(f, "outcome must be binary, found {levels} distinct values")
            }
            Self::TooFewObservations {
                observations,
                parameters,
            } => write!(
                f,
                "{observations} usable observations for {parameters} parameters"
            ),
        }
    }
}

impl From<ModelFitWarning> for Error {
    fn from(warning: ModelFitWarning) -> Self {
        Self::ModelFit(warning)
    }
}

// Helper functions for common error patterns

impl Error {
    /// Create a data-load error for a file
    pub fn data_load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::DataLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a missing-column error
    pub fn missing_column(column: &str, table: &str) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
            table: table.to_string(),
        }
    }

    /// Create an error for size mismatch
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::InvalidInput(format!(
            "Size mismatch in {context}: expected {expected}, got {actual}"
        ))
    }

    /// Create an error for NaN/Inf values
    pub fn non_finite(context: &str) -> Self {
        Self::InvalidInput(format!("{context} contains NaN or infinite values"))
    }

    /// Whether the run can continue past this error
    ///
    /// Recoverable errors invalidate a single test; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSample { .. } | Self::ModelFit(_) | Self::Degenerate(_)
        )
    }
}
