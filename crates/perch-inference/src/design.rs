//! Design matrices for regression models
//!
//! A [`ModelSpec`] names a binary outcome and its predictors. Building the
//! design drops incomplete rows, prepends an intercept and expands each
//! categorical predictor into indicator columns, one per level except the
//! first observed level in sorted order, which serves as the reference.

use nalgebra::{DMatrix, DVector};
use perch_core::{Error, ModelFitWarning, Result};
use perch_frame::{Categories, Level, Table};
use std::fmt;

/// One predictor of a model
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Numeric(String),
    Categorical(String),
}

impl Term {
    pub fn name(&self) -> &str {
        match self {
            Self::Numeric(name) | Self::Categorical(name) => name,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(name) => f.write_str(name),
            Self::Categorical(name) => write!(f, "C({name})"),
        }
    }
}

/// Outcome and predictors of a regression
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub outcome: String,
    pub terms: Vec<Term>,
}

impl ModelSpec {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            terms: Vec::new(),
        }
    }

    pub fn numeric(mut self, name: impl Into<String>) -> Self {
        self.terms.push(Term::Numeric(name.into()));
        self
    }

    pub fn categorical(mut self, name: impl Into<String>) -> Self {
        self.terms.push(Term::Categorical(name.into()));
        self
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ ", self.outcome)?;
        if self.terms.is_empty() {
            return f.write_str("1");
        }
        let terms: Vec<String> = self.terms.iter().map(Term::to_string).collect();
        f.write_str(&terms.join(" + "))
    }
}

/// Where a design column's values come from
#[derive(Debug, Clone, PartialEq)]
pub enum DesignColumn {
    Intercept,
    Numeric(String),
    /// 1 when `term` equals `level`, 0 otherwise
    Indicator { term: String, level: Level },
}

impl DesignColumn {
    /// Coefficient label, e.g. `season[winter]`
    pub fn label(&self) -> String {
        match self {
            Self::Intercept => "Intercept".to_string(),
            Self::Numeric(name) => name.clone(),
            Self::Indicator { term, level } => format!("{term}[{level}]"),
        }
    }
}

/// Numeric design matrix with its binary response
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub spec: ModelSpec,
    pub columns: Vec<DesignColumn>,
    /// Reference level of each categorical predictor
    pub references: Vec<(String, Level)>,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
    /// Rows removed for missing values
    pub dropped: usize,
}

enum Source {
    Numeric(Vec<Option<f64>>),
    Categorical(Categories),
}

impl Source {
    fn present(&self, row: usize) -> bool {
        match self {
            Self::Numeric(values) => values[row].is_some_and(|v| v.is_finite()),
            Self::Categorical(c) => c.codes()[row].is_some(),
        }
    }
}

impl DesignMatrix {
    /// Encode `spec` against `table`
    pub fn build(table: &Table, spec: &ModelSpec) -> Result<Self> {
        let outcome = binary_outcome(&table.levels_of(&spec.outcome)?)?;
        let sources = spec
            .terms
            .iter()
            .map(|term| match term {
                Term::Numeric(name) => table.numeric(name).map(Source::Numeric),
                Term::Categorical(name) => table.levels_of(name).map(Source::Categorical),
            })
            .collect::<Result<Vec<_>>>()?;

        let rows: Vec<usize> = (0..table.n_rows())
            .filter(|&i| outcome[i].is_some() && sources.iter().all(|s| s.present(i)))
            .collect();
        let dropped = table.n_rows() - rows.len();

        let y: Vec<f64> = rows.iter().filter_map(|&i| outcome[i]).collect();
        let distinct = usize::from(y.iter().any(|&v| v == 0.0)) + usize::from(y.iter().any(|&v| v == 1.0));
        if distinct < 2 {
            return Err(ModelFitWarning::NonBinaryOutcome { levels: distinct }.into());
        }

        let mut columns = vec![DesignColumn::Intercept];
        let mut references = Vec::new();
        let mut data: Vec<Vec<f64>> = vec![vec![1.0; rows.len()]];

        for (term, source) in spec.terms.iter().zip(&sources) {
            match source {
                Source::Numeric(values) => {
                    let column: Vec<f64> = rows.iter().filter_map(|&i| values[i]).collect();
                    if column.iter().all(|&v| v == column[0]) {
                        return Err(constant(term));
                    }
                    columns.push(DesignColumn::Numeric(term.name().to_string()));
                    data.push(column);
                }
                Source::Categorical(categories) => {
                    let codes: Vec<usize> =
                        rows.iter().filter_map(|&i| categories.codes()[i]).collect();
                    let mut observed = codes.clone();
                    observed.sort_unstable();
                    observed.dedup();
                    if observed.len() < 2 {
                        return Err(constant(term));
                    }
                    let levels = categories.levels();
                    references.push((term.name().to_string(), levels[observed[0]].clone()));
                    for &code in &observed[1..] {
                        columns.push(DesignColumn::Indicator {
                            term: term.name().to_string(),
                            level: levels[code].clone(),
                        });
                        data.push(codes.iter().map(|&c| f64::from(u8::from(c == code))).collect());
                    }
                }
            }
        }

        let (n, p) = (rows.len(), columns.len());
        if n <= p {
            return Err(ModelFitWarning::TooFewObservations {
                observations: n,
                parameters: p,
            }
            .into());
        }

        Ok(Self {
            spec: spec.clone(),
            columns,
            references,
            x: DMatrix::from_fn(n, p, |i, j| data[j][i]),
            y: DVector::from_vec(y),
            dropped,
        })
    }

    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }
}

fn constant(term: &Term) -> Error {
    ModelFitWarning::ConstantPredictor {
        term: term.name().to_string(),
    }
    .into()
}

/// 0/1 value per row: numeric 0/1 levels are used as-is, otherwise the
/// second of exactly two levels is the positive class
fn binary_outcome(categories: &Categories) -> Result<Vec<Option<f64>>> {
    let levels = categories.levels();
    let numeric_indicator = levels
        .iter()
        .all(|l| matches!(l.as_number(), Some(v) if v == 0.0 || v == 1.0));

    let value_of = |code: usize| -> f64 {
        if numeric_indicator {
            levels[code].as_number().unwrap_or(f64::NAN)
        } else {
            code as f64
        }
    };
    if !numeric_indicator && levels.len() != 2 {
        return Err(ModelFitWarning::NonBinaryOutcome {
            levels: levels.len(),
        }
        .into());
    }
    Ok(categories.codes().iter().map(|c| c.map(value_of)).collect())
}
