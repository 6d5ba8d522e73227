//! Binary logistic regression fitted by Newton–Raphson (IRLS)

use crate::design::{DesignColumn, DesignMatrix, ModelSpec};
use crate::distribution::{chi_square_upper, normal_critical, normal_two_sided};
use nalgebra::{DMatrix, DVector};
use perch_core::{Error, ModelFitWarning, Result};
use perch_frame::{Level, Table};
use tracing::{debug, instrument};

/// One fitted coefficient with its Wald inference
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl Coefficient {
    /// Multiplicative change in odds per unit increase
    pub fn odds_ratio(&self) -> f64 {
        self.estimate.exp()
    }

    pub fn odds_ratio_ci(&self) -> (f64, f64) {
        (self.ci_lower.exp(), self.ci_upper.exp())
    }
}

/// Value supplied for a predictor when predicting
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorValue {
    Number(f64),
    Level(Level),
}

/// A converged logistic regression
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticFit {
    pub spec: ModelSpec,
    pub coefficients: Vec<Coefficient>,
    pub columns: Vec<DesignColumn>,
    pub references: Vec<(String, Level)>,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    /// McFadden's pseudo R²
    pub pseudo_r2: f64,
    /// Likelihood-ratio statistic against the intercept-only model
    pub lr_statistic: f64,
    pub lr_p_value: f64,
    pub iterations: usize,
    pub n_obs: usize,
    pub confidence_level: f64,
}

impl LogisticFit {
    pub fn coefficient(&self, term: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.term == term)
    }

    /// Predicted probability of the positive outcome
    ///
    /// Every predictor of the model must be given; categorical predictors
    /// take a level seen during fitting.
    pub fn predict(&self, values: &[(&str, PredictorValue)]) -> Result<f64> {
        let lookup = |name: &str| {
            values
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| Error::InvalidInput(format!("no value for predictor `{name}`")))
        };

        for term in &self.spec.terms {
            if let (crate::design::Term::Categorical(name), PredictorValue::Level(level)) =
                (term, lookup(term.name())?)
            {
                let known = self.references.iter().any(|(t, l)| t == name && l == level)
                    || self.columns.iter().any(|c| {
                        matches!(c, DesignColumn::Indicator { term, level: l } if term == name && l == level)
                    });
                if !known {
                    return Err(Error::InvalidInput(format!(
                        "level `{level}` of `{name}` was not seen when fitting"
                    )));
                }
            }
        }

        let mut eta = 0.0;
        for (column, coefficient) in self.columns.iter().zip(&self.coefficients) {
            let x = match column {
                DesignColumn::Intercept => 1.0,
                DesignColumn::Numeric(name) => match lookup(name)? {
                    PredictorValue::Number(v) => *v,
                    PredictorValue::Level(_) => {
                        return Err(Error::InvalidInput(format!("`{name}` needs a number")))
                    }
                },
                DesignColumn::Indicator { term, level } => match lookup(term)? {
                    PredictorValue::Level(value) => f64::from(u8::from(value == level)),
                    PredictorValue::Number(_) => {
                        return Err(Error::InvalidInput(format!("`{term}` needs a level")))
                    }
                },
            };
            eta += coefficient.estimate * x;
        }
        Ok(sigmoid(eta))
    }
}

/// Logistic regression estimator
#[derive(Debug, Clone, Copy)]
pub struct LogisticRegression {
    max_iterations: usize,
    tolerance: f64,
    confidence_level: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// 35 iterations, step tolerance 1e-8, 95% intervals
    pub fn new() -> Self {
        Self {
            max_iterations: 35,
            tolerance: 1e-8,
            confidence_level: 0.95,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    /// Fit `spec` against `table`
    #[instrument(skip(self, table, spec), fields(model = %spec))]
    pub fn fit(&self, table: &Table, spec: &ModelSpec) -> Result<LogisticFit> {
        let design = DesignMatrix::build(table, spec)?;
        debug!(n = design.n_obs(), dropped = design.dropped, "built design matrix");
        self.fit_design(&design)
    }

    /// Fit an already encoded design
    pub fn fit_design(&self, design: &DesignMatrix) -> Result<LogisticFit> {
        let z_critical = normal_critical(self.confidence_level)?;
        let (x, y) = (&design.x, &design.y);

        let mut beta = DVector::zeros(x.ncols());
        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            iterations += 1;
            let (information, score) = information_and_score(x, y, &beta);
            let step = information
                .cholesky()
                .ok_or(ModelFitWarning::SingularInformation)?
                .solve(&score);
            beta += &step;

            if beta.iter().any(|b| !b.is_finite()) {
                return Err(ModelFitWarning::NotConverged { iterations }.into());
            }
            if step.amax() < self.tolerance {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(ModelFitWarning::NotConverged { iterations }.into());
        }

        let (information, _) = information_and_score(x, y, &beta);
        let covariance = information
            .cholesky()
            .ok_or(ModelFitWarning::SingularInformation)?
            .inverse();

        let coefficients = design
            .columns
            .iter()
            .enumerate()
            .map(|(j, column)| {
                let estimate = beta[j];
                let std_error = covariance[(j, j)].sqrt();
                if !std_error.is_finite() || std_error <= 0.0 {
                    return Err(ModelFitWarning::SingularInformation.into());
                }
                let z = estimate / std_error;
                Ok(Coefficient {
                    term: column.label(),
                    estimate,
                    std_error,
                    z,
                    p_value: normal_two_sided(z)?,
                    ci_lower: estimate - z_critical * std_error,
                    ci_upper: estimate + z_critical * std_error,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let log_likelihood = log_likelihood(x, y, &beta);
        let n = y.len() as f64;
        let rate = y.sum() / n;
        let null_log_likelihood = n * (rate * rate.ln() + (1.0 - rate) * (1.0 - rate).ln());
        let lr_statistic = (2.0 * (log_likelihood - null_log_likelihood)).max(0.0);
        let df = (x.ncols() - 1) as f64;
        let lr_p_value = if df > 0.0 {
            chi_square_upper(lr_statistic, df)?
        } else {
            1.0
        };
        debug!(iterations, log_likelihood, "logistic regression converged");

        Ok(LogisticFit {
            spec: design.spec.clone(),
            coefficients,
            columns: design.columns.clone(),
            references: design.references.clone(),
            log_likelihood,
            null_log_likelihood,
            pseudo_r2: 1.0 - log_likelihood / null_log_likelihood,
            lr_statistic,
            lr_p_value,
            iterations,
            n_obs: y.len(),
            confidence_level: self.confidence_level,
        })
    }
}

fn sigmoid(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// ln(1 + e^eta) without overflow
fn softplus(eta: f64) -> f64 {
    eta.max(0.0) + (-eta.abs()).exp().ln_1p()
}

/// Xᵀ W X and Xᵀ (y − μ) at `beta`
fn information_and_score(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    beta: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let mu = (x * beta).map(sigmoid);
    let mut weighted = x.clone();
    for i in 0..x.nrows() {
        let w = mu[i] * (1.0 - mu[i]);
        for j in 0..x.ncols() {
            weighted[(i, j)] *= w;
        }
    }
    let xt = x.transpose();
    (&xt * weighted, xt * (y - mu))
}

fn log_likelihood(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>) -> f64 {
    let eta = x * beta;
    eta.iter()
        .zip(y.iter())
        .map(|(&e, &yi)| yi * e - softplus(e))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use perch_frame::{derive_season, SeasonMapping};
    use polars::prelude::{df, NamedFrom};

    fn trend_table() -> Table {
        let frame = df![
            "y" => [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
            "x" => (1..=12).map(f64::from).collect::<Vec<_>>(),
        ]
        .unwrap();
        Table::new("t", frame)
    }

    #[test]
    fn test_single_predictor_matches_reference() {
        let fit = LogisticRegression::new()
            .fit(&trend_table(), &ModelSpec::new("y").numeric("x"))
            .unwrap();
        let intercept = fit.coefficient("Intercept").unwrap();
        let slope = fit.coefficient("x").unwrap();
        assert_abs_diff_eq!(intercept.estimate, -2.1443982193964097, epsilon = 1e-6);
        assert_abs_diff_eq!(slope.estimate, 0.32990741836867843, epsilon = 1e-6);
        assert_abs_diff_eq!(intercept.std_error, 1.5439292089612944, epsilon = 1e-6);
        assert_abs_diff_eq!(slope.std_error, 0.214750170754875, epsilon = 1e-6);
        assert_abs_diff_eq!(slope.p_value, 0.12447996730621542, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.log_likelihood, -6.804682192593487, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.null_log_likelihood, -8.317766166719343, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.pseudo_r2, 0.18190989549332814, epsilon = 1e-6);
        assert_eq!(fit.n_obs, 12);
    }

    #[test]
    fn test_odds_ratio_interval_contains_estimate() {
        let fit = LogisticRegression::new()
            .fit(&trend_table(), &ModelSpec::new("y").numeric("x"))
            .unwrap();
        let slope = fit.coefficient("x").unwrap();
        let (lo, hi) = slope.odds_ratio_ci();
        assert!(lo < slope.odds_ratio() && slope.odds_ratio() < hi);
        assert_abs_diff_eq!(
            slope.ci_upper - slope.estimate,
            1.959963984540054 * slope.std_error,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_predict() {
        let fit = LogisticRegression::new()
            .fit(&trend_table(), &ModelSpec::new("y").numeric("x"))
            .unwrap();
        let low = fit.predict(&[("x", PredictorValue::Number(1.0))]).unwrap();
        let high = fit.predict(&[("x", PredictorValue::Number(12.0))]).unwrap();
        assert!(low < 0.5 && high > 0.5);
        assert!(fit.predict(&[]).is_err());
    }

    #[test]
    fn test_categorical_predictor_and_prediction() {
        let n = 40usize;
        let frame = df![
            "risk" => (0..n).map(|i| f64::from(u8::from(i % 3 == 0 || (i % 2 == 0 && i % 5 != 0)))).collect::<Vec<_>>(),
            "minutes" => (0..n).map(|i| (i % 7) as f64).collect::<Vec<_>>(),
            // 0 = winter, 1 = spring
            "season_code" => (0..n).map(|i| (i % 2) as f64).collect::<Vec<_>>(),
        ]
        .unwrap();
        let table = derive_season(
            &Table::new("events", frame),
            "season_code",
            "season",
            &SeasonMapping::binary_code(),
        )
        .unwrap();
        let spec = ModelSpec::new("risk").numeric("minutes").categorical("season");
        let fit = LogisticRegression::new().fit(&table, &spec).unwrap();

        assert!(fit.coefficient("season[winter]").is_some());
        assert_eq!(fit.references, vec![("season".to_string(), Level::from("spring"))]);

        let p = fit
            .predict(&[
                ("minutes", PredictorValue::Number(3.0)),
                ("season", PredictorValue::Level(Level::from("winter"))),
            ])
            .unwrap();
        assert!((0.0..=1.0).contains(&p));

        let err = fit
            .predict(&[
                ("minutes", PredictorValue::Number(3.0)),
                ("season", PredictorValue::Level(Level::from("autumn"))),
            ])
            .unwrap_err();
        assert!(err.to_string().contains("autumn"));
    }

    #[test]
    fn test_separation_reported_as_model_fit() {
        let table = Table::new(
            "t",
            df![
                "y" => [0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
                "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            ]
            .unwrap(),
        );
        let err = LogisticRegression::new()
            .fit(&table, &ModelSpec::new("y").numeric("x"))
            .unwrap_err();
        assert!(matches!(err, Error::ModelFit(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_constant_predictor_is_model_fit() {
        let table = Table::new(
            "t",
            df![
                "y" => [0.0, 1.0, 0.0, 1.0],
                "x" => [2.0; 4],
            ]
            .unwrap(),
        );
        let err = LogisticRegression::new()
            .fit(&table, &ModelSpec::new("y").numeric("x"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ModelFit(ModelFitWarning::ConstantPredictor { .. })
        ));
    }
}
