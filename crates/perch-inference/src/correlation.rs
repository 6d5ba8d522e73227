//! Spearman rank correlation

use crate::distribution::t_two_sided;
use perch_core::moments::pearson;
use perch_core::ranking::average_ranks;
use perch_core::{Error, Result};
use perch_effect::{correlation_effect, EffectSize};
use perch_frame::Table;
use std::fmt;
use tracing::{debug, instrument};

/// Result of a Spearman correlation test
#[derive(Debug, Clone, PartialEq)]
pub struct SpearmanResult {
    pub x_name: String,
    pub y_name: String,
    pub rho: f64,
    pub p_value: f64,
    /// Complete pairs used
    pub n: usize,
    pub effect: EffectSize,
}

/// Spearman's rho and its two-sided p-value under the no-correlation null
///
/// Rho is the Pearson correlation of average ranks. The p-value uses the
/// t approximation with n − 2 degrees of freedom.
pub fn spearman(x: &[f64], y: &[f64]) -> Result<SpearmanResult> {
    if x.len() != y.len() {
        return Err(Error::size_mismatch(x.len(), y.len(), "spearman series"));
    }
    let n = x.len();
    if n < 3 {
        return Err(Error::InsufficientSample {
            group: "spearman pairs".to_string(),
            required: 3,
            actual: n,
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(Error::non_finite("spearman series"));
    }

    let rho = pearson(&average_ranks(x), &average_ranks(y))?;
    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let df = (n - 2) as f64;
        t_two_sided(rho * (df / (1.0 - rho * rho)).sqrt(), df)?
    };

    Ok(SpearmanResult {
        x_name: "x".to_string(),
        y_name: "y".to_string(),
        rho,
        p_value,
        n,
        effect: correlation_effect(rho, n),
    })
}

/// Spearman correlation between two numeric columns, over complete pairs
#[instrument(skip(table), fields(table = table.name()))]
pub fn spearman_columns(table: &Table, x: &str, y: &str) -> Result<SpearmanResult> {
    let (xs, ys) = table.paired_numeric(x, y)?;
    let mut result = spearman(&xs, &ys).map_err(|e| match e {
        Error::InsufficientSample { required, actual, .. } => Error::InsufficientSample {
            group: format!("{} ({x} vs {y})", table.name()),
            required,
            actual,
        },
        other => other,
    })?;
    result.x_name = x.to_string();
    result.y_name = y.to_string();
    debug!(rho = result.rho, p = result.p_value, n = result.n, "spearman");
    Ok(result)
}

/// Pairwise Spearman coefficients of several columns
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major; NaN where the coefficient is undefined
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

impl fmt::Display for CorrelationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.names.iter().map(String::len).max().unwrap_or(0).max(6);
        write!(f, "{:width$}", "")?;
        for name in &self.names {
            write!(f, "  {name:>width$}")?;
        }
        writeln!(f)?;
        for (name, row) in self.names.iter().zip(&self.values) {
            write!(f, "{name:<width$}")?;
            for value in row {
                write!(f, "  {value:>width$.3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Spearman correlation matrix over the named numeric columns
///
/// Each pair uses its own complete rows. Pairs with too few rows or a
/// constant series are NaN rather than failing the whole matrix.
pub fn spearman_matrix(table: &Table, columns: &[&str]) -> Result<CorrelationMatrix> {
    let k = columns.len();
    let mut values = vec![vec![f64::NAN; k]; k];
    for i in 0..k {
        for j in i..k {
            let (xs, ys) = table.paired_numeric(columns[i], columns[j])?;
            let rho = match spearman(&xs, &ys) {
                Ok(result) => result.rho,
                Err(e) if e.is_recoverable() => f64::NAN,
                Err(e) => return Err(e),
            };
            values[i][j] = rho;
            values[j][i] = rho;
        }
    }
    Ok(CorrelationMatrix {
        names: columns.iter().map(|c| c.to_string()).collect(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use polars::prelude::{df, NamedFrom};
    use proptest::prelude::*;

    #[test]
    fn test_spearman_with_ties() {
        let result = spearman(&[1.0, 2.0, 3.0, 4.0, 5.0], &[5.0, 6.0, 7.0, 8.0, 7.0]).unwrap();
        assert_abs_diff_eq!(result.rho, 0.8207826816681233, epsilon = 1e-12);
        assert_abs_diff_eq!(result.p_value, 0.0885870053135438, epsilon = 1e-6);
    }

    #[test]
    fn test_perfect_monotone() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 10.0, 100.0, 1000.0];
        let result = spearman(&x, &y).unwrap();
        assert_abs_diff_eq!(result.rho, 1.0, epsilon = 1e-12);
        assert_eq!(result.p_value, 0.0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            spearman(&[1.0, 2.0], &[2.0, 1.0]),
            Err(Error::InsufficientSample { .. })
        ));
        assert!(matches!(
            spearman(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]),
            Err(Error::Degenerate(_))
        ));
        assert!(spearman(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_matrix() {
        let frame = df![
            "a" => [1.0, 2.0, 3.0, 4.0],
            "b" => [4.0, 3.0, 2.0, 1.0],
            "c" => [5.0, 5.0, 5.0, 5.0],
        ]
        .unwrap();
        let table = Table::new("windows", frame);
        let matrix = spearman_matrix(&table, &["a", "b", "c"]).unwrap();
        assert_abs_diff_eq!(matrix.get("a", "b").unwrap(), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(matrix.get("a", "a").unwrap(), 1.0, epsilon = 1e-12);
        assert!(matrix.get("a", "c").unwrap().is_nan());
        assert_eq!(matrix.to_string().lines().count(), 4);
    }

    proptest! {
        #[test]
        fn prop_rho_bounded(pairs in prop::collection::vec((0u8..30, 0u8..30), 3..40)) {
            let x: Vec<f64> = pairs.iter().map(|p| f64::from(p.0)).collect();
            let y: Vec<f64> = pairs.iter().map(|p| f64::from(p.1)).collect();
            if let Ok(result) = spearman(&x, &y) {
                prop_assert!((-1.0..=1.0).contains(&result.rho));
                prop_assert!((0.0..=1.0).contains(&result.p_value));
            }
        }
    }
}
