//! Means, quantiles, correlation and line fits over plain `f64` slices

use crate::{Error, Result};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile of sorted data with linear interpolation between order statistics
///
/// Uses position `p * (n - 1)`, the same rule as the common "type 7" estimator.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(Error::InvalidInput("quantile of empty data".to_string()));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(Error::InvalidParameter(format!(
            "Quantile {p} must be in [0, 1]"
        )));
    }

    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Pearson product-moment correlation
pub fn pearson(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::size_mismatch(x.len(), y.len(), "correlation"));
    }
    if x.len() < 2 {
        return Err(Error::InsufficientSample {
            group: "correlation".to_string(),
            required: 2,
            actual: x.len(),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut sum_sq_x = 0.0;
    let mut sum_sq_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        numerator += dx * dy;
        sum_sq_x += dx * dx;
        sum_sq_y += dy * dy;
    }

    let denominator = (sum_sq_x * sum_sq_y).sqrt();
    if denominator == 0.0 {
        return Err(Error::Degenerate(
            "cannot compute correlation: zero variance".to_string(),
        ));
    }

    Ok((numerator / denominator).clamp(-1.0, 1.0))
}

/// Ordinary least-squares line `y = slope * x + intercept`
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    if x.len() != y.len() {
        return Err(Error::size_mismatch(x.len(), y.len(), "linear fit"));
    }
    let mean_x = mean(x).ok_or_else(|| Error::InvalidInput("linear fit of empty data".to_string()))?;
    let mean_y = mean(y).ok_or_else(|| Error::InvalidInput("linear fit of empty data".to_string()))?;

    let sxx: f64 = x.iter().map(|&v| (v - mean_x) * (v - mean_x)).sum();
    if sxx == 0.0 {
        return Err(Error::Degenerate("linear fit with constant x".to_string()));
    }
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    let slope = sxy / sxx;
    Ok((slope, mean_y - slope * mean_x))
}
