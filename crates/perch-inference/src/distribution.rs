//! Tail probabilities of the reference distributions

use perch_core::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0)
        .map_err(|e| Error::InvalidParameter(format!("standard normal: {e}")))
}

/// Two-sided p-value of a standard normal score
pub fn normal_two_sided(z: f64) -> Result<f64> {
    let normal = standard_normal()?;
    Ok((2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Critical value z such that `level` of the mass lies in (-z, z)
pub fn normal_critical(level: f64) -> Result<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(Error::InvalidParameter(format!(
            "Confidence level must be in (0, 1), got {level}"
        )));
    }
    Ok(standard_normal()?.inverse_cdf(1.0 - (1.0 - level) / 2.0))
}

/// Two-sided p-value of a Student's t score
pub fn t_two_sided(t: f64, df: f64) -> Result<f64> {
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| Error::InvalidParameter(format!("Student's t with {df} df: {e}")))?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Upper-tail probability of a chi-square statistic
pub fn chi_square_upper(statistic: f64, df: f64) -> Result<f64> {
    let dist = ChiSquared::new(df)
        .map_err(|e| Error::InvalidParameter(format!("chi-square with {df} df: {e}")))?;
    Ok((1.0 - dist.cdf(statistic)).clamp(0.0, 1.0))
}
