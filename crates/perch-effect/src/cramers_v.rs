//! Cramér's V association measure
//!
//! V = sqrt(χ² / (n · min(r − 1, c − 1))), bounded in [0, 1].

use crate::{ContingencyEffectSize, EffectSize, EffectSizeType};
use perch_core::{Error, Result};

/// Cramér's V estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct CramersV;

impl CramersV {
    pub fn new() -> Self {
        Self
    }
}

impl ContingencyEffectSize for CramersV {
    fn from_chi_square(&self, statistic: f64, n: u64, rows: usize, cols: usize) -> Result<EffectSize> {
        if !statistic.is_finite() || statistic < 0.0 {
            return Err(Error::InvalidInput(format!(
                "chi-square statistic must be finite and non-negative, got {statistic}"
            )));
        }
        let k = rows.min(cols).saturating_sub(1);
        if n == 0 || k == 0 {
            return Err(Error::Degenerate(format!(
                "Cramér's V undefined for a {rows}×{cols} table with {n} observations"
            )));
        }

        // Rounding in the statistic can push V a hair over 1
        let v = (statistic / (n as f64 * k as f64)).sqrt().min(1.0);
        let n = n as usize;
        Ok(EffectSize::new(v, EffectSizeType::Association, Some((n, n))))
    }
}
