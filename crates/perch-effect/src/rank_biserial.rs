//! Rank-biserial correlation for two independent samples
//!
//! r = 1 − 2U₁ / (n₁ n₂), where U₁ is the Mann–Whitney statistic of the first
//! sample. Positive values mean the second sample tends to be larger.

use crate::{EffectSize, EffectSizeType};
use perch_core::ranking::average_ranks;
use perch_core::{Error, Result};

/// Rank-biserial effect size estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct RankBiserial;

impl RankBiserial {
    pub fn new() -> Self {
        Self
    }

    /// Effect size from an already computed U statistic of the first sample
    pub fn from_u(&self, u: f64, n1: usize, n2: usize) -> Result<EffectSize> {
        if n1 == 0 || n2 == 0 {
            return Err(Error::InvalidInput(
                "Both groups must be non-empty".to_string(),
            ));
        }
        let pairs = (n1 * n2) as f64;
        if !(0.0..=pairs).contains(&u) {
            return Err(Error::InvalidParameter(format!(
                "U = {u} outside [0, {pairs}]"
            )));
        }
        let r = (1.0 - 2.0 * u / pairs).clamp(-1.0, 1.0);
        Ok(EffectSize::new(r, EffectSizeType::RankBiserial, Some((n1, n2))))
    }
}

/// U statistic of the first sample, counting ties as one half
pub fn u_statistic(group1: &[f64], group2: &[f64]) -> f64 {
    let n1 = group1.len();
    let pooled: Vec<f64> = group1.iter().chain(group2).copied().collect();
    let ranks = average_ranks(&pooled);
    let rank_sum: f64 = ranks[..n1].iter().sum();
    rank_sum - (n1 * (n1 + 1)) as f64 / 2.0
}
