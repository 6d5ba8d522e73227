//! Core traits for effect size estimation

use crate::types::EffectSize;
use perch_core::Result;

/// Effect sizes derived from a contingency-table test statistic
pub trait ContingencyEffectSize {
    /// Compute from a chi-square statistic over an `rows × cols` table of `n` observations
    fn from_chi_square(&self, statistic: f64, n: u64, rows: usize, cols: usize) -> Result<EffectSize>;
}
