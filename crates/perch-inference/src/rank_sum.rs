//! Mann–Whitney U rank-sum test for two independent samples

use crate::distribution::normal_two_sided;
use perch_core::moments::mean;
use perch_core::ranking::{has_ties, tie_correction};
use perch_core::{Error, Result};
use perch_effect::{u_statistic, EffectSize, RankBiserial};
use tracing::{debug, instrument};

/// Samples smaller than this (both of them, without ties) use the exact null distribution
const EXACT_LIMIT: usize = 8;

/// How the p-value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueMethod {
    Exact,
    Asymptotic,
}

/// Result of a two-sided Mann–Whitney U test
#[derive(Debug, Clone, PartialEq)]
pub struct RankSumResult {
    /// Label of the first sample
    pub first: String,
    /// Label of the second sample
    pub second: String,
    /// U statistic of the first sample
    pub u: f64,
    pub p_value: f64,
    pub n1: usize,
    pub n2: usize,
    pub mean1: f64,
    pub mean2: f64,
    pub method: PValueMethod,
    /// Rank-biserial correlation, `1 - 2U/(n1 n2)`
    pub effect: EffectSize,
}

/// Two-sided Mann–Whitney U test
#[derive(Debug, Clone, Copy)]
pub struct MannWhitney {
    min_group_size: usize,
    continuity_correction: bool,
}

impl Default for MannWhitney {
    fn default() -> Self {
        Self::new()
    }
}

impl MannWhitney {
    /// Test requiring at least 10 observations per group
    pub fn new() -> Self {
        Self {
            min_group_size: 10,
            continuity_correction: true,
        }
    }

    /// Minimum observations each group needs before the test runs
    pub fn with_min_group_size(mut self, min_group_size: usize) -> Self {
        self.min_group_size = min_group_size.max(1);
        self
    }

    pub fn with_continuity_correction(mut self, enabled: bool) -> Self {
        self.continuity_correction = enabled;
        self
    }

    /// Compare two unlabeled samples
    pub fn test(&self, x: &[f64], y: &[f64]) -> Result<RankSumResult> {
        self.compare("first sample", x, "second sample", y)
    }

    /// Compare two labeled samples; labels name the groups in errors and reports
    #[instrument(skip(self, x, y), fields(n1 = x.len(), n2 = y.len()))]
    pub fn compare(&self, first: &str, x: &[f64], second: &str, y: &[f64]) -> Result<RankSumResult> {
        for (label, sample) in [(first, x), (second, y)] {
            if sample.len() < self.min_group_size {
                return Err(Error::InsufficientSample {
                    group: label.to_string(),
                    required: self.min_group_size,
                    actual: sample.len(),
                });
            }
            if sample.iter().any(|v| !v.is_finite()) {
                return Err(Error::non_finite(label));
            }
        }

        let (n1, n2) = (x.len(), y.len());
        let u = u_statistic(x, y);
        let pooled: Vec<f64> = x.iter().chain(y).copied().collect();

        let (p_value, method) = if n1 < EXACT_LIMIT && n2 < EXACT_LIMIT && !has_ties(&pooled) {
            (exact_p_value(u, n1, n2), PValueMethod::Exact)
        } else {
            (self.asymptotic_p_value(u, n1, n2, &pooled)?, PValueMethod::Asymptotic)
        };
        let effect = RankBiserial::new().from_u(u, n1, n2)?;
        debug!(u, p_value, ?method, "Mann-Whitney U");

        Ok(RankSumResult {
            first: first.to_string(),
            second: second.to_string(),
            u,
            p_value,
            n1,
            n2,
            mean1: mean(x).unwrap_or(f64::NAN),
            mean2: mean(y).unwrap_or(f64::NAN),
            method,
            effect,
        })
    }

    fn asymptotic_p_value(&self, u: f64, n1: usize, n2: usize, pooled: &[f64]) -> Result<f64> {
        let n = (n1 + n2) as f64;
        let (n1, n2) = (n1 as f64, n2 as f64);
        let mu = n1 * n2 / 2.0;
        let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_correction(pooled) / (n * (n - 1.0)));
        if variance <= 0.0 {
            return Err(Error::Degenerate(
                "all observations are tied; rank-sum test undefined".to_string(),
            ));
        }

        let mut deviation = (u - mu).abs();
        if self.continuity_correction {
            deviation -= 0.5;
        }
        // A negative deviation means U sits within half a unit of its mean
        if deviation <= 0.0 {
            return Ok(1.0);
        }
        normal_two_sided(deviation / variance.sqrt())
    }
}

/// Two-sided p-value from the exact permutation distribution of U
fn exact_p_value(u: f64, n1: usize, n2: usize) -> f64 {
    let frequencies = u_frequencies(n1, n2);
    let total: f64 = frequencies.iter().sum();
    let u = u.round() as usize;

    let lower: f64 = frequencies[..=u.min(frequencies.len() - 1)].iter().sum();
    let upper: f64 = frequencies[u.min(frequencies.len() - 1)..].iter().sum();
    (2.0 * lower.min(upper) / total).clamp(0.0, 1.0)
}

/// Number of orderings producing each value of U, for sample sizes `n1`, `n2`
fn u_frequencies(n1: usize, n2: usize) -> Vec<f64> {
    // table[i][j][u]: orderings of i first-sample and j second-sample values with statistic u
    let mut table: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n2 + 1]; n1 + 1];
    for i in 0..=n1 {
        for j in 0..=n2 {
            table[i][j] = if i == 0 || j == 0 {
                vec![1.0]
            } else {
                // The largest value comes from the first sample (beating all j) or the second
                (0..=i * j)
                    .map(|u| {
                        let from_first = if u >= j {
                            table[i - 1][j].get(u - j).copied().unwrap_or(0.0)
                        } else {
                            0.0
                        };
                        from_first + table[i][j - 1].get(u).copied().unwrap_or(0.0)
                    })
                    .collect()
            };
        }
    }
    std::mem::take(&mut table[n1][n2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn small() -> MannWhitney {
        MannWhitney::new().with_min_group_size(1)
    }

    #[test]
    fn test_exact_complete_separation() {
        let result = small().test(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(result.method, PValueMethod::Exact);
        assert_abs_diff_eq!(result.u, 0.0, epsilon = 1e-12);
        // 1 of C(6,3) = 20 orderings is as extreme on each side
        assert_abs_diff_eq!(result.p_value, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(result.effect.magnitude, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_frequencies_sum_to_binomial() {
        let freq = u_frequencies(4, 3);
        assert_eq!(freq.len(), 13);
        assert_abs_diff_eq!(freq.iter().sum::<f64>(), 35.0, epsilon = 1e-12);
        // Symmetric around n1 n2 / 2
        for u in 0..freq.len() {
            assert_eq!(freq[u], freq[freq.len() - 1 - u]);
        }
    }

    #[test]
    fn test_asymptotic_with_ties() {
        let x = [1.1, 2.5, 3.3, 4.0, 5.2, 6.1, 7.7, 8.4, 9.0, 10.5, 11.2];
        let y = [2.2, 2.5, 3.9, 4.1, 5.0, 6.6, 7.1, 8.8, 9.9, 10.1, 12.0];
        let result = MannWhitney::new().test(&x, &y).unwrap();
        assert_eq!(result.method, PValueMethod::Asymptotic);
        assert_abs_diff_eq!(result.u, 58.5, epsilon = 1e-12);
        assert_abs_diff_eq!(result.p_value, 0.9215151543022673, epsilon = 1e-6);
    }

    #[test]
    fn test_identical_distributions_not_rejected() {
        let x: Vec<f64> = (1..=15).map(|i| i as f64).collect();
        let y: Vec<f64> = (1..=15).map(|i| i as f64 + 0.5).collect();
        let result = MannWhitney::new().test(&x, &y).unwrap();
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn test_insufficient_sample() {
        let x = vec![1.0; 9];
        let y = vec![2.0; 20];
        let err = MannWhitney::new().compare("season=winter", &x, "season=spring", &y).unwrap_err();
        match err {
            Error::InsufficientSample { group, required, actual } => {
                assert_eq!(group, "season=winter");
                assert_eq!(required, 10);
                assert_eq!(actual, 9);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_all_tied_is_degenerate() {
        let x = vec![3.0; 10];
        assert!(matches!(MannWhitney::new().test(&x, &x), Err(Error::Degenerate(_))));
    }

    proptest! {
        #[test]
        fn prop_p_value_and_effect_bounded(
            x in prop::collection::vec(0.0f64..100.0, 1..20),
            y in prop::collection::vec(0.0f64..100.0, 1..20),
        ) {
            prop_assume!(x.iter().chain(&y).any(|v| *v != x[0]));
            let result = small().test(&x, &y).unwrap();
            prop_assert!((0.0..=1.0).contains(&result.p_value));
            prop_assert!((-1.0..=1.0).contains(&result.effect.magnitude));
            prop_assert!(result.u >= 0.0 && result.u <= (x.len() * y.len()) as f64);
        }
    }
}
