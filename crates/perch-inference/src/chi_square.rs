//! Chi-square test of independence on a contingency table

use crate::distribution::chi_square_upper;
use perch_core::{Error, Result};
use perch_effect::{ContingencyEffectSize, CramersV, EffectSize};
use perch_frame::ContingencyTable;
use tracing::{debug, instrument};

/// Result of a chi-square independence test
#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub dof: usize,
    pub p_value: f64,
    /// Expected counts under independence, same shape as the observed table
    pub expected: Vec<Vec<f64>>,
    pub observed: ContingencyTable,
    /// Whether Yates' continuity correction was applied
    pub corrected: bool,
    /// Cramér's V
    pub effect: EffectSize,
}

impl ChiSquareResult {
    pub fn n(&self) -> u64 {
        self.observed.total()
    }
}

/// Pearson's chi-square independence test
#[derive(Debug, Clone, Copy)]
pub struct ChiSquareTest {
    continuity_correction: bool,
}

impl Default for ChiSquareTest {
    fn default() -> Self {
        Self::new()
    }
}

impl ChiSquareTest {
    /// Test with Yates' correction on 2×2 tables
    pub fn new() -> Self {
        Self {
            continuity_correction: true,
        }
    }

    pub fn with_continuity_correction(mut self, enabled: bool) -> Self {
        self.continuity_correction = enabled;
        self
    }

    /// Run the test
    ///
    /// A zero row or column total leaves expected counts undefined and is
    /// reported as [`Error::Degenerate`].
    #[instrument(skip(self, table), fields(rows = %table.row_name, cols = %table.col_name))]
    pub fn test(&self, table: &ContingencyTable) -> Result<ChiSquareResult> {
        let (r, c) = (table.n_rows(), table.n_cols());
        if r < 2 || c < 2 {
            return Err(Error::Degenerate(format!(
                "{} × {} needs at least two levels each, got {r}×{c}",
                table.row_name, table.col_name
            )));
        }

        let row_totals = table.row_totals();
        let col_totals = table.col_totals();
        if let Some(i) = row_totals.iter().position(|&t| t == 0) {
            return Err(Error::Degenerate(format!(
                "{}={} has no observations",
                table.row_name, table.row_levels[i]
            )));
        }
        if let Some(j) = col_totals.iter().position(|&t| t == 0) {
            return Err(Error::Degenerate(format!(
                "{}={} has no observations",
                table.col_name, table.col_levels[j]
            )));
        }

        let n = table.total() as f64;
        let expected = expected_counts(&row_totals, &col_totals, n);

        let dof = (r - 1) * (c - 1);
        let corrected = self.continuity_correction && dof == 1;

        let mut statistic = 0.0;
        for (i, row) in expected.iter().enumerate() {
            for (j, &e) in row.iter().enumerate() {
                let diff = table.get(i, j) as f64 - e;
                let diff = if corrected {
                    // Move each observed count up to 0.5 toward its expectation
                    diff.abs() - diff.abs().min(0.5)
                } else {
                    diff.abs()
                };
                statistic += diff * diff / e;
            }
        }

        let p_value = chi_square_upper(statistic, dof as f64)?;
        let effect = CramersV::new().from_chi_square(statistic, table.total(), r, c)?;
        debug!(statistic, dof, p_value, corrected, "chi-square test");

        Ok(ChiSquareResult {
            statistic,
            dof,
            p_value,
            expected,
            observed: table.clone(),
            corrected,
            effect,
        })
    }
}

/// Row total × column total / n for every cell
pub fn expected_counts(row_totals: &[u64], col_totals: &[u64], n: f64) -> Vec<Vec<f64>> {
    row_totals
        .iter()
        .map(|&rt| {
            col_totals
                .iter()
                .map(|&ct| rt as f64 * ct as f64 / n)
                .collect()
        })
        .collect()
}
