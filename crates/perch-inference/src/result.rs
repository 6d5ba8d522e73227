//! Tagged union over the supported tests

use crate::{ChiSquareResult, LogisticFit, RankSumResult, SpearmanResult};

/// Which test produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Independence,
    RankSum,
    RankCorrelation,
    LogisticRegression,
}

impl TestKind {
    /// Human-readable test name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Independence => "Chi-square",
            Self::RankSum => "Mann-Whitney U",
            Self::RankCorrelation => "Spearman",
            Self::LogisticRegression => "Logistic regression",
        }
    }

    /// Name of the headline statistic
    pub fn statistic_name(&self) -> &'static str {
        match self {
            Self::Independence => "chi2",
            Self::RankSum => "U",
            Self::RankCorrelation => "rho",
            Self::LogisticRegression => "LLR",
        }
    }
}

/// Outcome of one hypothesis test
#[derive(Debug, Clone, PartialEq)]
pub enum TestResult {
    Independence(ChiSquareResult),
    RankSum(RankSumResult),
    RankCorrelation(SpearmanResult),
    LogisticRegression(LogisticFit),
}

impl TestResult {
    pub fn kind(&self) -> TestKind {
        match self {
            Self::Independence(_) => TestKind::Independence,
            Self::RankSum(_) => TestKind::RankSum,
            Self::RankCorrelation(_) => TestKind::RankCorrelation,
            Self::LogisticRegression(_) => TestKind::LogisticRegression,
        }
    }

    /// Headline statistic; the likelihood-ratio statistic for regressions
    pub fn statistic(&self) -> f64 {
        match self {
            Self::Independence(r) => r.statistic,
            Self::RankSum(r) => r.u,
            Self::RankCorrelation(r) => r.rho,
            Self::LogisticRegression(r) => r.lr_statistic,
        }
    }

    pub fn p_value(&self) -> f64 {
        match self {
            Self::Independence(r) => r.p_value,
            Self::RankSum(r) => r.p_value,
            Self::RankCorrelation(r) => r.p_value,
            Self::LogisticRegression(r) => r.lr_p_value,
        }
    }
}

impl From<ChiSquareResult> for TestResult {
    fn from(result: ChiSquareResult) -> Self {
        Self::Independence(result)
    }
}

impl From<RankSumResult> for TestResult {
    fn from(result: RankSumResult) -> Self {
        Self::RankSum(result)
    }
}

impl From<SpearmanResult> for TestResult {
    fn from(result: SpearmanResult) -> Self {
        Self::RankCorrelation(result)
    }
}

impl From<LogisticFit> for TestResult {
    fn from(result: LogisticFit) -> Self {
        Self::LogisticRegression(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spearman;

    #[test]
    fn test_kind_and_accessors() {
        let result: TestResult = spearman(&[1.0, 2.0, 3.0, 4.0], &[2.0, 1.0, 4.0, 3.0]).unwrap().into();
        assert_eq!(result.kind(), TestKind::RankCorrelation);
        assert_eq!(result.kind().statistic_name(), "rho");
        assert!((result.statistic() - 0.6).abs() < 1e-12);
        assert!(result.p_value() > 0.05);
    }
}
