//! Plain-text rendering of test results and the summary file

use perch_core::Result;
use perch_inference::{LogisticFit, PValueMethod, TestResult};
use std::fmt::{self, Write as _};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Multi-line description of one result
pub fn format_result(result: &TestResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_result(&mut out, result);
    out
}

fn write_result(out: &mut String, result: &TestResult) -> fmt::Result {
    match result {
        TestResult::Independence(r) => {
            writeln!(out, "Chi-square test of independence: {} × {}", r.observed.row_name, r.observed.col_name)?;
            write!(out, "{}", r.observed)?;
            writeln!(
                out,
                "chi2 = {:.3}, df = {}, p = {:.6}{}",
                r.statistic,
                r.dof,
                r.p_value,
                if r.corrected { " (Yates-corrected)" } else { "" }
            )?;
            writeln!(out, "{}", r.effect)
        }
        TestResult::RankSum(r) => {
            writeln!(out, "Mann-Whitney U: {} (n={}) vs {} (n={})", r.first, r.n1, r.second, r.n2)?;
            let method = match r.method {
                PValueMethod::Exact => "exact",
                PValueMethod::Asymptotic => "normal approximation",
            };
            writeln!(out, "U = {:.1}, p = {:.6} ({method})", r.u, r.p_value)?;
            writeln!(out, "{}", r.effect)?;
            writeln!(out, "Means: {} -> {:.3}, {} -> {:.3}", r.first, r.mean1, r.second, r.mean2)
        }
        TestResult::RankCorrelation(r) => {
            writeln!(out, "Spearman correlation: {} vs {} (n={})", r.x_name, r.y_name, r.n)?;
            writeln!(out, "rho = {:.3}, p = {:.6}", r.rho, r.p_value)?;
            writeln!(out, "{}", r.effect)
        }
        TestResult::LogisticRegression(fit) => {
            writeln!(out, "Logistic regression: {}", fit.spec)?;
            writeln!(
                out,
                "n = {}, iterations = {}, log-likelihood = {:.3}, null log-likelihood = {:.3}",
                fit.n_obs, fit.iterations, fit.log_likelihood, fit.null_log_likelihood
            )?;
            writeln!(
                out,
                "pseudo R² = {:.4}, LLR = {:.3}, LLR p = {:.6}",
                fit.pseudo_r2, fit.lr_statistic, fit.lr_p_value
            )?;
            for (term, level) in &fit.references {
                writeln!(out, "reference level of {term}: {level}")?;
            }
            write!(out, "{}", CoefficientTable(fit))?;
            writeln!(out)?;
            writeln!(out, "Odds ratios ({:.0}% CI):", fit.confidence_level * 100.0)?;
            write!(out, "{}", OddsRatioTable(fit))
        }
    }
}

/// One line of the summary file
pub fn summary_line(test: &str, grouping: &str, result: &TestResult) -> String {
    let kind = result.kind();
    let precision = if matches!(result, TestResult::RankSum(_)) { 1 } else { 3 };
    format!(
        "{test} ({grouping}): {}={:.precision$}, p={:.4}",
        kind.statistic_name(),
        result.statistic(),
        result.p_value()
    )
}

/// Summary line for a test that did not run
pub fn skipped_line(test: &str, grouping: &str, reason: &str) -> String {
    format!("{test} ({grouping}): skipped ({reason})")
}

/// What happened to one planned test
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(TestResult),
    Skipped { reason: String },
}

/// A planned test with its grouping label and outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub test: String,
    pub grouping: String,
    pub outcome: Outcome,
}

impl ReportEntry {
    pub fn completed(test: impl Into<String>, grouping: impl Into<String>, result: TestResult) -> Self {
        Self {
            test: test.into(),
            grouping: grouping.into(),
            outcome: Outcome::Completed(result),
        }
    }

    pub fn skipped(test: impl Into<String>, grouping: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            test: test.into(),
            grouping: grouping.into(),
            outcome: Outcome::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn result(&self) -> Option<&TestResult> {
        match &self.outcome {
            Outcome::Completed(result) => Some(result),
            Outcome::Skipped { .. } => None,
        }
    }

    pub fn line(&self) -> String {
        match &self.outcome {
            Outcome::Completed(result) => summary_line(&self.test, &self.grouping, result),
            Outcome::Skipped { reason } => skipped_line(&self.test, &self.grouping, reason),
        }
    }
}

/// Write one summary line per entry under a title, creating parent directories
pub fn write_summary(path: &Path, title: &str, entries: &[ReportEntry]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "=== {title} ===")?;
    writeln!(writer)?;
    for entry in entries {
        writeln!(writer, "{}", entry.line())?;
    }
    writer.flush()?;
    info!(path = %path.display(), lines = entries.len(), "wrote summary");
    Ok(())
}

/// Estimates, standard errors, z scores and Wald intervals
pub struct CoefficientTable<'a>(pub &'a LogisticFit);

impl fmt::Display for CoefficientTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = term_width(self.0);
        writeln!(
            f,
            "{:<width$}  {:>10}  {:>10}  {:>8}  {:>8}  {:>10}  {:>10}",
            "term", "coef", "std err", "z", "P>|z|", "lower", "upper"
        )?;
        for c in &self.0.coefficients {
            writeln!(
                f,
                "{:<width$}  {:>10.4}  {:>10.4}  {:>8.3}  {:>8.4}  {:>10.4}  {:>10.4}",
                c.term, c.estimate, c.std_error, c.z, c.p_value, c.ci_lower, c.ci_upper
            )?;
        }
        Ok(())
    }
}

/// Exponentiated coefficients with their intervals
pub struct OddsRatioTable<'a>(pub &'a LogisticFit);

impl fmt::Display for OddsRatioTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = term_width(self.0);
        writeln!(
            f,
            "{:<width$}  {:>10}  {:>10}  {:>10}  {:>10}",
            "term", "OR", "CI_lower", "CI_upper", "p_value"
        )?;
        for c in &self.0.coefficients {
            let (lower, upper) = c.odds_ratio_ci();
            writeln!(
                f,
                "{:<width$}  {:>10.4}  {:>10.4}  {:>10.4}  {:>10.6}",
                c.term,
                c.odds_ratio(),
                lower,
                upper,
                c.p_value
            )?;
        }
        Ok(())
    }
}

fn term_width(fit: &LogisticFit) -> usize {
    fit.coefficients
        .iter()
        .map(|c| c.term.chars().count())
        .max()
        .unwrap_or(0)
        .max(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_frame::{ContingencyTable, Level, Table};
    use polars::prelude::{df, NamedFrom};
    use perch_inference::{spearman, ChiSquareTest, LogisticRegression, MannWhitney, ModelSpec};
    use proptest::prelude::*;

    fn chi_square() -> TestResult {
        let levels = vec![Level::Number(0.0), Level::Number(1.0)];
        let table = ContingencyTable::from_counts(
            "season",
            "risk",
            vec![Level::from("winter"), Level::from("spring")],
            levels,
            vec![vec![40, 10], vec![5, 45]],
        )
        .unwrap();
        ChiSquareTest::new().test(&table).unwrap().into()
    }

    fn logistic() -> TestResult {
        let frame = df![
            "risk" => [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
            "minutes" => (1..=12).map(f64::from).collect::<Vec<_>>(),
        ]
        .unwrap();
        let table = Table::new("t", frame);
        LogisticRegression::new()
            .fit(&table, &ModelSpec::new("risk").numeric("minutes"))
            .unwrap()
            .into()
    }

    fn all_results() -> Vec<TestResult> {
        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let y: Vec<f64> = (0..12).map(|i| f64::from(i) * 1.5 + 4.0).collect();
        vec![
            chi_square(),
            MannWhitney::new().compare("winter", &x, "spring", &y).unwrap().into(),
            spearman(&x, &y).unwrap().into(),
            logistic(),
        ]
    }

    #[test]
    fn test_every_variant_formats() {
        for result in all_results() {
            let text = format_result(&result);
            assert!(text.lines().count() >= 2, "{text}");
            assert!(text.contains(result.kind().name()) || text.contains("test of independence"));
        }
    }

    #[test]
    fn test_summary_line_format() {
        let line = summary_line("Chi-square", "Risk vs Season", &chi_square());
        assert!(line.starts_with("Chi-square (Risk vs Season): chi2="));
        assert!(line.contains(", p=0.0000"));
    }

    #[test]
    fn test_skipped_line() {
        let entry = ReportEntry::skipped("Mann-Whitney U", "Landing Speed", "insufficient sample");
        assert_eq!(entry.line(), "Mann-Whitney U (Landing Speed): skipped (insufficient sample)");
        assert!(entry.result().is_none());
    }

    #[test]
    fn test_odds_ratio_table() {
        match logistic() {
            TestResult::LogisticRegression(fit) => {
                let table = OddsRatioTable(&fit).to_string();
                assert_eq!(table.lines().count(), 3);
                assert!(table.lines().nth(2).unwrap().starts_with("minutes"));
            }
            other => panic!("unexpected {:?}", other.kind()),
        }
    }

    proptest! {
        #[test]
        fn prop_summary_line_shape(counts in prop::array::uniform4(1u64..60)) {
            let levels = vec![Level::Number(0.0), Level::Number(1.0)];
            let table = ContingencyTable::from_counts(
                "risk",
                "reward",
                levels.clone(),
                levels,
                vec![vec![counts[0], counts[1]], vec![counts[2], counts[3]]],
            )
            .unwrap();
            let result: TestResult = ChiSquareTest::new().test(&table).unwrap().into();
            let line = summary_line("Chi-square", "events", &result);
            prop_assert!(line.starts_with("Chi-square (events): chi2="));
            let p: f64 = line.rsplit("p=").next().unwrap().parse().unwrap();
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
