//! The analysis stages
//!
//! Each stage takes the loaded tables by reference and derives the columns it
//! needs on its own copies. It writes a transcript to `out`, renders its
//! charts into the output directory and returns what it computed. Tests that
//! cannot run on the data are logged, recorded as skipped and do not stop the
//! stage; loading and schema errors do.

use crate::config::AnalysisConfig;
use perch_core::moments::linear_fit;
use perch_core::{Error, Result};
use perch_frame::aggregate::{self, column_max, describe_boundaries};
use perch_frame::schema::{EVENT_DATE_COLUMNS, WINDOW_DATE_COLUMNS};
use perch_frame::{
    bucketize_column, coerce_categorical, contingency, derive_season, group_mean, load_csv,
    samples_by_group, value_counts, ContingencyTable, Describe, GroupMeans, Level, Schema, Season,
    Table, ValueCounts,
};
use perch_inference::{
    spearman_columns, spearman_matrix, ChiSquareTest, DesignColumn, LogisticFit,
    LogisticRegression, MannWhitney, ModelSpec, PredictorValue, TestResult,
};
use perch_report::{
    format_result, render_svg, write_summary, ChartKind, ChartSpec, Interval, ReportEntry, Series,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// File name of the seasonal summary inside the output directory
pub const SUMMARY_FILE: &str = "seasonal_results_summary.txt";

/// Numeric window columns shown in the correlation heatmap
pub const WINDOW_NUMERIC_COLUMNS: [&str; 4] = [
    "bat_landing_number",
    "food_availability",
    "rat_minutes",
    "rat_arrival_number",
];

const PROBABILITY_GRID_POINTS: usize = 100;

/// The two input tables, validated against their schemas
#[derive(Debug, Clone)]
pub struct Dataset {
    pub events: Table,
    pub windows: Table,
}

impl Dataset {
    #[instrument(skip_all)]
    pub fn load(config: &AnalysisConfig) -> Result<Self> {
        let events = load_csv(&config.events_path, "events", EVENT_DATE_COLUMNS)?;
        Schema::events(&config.event_season_column).validate(&events)?;
        let windows = load_csv(&config.windows_path, "windows", WINDOW_DATE_COLUMNS)?;
        Schema::windows(&config.window_season_column).validate(&windows)?;
        Ok(Self { events, windows })
    }
}

/// Which stages to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Inspect,
    Describe,
    Infer,
    Seasonal,
    All,
}

/// Run `stage` (every stage, in order, for [`Stage::All`])
pub fn run(stage: Stage, data: &Dataset, config: &AnalysisConfig, out: &mut dyn Write) -> Result<()> {
    match stage {
        Stage::Inspect => inspect(data, out).map(drop),
        Stage::Describe => describe(data, config, out).map(drop),
        Stage::Infer => infer(data, config, out).map(drop),
        Stage::Seasonal => seasonal(data, config, out).map(drop),
        Stage::All => {
            inspect(data, out)?;
            describe(data, config, out)?;
            infer(data, config, out)?;
            seasonal(data, config, out)?;
            Ok(())
        }
    }
}

/// Shapes reported by [`inspect`]
#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub events_shape: (usize, usize),
    pub windows_shape: (usize, usize),
}

/// Shape, preview, types, missing values and summaries of both tables
#[instrument(skip_all)]
pub fn inspect(data: &Dataset, out: &mut dyn Write) -> Result<InspectReport> {
    for table in [&data.events, &data.windows] {
        inspect_table(table, out)?;
    }
    Ok(InspectReport {
        events_shape: data.events.shape(),
        windows_shape: data.windows.shape(),
    })
}

fn inspect_table(table: &Table, out: &mut dyn Write) -> Result<()> {
    let (rows, columns) = table.shape();
    writeln!(out, "=== {} ===", table.name())?;
    writeln!(out, "shape: {rows} rows × {columns} columns")?;
    writeln!(out)?;
    writeln!(out, "{}", table.head(5))?;

    writeln!(out, "column types:")?;
    for (name, dtype) in table.dtypes() {
        writeln!(out, "  {name:<28} {dtype}")?;
    }
    writeln!(out, "missing values:")?;
    for (name, count) in table.null_counts() {
        writeln!(out, "  {name:<28} {count}")?;
    }
    for name in table.column_names() {
        if table.is_numeric(&name) {
            writeln!(out, "{name}:")?;
            write!(out, "{}", aggregate::describe(table, &name)?)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// Results of [`describe`]
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeReport {
    pub risk_counts: ValueCounts,
    pub reward_counts: ValueCounts,
    pub crosstab: ContingencyTable,
    pub summaries: Vec<(String, Describe)>,
    pub landing_by_risk: GroupMeans,
    /// Window means per rat-arrival bucket, then per rat-minutes bucket
    pub bucket_means: Vec<GroupMeans>,
    pub charts: Vec<PathBuf>,
}

/// Frequencies, cross-tabulation, summaries and bucketed group means
#[instrument(skip_all)]
pub fn describe(data: &Dataset, config: &AnalysisConfig, out: &mut dyn Write) -> Result<DescribeReport> {
    writeln!(out, "=== Descriptive analysis ===")?;
    let mut categorical = vec!["risk", "reward"];
    // A timestamp season source stays a timestamp
    if !data.events.is_datetime(&config.event_season_column) {
        categorical.push(config.event_season_column.as_str());
    }
    let events = coerce_categorical(&data.events, &categorical)?;

    let risk_counts = value_counts(&events, "risk")?;
    let reward_counts = value_counts(&events, "reward")?;
    write!(out, "{risk_counts}{reward_counts}")?;

    let crosstab = contingency(&events, "risk", "reward")?;
    writeln!(out, "Crosstab risk × reward:")?;
    write!(out, "{crosstab}")?;

    let mut summaries = Vec::new();
    for (table, column) in [
        (&events, "bat_landing_to_food"),
        (&data.windows, "bat_landing_number"),
        (&data.windows, "rat_arrival_number"),
        (&data.windows, "rat_minutes"),
        (&data.windows, "food_availability"),
    ] {
        let summary = aggregate::describe(table, column)?;
        writeln!(out, "{column}:")?;
        write!(out, "{summary}")?;
        summaries.push((column.to_string(), summary));
    }

    let landing_by_risk = group_mean(&events, "risk", "bat_landing_to_food")?;
    write!(out, "{landing_by_risk}")?;

    let mut windows = data.windows.clone();
    let mut bucket_means = Vec::new();
    for (column, target, bucket_config) in [
        ("rat_arrival_number", "rat_arrival_bucket", &config.rat_arrival_buckets),
        ("rat_minutes", "rat_minutes_bucket", &config.rat_minutes_buckets),
    ] {
        let buckets = bucket_config.buckets(column_max(&windows, column)?)?;
        debug!(column, boundaries = %describe_boundaries(buckets.boundaries()), "bucketizing");
        windows = bucketize_column(&windows, column, &buckets, target)?;
        for value in ["bat_landing_number", "food_availability"] {
            let mut means = group_mean(&windows, target, value)?;
            means.groups.sort_by_key(|g| {
                buckets
                    .labels()
                    .iter()
                    .position(|l| g.level == Level::from(l.as_str()))
            });
            write!(out, "{means}")?;
            bucket_means.push(means);
        }
    }

    let mut charts = Vec::new();
    let landing = events.numeric_values("bat_landing_to_food")?;
    if !landing.is_empty() {
        charts.push((
            "landing_to_food_histogram",
            ChartSpec::new(
                ChartKind::Histogram {
                    bins: config.histogram_bins,
                },
                "Time from landing to food approach",
            )
            .x_label("bat_landing_to_food (s)")
            .y_label("count")
            .series(Series::values("bat_landing_to_food", landing)),
        ));
    }
    if crosstab.total() > 0 {
        charts.push(("risk_by_reward", crosstab_chart(&crosstab, ChartKind::Bar, "Risk by reward", false)));
    }
    if let Some(spec) = box_by_group(&events, "risk", "seconds_after_rat_arrival", "Seconds after rat arrival by risk")? {
        charts.push(("seconds_after_rat_by_risk", spec));
    }
    for (name, x, y) in [
        ("rat_arrivals_vs_landings", "rat_arrival_number", "bat_landing_number"),
        ("rat_minutes_vs_landings", "rat_minutes", "bat_landing_number"),
        ("rat_minutes_vs_food", "rat_minutes", "food_availability"),
    ] {
        if let Some(spec) = scatter(&data.windows, x, y, false)? {
            charts.push((name, spec));
        }
    }

    Ok(DescribeReport {
        risk_counts,
        reward_counts,
        crosstab,
        summaries,
        landing_by_risk,
        bucket_means,
        charts: render_charts(&config.output_dir, charts)?,
    })
}

/// Entries and charts of a hypothesis-testing stage
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub entries: Vec<ReportEntry>,
    pub charts: Vec<PathBuf>,
}

impl TestReport {
    pub fn entry(&self, test: &str, grouping: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|e| e.test == test && e.grouping == grouping)
    }
}

/// Risk/reward association, landing times by risk, risk model and window correlations
#[instrument(skip_all)]
pub fn infer(data: &Dataset, config: &AnalysisConfig, out: &mut dyn Write) -> Result<TestReport> {
    writeln!(out, "=== Inferential analysis ===")?;
    let events = coerce_categorical(&data.events, &["risk", "reward"])?;
    let events = derive_season(&events, &config.event_season_column, "season", &config.event_season)?;
    let minutes = events
        .numeric("seconds_after_rat_arrival")?
        .iter()
        .map(|v| v.map(|s| s / 60.0))
        .collect();
    let events = events.with_numeric("minutes_after_rat_arrival", minutes)?;

    let mut entries = Vec::new();
    let mut charts = Vec::new();

    let crosstab = contingency(&events, "risk", "reward")?;
    settle(
        out,
        &mut entries,
        "Chi-square risk x reward",
        "all events",
        chi_square(config).test(&crosstab).map(Into::into),
    )?;
    if crosstab.total() > 0 {
        charts.push(("risk_reward_counts", crosstab_chart(&crosstab, ChartKind::Bar, "Risk by reward", false)));
        charts.push((
            "risk_reward_percent",
            crosstab_chart(&crosstab, ChartKind::StackedBar, "Reward share within risk", true),
        ));
    }

    settle(
        out,
        &mut entries,
        "Mann-Whitney bat_landing_to_food",
        "risk 0 vs 1",
        rank_sum_by(&events, "risk", &Level::Number(0.0), &Level::Number(1.0), "bat_landing_to_food", config),
    )?;
    if let Some(spec) = box_by_group(&events, "risk", "bat_landing_to_food", "Landing to food by risk")? {
        charts.push(("landing_to_food_by_risk", spec));
    }

    let model = ModelSpec::new("risk")
        .numeric("minutes_after_rat_arrival")
        .categorical("season");
    let outcome = logistic(config).fit(&events, &model).map(Into::into);
    if let Some(TestResult::LogisticRegression(fit)) =
        settle(out, &mut entries, "Logistic regression risk", "minutes + season", outcome)?
    {
        if let Some(spec) = odds_ratio_chart(&fit, "Odds ratios for risk-taking") {
            charts.push(("risk_odds_ratios", spec));
        }
        if let Some(spec) = probability_curves(&fit, &events, "minutes_after_rat_arrival", "season")? {
            charts.push(("risk_probability_by_minutes", spec));
        }
    }

    for (name, x, y) in [
        ("rat_arrivals_vs_landings_trend", "rat_arrival_number", "bat_landing_number"),
        ("rat_minutes_vs_food_trend", "rat_minutes", "food_availability"),
    ] {
        settle(
            out,
            &mut entries,
            &format!("Spearman {x} vs {y}"),
            "all windows",
            spearman_columns(&data.windows, x, y).map(Into::into),
        )?;
        if let Some(spec) = scatter(&data.windows, x, y, true)? {
            charts.push((name, spec));
        }
    }

    write_entries(out, &entries)?;
    Ok(TestReport {
        entries,
        charts: render_charts(&config.output_dir, charts)?,
    })
}

/// [`TestReport`] of the seasonal stage plus the summary file it wrote
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalReport {
    pub tests: TestReport,
    pub summary: PathBuf,
}

/// Winter/spring comparisons on both tables, written to the summary file
#[instrument(skip_all)]
pub fn seasonal(data: &Dataset, config: &AnalysisConfig, out: &mut dyn Write) -> Result<SeasonalReport> {
    writeln!(out, "=== Seasonal analysis ===")?;
    let events = coerce_categorical(&data.events, &["risk", "reward"])?;
    let events = derive_season(&events, &config.event_season_column, "season", &config.event_season)?;
    let windows = derive_season(&data.windows, &config.window_season_column, "season", &config.window_season)?;
    write!(out, "{}", value_counts(&events, "season")?)?;
    write!(out, "{}", value_counts(&windows, "season")?)?;

    let mut entries = Vec::new();
    let mut charts = Vec::new();

    for column in ["risk", "reward"] {
        let crosstab = contingency(&events, "season", column)?;
        settle(
            out,
            &mut entries,
            &format!("Chi-square season x {column}"),
            "events",
            chi_square(config).test(&crosstab).map(Into::into),
        )?;
        if column == "risk" && crosstab.total() > 0 {
            charts.push(("risk_by_season", crosstab_chart(&crosstab, ChartKind::StackedBar, "Risk by season", false)));
        }
    }

    let (winter, spring) = (Level::from("winter"), Level::from("spring"));
    settle(
        out,
        &mut entries,
        "Mann-Whitney bat_landing_to_food",
        "winter vs spring",
        rank_sum_by(&events, "season", &winter, &spring, "bat_landing_to_food", config),
    )?;
    if let Some(spec) = box_by_group(&events, "season", "bat_landing_to_food", "Landing to food by season")? {
        charts.push(("landing_to_food_by_season", spec));
    }

    for season in Season::ALL {
        let Some(level) = season.level() else {
            continue;
        };
        let subset = windows.filter_eq("season", &level)?;
        let outcome = if subset.n_rows() < config.min_group_size {
            Err(Error::InsufficientSample {
                group: format!("{season} windows"),
                required: config.min_group_size,
                actual: subset.n_rows(),
            })
        } else {
            spearman_columns(&subset, "rat_arrival_number", "bat_landing_number").map(Into::into)
        };
        settle(
            out,
            &mut entries,
            "Spearman rat_arrival_number vs bat_landing_number",
            &season.to_string(),
            outcome,
        )?;
        if season == Season::Winter {
            if let Some(spec) = scatter(&subset, "rat_arrival_number", "bat_landing_number", true)? {
                charts.push(("winter_rat_arrivals_vs_landings", spec));
            }
        }
    }

    let model = ModelSpec::new("risk")
        .categorical("season")
        .numeric("seconds_after_rat_arrival")
        .numeric("hours_after_sunset");
    settle(
        out,
        &mut entries,
        "Logistic regression risk",
        "season + seconds_after_rat_arrival + hours_after_sunset",
        logistic(config).fit(&events, &model).map(Into::into),
    )?;

    let matrix = spearman_matrix(&windows, &WINDOW_NUMERIC_COLUMNS)?;
    writeln!(out, "Spearman correlations (windows):")?;
    write!(out, "{matrix}")?;
    charts.push((
        "window_correlations",
        ChartSpec::new(ChartKind::Heatmap, "Spearman correlations of window measures")
            .categories(matrix.names.clone())
            .series(Series::matrix("rho", matrix.values.clone())),
    ));

    write_entries(out, &entries)?;
    let summary = config.output_dir.join(SUMMARY_FILE);
    write_summary(&summary, "Seasonal analysis results", &entries)?;

    Ok(SeasonalReport {
        tests: TestReport {
            entries,
            charts: render_charts(&config.output_dir, charts)?,
        },
        summary,
    })
}

fn chi_square(config: &AnalysisConfig) -> ChiSquareTest {
    ChiSquareTest::new().with_continuity_correction(config.continuity_correction)
}

fn logistic(config: &AnalysisConfig) -> LogisticRegression {
    LogisticRegression::new()
        .with_max_iterations(config.max_iterations)
        .with_tolerance(config.tolerance)
        .with_confidence_level(config.confidence_level)
}

/// Mann-Whitney U of `value` between two levels of `group`
fn rank_sum_by(
    table: &Table,
    group: &str,
    first: &Level,
    second: &Level,
    value: &str,
    config: &AnalysisConfig,
) -> Result<TestResult> {
    let samples = samples_by_group(table, group, value)?;
    let sample = |level: &Level| -> Vec<f64> {
        samples
            .iter()
            .find(|(l, _)| l == level)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };
    MannWhitney::new()
        .with_min_group_size(config.min_group_size)
        .compare(
            &format!("{group}={first}"),
            &sample(first),
            &format!("{group}={second}"),
            &sample(second),
        )
        .map(Into::into)
}

/// Print and record a test outcome
///
/// Recoverable failures become skipped entries; anything else is returned.
fn settle(
    out: &mut dyn Write,
    entries: &mut Vec<ReportEntry>,
    test: &str,
    grouping: &str,
    outcome: Result<TestResult>,
) -> Result<Option<TestResult>> {
    match outcome {
        Ok(result) => {
            writeln!(out, "{test} ({grouping})")?;
            writeln!(out, "{}", format_result(&result))?;
            entries.push(ReportEntry::completed(test, grouping, result.clone()));
            Ok(Some(result))
        }
        Err(e) if e.is_recoverable() => {
            warn!(test, grouping, error = %e, "test skipped");
            let entry = ReportEntry::skipped(test, grouping, e.to_string());
            writeln!(out, "{}", entry.line())?;
            writeln!(out)?;
            entries.push(entry);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn write_entries(out: &mut dyn Write, entries: &[ReportEntry]) -> Result<()> {
    writeln!(out, "Summary:")?;
    for entry in entries {
        writeln!(out, "  {}", entry.line())?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_charts(dir: &Path, charts: Vec<(&str, ChartSpec)>) -> Result<Vec<PathBuf>> {
    let paths = charts
        .into_iter()
        .map(|(name, spec)| {
            let path = dir.join(format!("{name}.svg"));
            render_svg(&spec, &path)?;
            std::fs::write(path.with_extension("json"), spec.to_json()?)?;
            Ok(path)
        })
        .collect::<Result<Vec<_>>>()?;
    info!(count = paths.len(), dir = %dir.display(), "rendered charts");
    Ok(paths)
}

/// Bars per row level, one series per column level
fn crosstab_chart(crosstab: &ContingencyTable, kind: ChartKind, title: &str, percent: bool) -> ChartSpec {
    let rows: Vec<Vec<f64>> = if percent {
        crosstab.row_percentages()
    } else {
        crosstab
            .counts()
            .iter()
            .map(|r| r.iter().map(|&c| c as f64).collect())
            .collect()
    };
    let spec = ChartSpec::new(kind, title)
        .x_label(crosstab.row_name.as_str())
        .y_label(if percent { "percent" } else { "count" })
        .categories(crosstab.row_levels.iter().map(ToString::to_string));
    crosstab
        .col_levels
        .iter()
        .enumerate()
        .fold(spec, |spec, (j, level)| {
            spec.series(Series::values(
                format!("{}={level}", crosstab.col_name),
                rows.iter().map(|r| r[j]).collect(),
            ))
        })
}

fn box_by_group(table: &Table, group: &str, value: &str, title: &str) -> Result<Option<ChartSpec>> {
    let series: Vec<Series> = samples_by_group(table, group, value)?
        .into_iter()
        .filter(|(_, sample)| !sample.is_empty())
        .map(|(level, sample)| Series::values(format!("{group}={level}"), sample))
        .collect();
    if series.is_empty() {
        return Ok(None);
    }
    let spec = ChartSpec::new(ChartKind::BoxPlot, title).x_label(group).y_label(value);
    Ok(Some(series.into_iter().fold(spec, ChartSpec::series)))
}

/// Scatter of complete pairs, optionally with a least-squares trend line
fn scatter(table: &Table, x: &str, y: &str, trend: bool) -> Result<Option<ChartSpec>> {
    let (xs, ys) = table.paired_numeric(x, y)?;
    if xs.is_empty() {
        return Ok(None);
    }
    let points = xs.iter().copied().zip(ys.iter().copied()).collect();
    let mut spec = ChartSpec::new(ChartKind::Scatter, format!("{y} vs {x}"))
        .x_label(x)
        .y_label(y)
        .series(Series::points(table.name(), points));
    if trend {
        match linear_fit(&xs, &ys) {
            Ok((slope, intercept)) => {
                let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                spec = spec.series(Series::line(
                    "trend",
                    vec![(lo, slope * lo + intercept), (hi, slope * hi + intercept)],
                ));
            }
            Err(e) if e.is_recoverable() => debug!(x, y, error = %e, "no trend line"),
            Err(e) => return Err(e),
        }
    }
    Ok(Some(spec))
}

/// Odds ratio and interval of every non-intercept coefficient
fn odds_ratio_chart(fit: &LogisticFit, title: &str) -> Option<ChartSpec> {
    let intervals: Vec<Interval> = fit
        .columns
        .iter()
        .zip(&fit.coefficients)
        .filter(|(column, _)| !matches!(column, DesignColumn::Intercept))
        .map(|(_, c)| {
            let (lower, upper) = c.odds_ratio_ci();
            Interval {
                label: c.term.clone(),
                estimate: c.odds_ratio(),
                lower,
                upper,
            }
        })
        .collect();
    if intervals.is_empty() {
        return None;
    }
    Some(
        ChartSpec::new(ChartKind::Forest { reference: 1.0 }, title)
            .x_label("odds ratio")
            .series(Series::intervals(fit.spec.to_string(), intervals)),
    )
}

/// Levels of a categorical term known to a fitted model, reference first
fn model_levels(fit: &LogisticFit, term: &str) -> Vec<Level> {
    let reference = fit
        .references
        .iter()
        .filter(|(t, _)| t == term)
        .map(|(_, level)| level.clone());
    let indicators = fit.columns.iter().filter_map(|c| match c {
        DesignColumn::Indicator { term: t, level } if t == term => Some(level.clone()),
        _ => None,
    });
    reference.chain(indicators).collect()
}

/// Predicted probability over a grid of `numeric`, one line per level of `categorical`
fn probability_curves(
    fit: &LogisticFit,
    table: &Table,
    numeric: &str,
    categorical: &str,
) -> Result<Option<ChartSpec>> {
    let values = table.numeric_values(numeric)?;
    let levels = model_levels(fit, categorical);
    let (Some(lo), Some(hi)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Ok(None);
    };
    if levels.is_empty() {
        return Ok(None);
    }

    let step = (hi - lo) / (PROBABILITY_GRID_POINTS - 1) as f64;
    let mut spec = ChartSpec::new(ChartKind::Line, "Predicted probability of risk-taking")
        .x_label(numeric)
        .y_label("P(risk = 1)");
    for level in levels {
        let points = (0..PROBABILITY_GRID_POINTS)
            .map(|i| {
                let x = lo + step * i as f64;
                let p = fit.predict(&[
                    (numeric, PredictorValue::Number(x)),
                    (categorical, PredictorValue::Level(level.clone())),
                ])?;
                Ok((x, p))
            })
            .collect::<Result<Vec<_>>>()?;
        spec = spec.series(Series::line(format!("{categorical}={level}"), points));
    }
    Ok(Some(spec))
}
