//! Grouped aggregation: contingency tables, group means, buckets and summaries
//!
//! Counting and averaging run as polars lazy queries over the table's frame;
//! the results are then laid out in the sorted level order of the grouping
//! columns so that empty groups still appear.

use crate::table::{format_number, Categories, Level, Table};
use perch_core::{Error, Result};
use polars::prelude::*;
use std::fmt;

/// Cross-tabulated counts of two categorical columns
///
/// Rows and columns follow the level order of the source columns; levels with
/// zero count are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    pub row_name: String,
    pub col_name: String,
    pub row_levels: Vec<Level>,
    pub col_levels: Vec<Level>,
    counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// Build from explicit counts (row-major)
    pub fn from_counts(
        row_name: impl Into<String>,
        col_name: impl Into<String>,
        row_levels: Vec<Level>,
        col_levels: Vec<Level>,
        counts: Vec<Vec<u64>>,
    ) -> Result<Self> {
        if counts.len() != row_levels.len() {
            return Err(Error::size_mismatch(row_levels.len(), counts.len(), "contingency rows"));
        }
        if let Some(row) = counts.iter().find(|r| r.len() != col_levels.len()) {
            return Err(Error::size_mismatch(col_levels.len(), row.len(), "contingency columns"));
        }
        Ok(Self {
            row_name: row_name.into(),
            col_name: col_name.into(),
            row_levels,
            col_levels,
            counts,
        })
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn n_rows(&self) -> usize {
        self.row_levels.len()
    }

    pub fn n_cols(&self) -> usize {
        self.col_levels.len()
    }

    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.counts[row][col]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_totals(&self) -> Vec<u64> {
        (0..self.n_cols())
            .map(|j| self.counts.iter().map(|r| r[j]).sum())
            .collect()
    }

    /// Each cell as a percentage of its row total (0 for empty rows)
    pub fn row_percentages(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total: u64 = row.iter().sum();
                row.iter()
                    .map(|&c| if total == 0 { 0.0 } else { c as f64 * 100.0 / total as f64 })
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = format!("{} \\ {}", self.row_name, self.col_name);
        let label_width = self
            .row_levels
            .iter()
            .map(|l| l.to_string().len())
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);
        let cell_width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .chain(self.col_levels.iter().map(|l| l.to_string().len()))
            .max()
            .unwrap_or(1);

        write!(f, "{header:<label_width$}")?;
        for level in &self.col_levels {
            write!(f, "  {:>cell_width$}", level.to_string())?;
        }
        writeln!(f)?;
        for (level, row) in self.row_levels.iter().zip(&self.counts) {
            write!(f, "{:<label_width$}", level.to_string())?;
            for count in row {
                write!(f, "  {count:>cell_width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Group keys of `frame` decoded as levels, paired with the `count` column
fn keyed_counts(table: &Table, frame: &DataFrame, keys: &[&str]) -> Result<Vec<(Vec<Option<Level>>, u64)>> {
    let levels = keys
        .iter()
        .map(|k| table.levels_in(frame.column(k)?))
        .collect::<Result<Vec<_>>>()?;
    let counts = frame.column("count")?.cast(&DataType::UInt64)?;
    Ok(counts
        .u64()?
        .into_iter()
        .enumerate()
        .map(|(i, n)| (levels.iter().map(|l| l[i].clone()).collect(), n.unwrap_or(0)))
        .collect())
}

/// Cross-tabulate two columns; rows missing either value are skipped
pub fn contingency(table: &Table, row_column: &str, col_column: &str) -> Result<ContingencyTable> {
    let rows = table.levels_of(row_column)?;
    let cols = table.levels_of(col_column)?;

    let counted = table
        .frame()
        .clone()
        .lazy()
        .filter(col(row_column).is_not_null().and(col(col_column).is_not_null()))
        .group_by([col(row_column), col(col_column)])
        .agg([len().alias("count")])
        .collect()?;

    let mut counts = vec![vec![0u64; cols.levels().len()]; rows.levels().len()];
    for (key, n) in keyed_counts(table, &counted, &[row_column, col_column])? {
        if let [Some(r), Some(c)] = key.as_slice() {
            if let (Some(i), Some(j)) = (rows.position(r), cols.position(c)) {
                counts[i][j] += n;
            }
        }
    }

    ContingencyTable::from_counts(
        row_column,
        col_column,
        rows.levels().to_vec(),
        cols.levels().to_vec(),
        counts,
    )
}

/// Mean of a value column within one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub level: Level,
    /// Non-missing observations in the group
    pub count: usize,
    /// `None` when the group has no non-missing values
    pub mean: Option<f64>,
}

/// Per-group means of `value_column`, in group level order
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMeans {
    pub group_name: String,
    pub value_name: String,
    pub groups: Vec<GroupMean>,
}

impl GroupMeans {
    pub fn get(&self, level: &Level) -> Option<f64> {
        self.groups.iter().find(|g| &g.level == level).and_then(|g| g.mean)
    }
}

impl fmt::Display for GroupMeans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} → mean {}", self.group_name, self.value_name)?;
        for group in &self.groups {
            match group.mean {
                Some(m) => writeln!(f, "  {:<8} {:>12.4}  (n={})", group.level.to_string(), m, group.count)?,
                None => writeln!(f, "  {:<8} {:>12}  (n=0)", group.level.to_string(), "NaN")?,
            }
        }
        Ok(())
    }
}

/// Arithmetic mean of `value_column` per level of `group_column`
pub fn group_mean(table: &Table, group_column: &str, value_column: &str) -> Result<GroupMeans> {
    let groups = table.levels_of(group_column)?;
    let frame = DataFrame::new(vec![
        table.column(group_column)?.clone(),
        table.float_column(value_column)?.with_name("value".into()).into_series().into(),
    ])?;

    let aggregated = frame
        .lazy()
        .group_by([col(group_column)])
        .agg([
            col("value").mean().alias("mean"),
            col("value").count().alias("count"),
        ])
        .collect()?;

    let keys = table.levels_in(aggregated.column(group_column)?)?;
    let means: Vec<Option<f64>> = aggregated.column("mean")?.f64()?.into_iter().collect();
    let counts = keyed_counts(table, &aggregated, &[])?;

    let mut out: Vec<GroupMean> = groups
        .levels()
        .iter()
        .map(|level| GroupMean {
            level: level.clone(),
            count: 0,
            mean: None,
        })
        .collect();
    for ((key, mean), (_, count)) in keys.iter().zip(means).zip(counts) {
        if let Some(i) = key.as_ref().and_then(|k| groups.position(k)) {
            out[i].count = count as usize;
            out[i].mean = mean;
        }
    }

    Ok(GroupMeans {
        group_name: group_column.to_string(),
        value_name: value_column.to_string(),
        groups: out,
    })
}

/// Non-missing values of `value_column` split by level of `group_column`
pub fn samples_by_group(
    table: &Table,
    group_column: &str,
    value_column: &str,
) -> Result<Vec<(Level, Vec<f64>)>> {
    let groups = table.levels_of(group_column)?;
    let samples = grouped_values(&groups, &table.numeric(value_column)?);
    Ok(groups.levels().iter().cloned().zip(samples).collect())
}

fn grouped_values(groups: &Categories, values: &[Option<f64>]) -> Vec<Vec<f64>> {
    let mut samples = vec![Vec::new(); groups.levels().len()];
    for (code, value) in groups.codes().iter().zip(values) {
        if let (Some(code), Some(value)) = (code, value) {
            samples[*code].push(*value);
        }
    }
    samples
}

/// Result of placing one value into buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketAssignment {
    /// Index into the bucket labels
    Bucket(usize),
    /// Finite value outside every interval
    Unbucketed,
    /// Missing or NaN input
    Missing,
}

/// Right-closed buckets `(b[i], b[i+1]]` with one label each
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets {
    boundaries: Vec<f64>,
    labels: Vec<String>,
}

impl Buckets {
    /// Boundaries must be strictly increasing with one more entry than labels
    pub fn new(boundaries: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(Error::InvalidParameter(
                "bucketize needs at least two boundaries".to_string(),
            ));
        }
        if boundaries.iter().any(|b| b.is_nan()) || boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter(format!(
                "bucket boundaries must be strictly increasing: {boundaries:?}"
            )));
        }
        if labels.len() != boundaries.len() - 1 {
            return Err(Error::InvalidParameter(format!(
                "{} boundaries need {} labels, got {}",
                boundaries.len(),
                boundaries.len() - 1,
                labels.len()
            )));
        }
        Ok(Self { boundaries, labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Bucket containing `value`
    pub fn assign(&self, value: f64) -> BucketAssignment {
        if value.is_nan() {
            return BucketAssignment::Missing;
        }
        self.boundaries
            .windows(2)
            .position(|w| value > w[0] && value <= w[1])
            .map_or(BucketAssignment::Unbucketed, BucketAssignment::Bucket)
    }
}

/// Assign every row of `value_column` to a bucket
pub fn bucketize(table: &Table, value_column: &str, buckets: &Buckets) -> Result<Vec<BucketAssignment>> {
    Ok(table
        .numeric(value_column)?
        .iter()
        .map(|v| v.map_or(BucketAssignment::Missing, |v| buckets.assign(v)))
        .collect())
}

/// Add a categorical column holding each row's bucket label
///
/// Unbucketed and missing rows are missing cells. Levels sort like any other
/// categorical; [`Buckets::labels`] gives the bucket order.
pub fn bucketize_column(
    table: &Table,
    value_column: &str,
    buckets: &Buckets,
    target: &str,
) -> Result<Table> {
    let labels: Vec<Option<&str>> = bucketize(table, value_column, buckets)?
        .into_iter()
        .map(|a| match a {
            BucketAssignment::Bucket(i) => Some(buckets.labels()[i].as_str()),
            BucketAssignment::Unbucketed | BucketAssignment::Missing => None,
        })
        .collect();
    table.with_categorical(Series::new(target.into(), labels), false)
}

/// Frequency of each level, with missing values counted last
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCounts {
    pub column: String,
    pub counts: Vec<(Level, usize)>,
    pub missing: usize,
}

impl fmt::Display for ValueCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.column)?;
        for (level, count) in &self.counts {
            writeln!(f, "  {:<8} {count:>8}", level.to_string())?;
        }
        writeln!(f, "  {:<8} {:>8}", "NaN", self.missing)
    }
}

/// Count rows per level of `column`, most frequent first
pub fn value_counts(table: &Table, column: &str) -> Result<ValueCounts> {
    let categories = table.levels_of(column)?;
    let counted = table
        .frame()
        .clone()
        .lazy()
        .group_by([col(column)])
        .agg([len().alias("count")])
        .collect()?;

    let mut counts: Vec<(Level, usize)> = categories
        .levels()
        .iter()
        .map(|l| (l.clone(), 0))
        .collect();
    let mut missing = 0;
    for (key, n) in keyed_counts(table, &counted, &[column])? {
        match key[0].as_ref().and_then(|k| categories.position(k)) {
            Some(i) => counts[i].1 += n as usize,
            None => missing += n as usize,
        }
    }
    // Stable sort keeps level order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(ValueCounts {
        column: column.to_string(),
        counts,
        missing,
    })
}

/// Count, mean, spread and quartiles of a numeric column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl fmt::Display for Describe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "count  {:>14}", self.count)?;
        for (name, value) in [
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
        ] {
            writeln!(f, "{name:<5}  {value:>14.6}")?;
        }
        Ok(())
    }
}

/// [`Describe`] of one numeric column; statistics are NaN when it is empty
pub fn describe(table: &Table, column: &str) -> Result<Describe> {
    let values = table.float_column(column)?.with_name("value".into());
    let v = || col("value");
    let stats = DataFrame::new(vec![values.into_series().into()])?
        .lazy()
        .select([
            v().count().alias("count"),
            v().mean().alias("mean"),
            v().std(1).alias("std"),
            v().min().alias("min"),
            v().quantile(lit(0.25), QuantileMethod::Linear).alias("q25"),
            v().median().alias("median"),
            v().quantile(lit(0.75), QuantileMethod::Linear).alias("q75"),
            v().max().alias("max"),
        ])
        .collect()?;

    let stat = |name: &str| -> Result<f64> {
        Ok(stats
            .column(name)?
            .cast(&DataType::Float64)?
            .f64()?
            .get(0)
            .unwrap_or(f64::NAN))
    };
    Ok(Describe {
        count: stat("count")? as usize,
        mean: stat("mean")?,
        std: stat("std")?,
        min: stat("min")?,
        q25: stat("q25")?,
        median: stat("median")?,
        q75: stat("q75")?,
        max: stat("max")?,
    })
}

/// Maximum of a numeric column, used as the last bucket boundary
pub fn column_max(table: &Table, column: &str) -> Result<f64> {
    table
        .float_column(column)?
        .max()
        .ok_or_else(|| Error::InvalidInput(format!("column `{column}` has no values")))
}

/// Render a boundary list for log messages
pub fn describe_boundaries(boundaries: &[f64]) -> String {
    boundaries
        .iter()
        .map(|b| format_number(*b))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn events() -> Table {
        let frame = df![
            "risk" => [Some(0.0), Some(0.0), Some(1.0), Some(1.0), None],
            "reward" => [Some(1.0), Some(1.0), Some(0.0), Some(1.0), Some(1.0)],
            "wait" => [Some(2.0), Some(4.0), Some(10.0), None, Some(1.0)],
        ]
        .unwrap();
        Table::new("events", frame)
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contingency_counts_and_margins() {
        let table = contingency(&events(), "risk", "reward").unwrap();
        assert_eq!(table.counts(), &[vec![0, 2], vec![1, 1]]);
        assert_eq!(table.total(), 4);
        assert_eq!(table.row_totals(), vec![2, 2]);
        assert_eq!(table.col_totals(), vec![1, 3]);
        assert_eq!(table.row_levels, vec![Level::Number(0.0), Level::Number(1.0)]);
    }

    #[test]
    fn test_contingency_keeps_zero_rows() {
        let table = contingency(&events(), "risk", "reward").unwrap();
        // risk=0 never has reward=0 but the column is still present
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.get(0, 0), 0);
    }

    #[test]
    fn test_contingency_display() {
        let rendered = contingency(&events(), "risk", "reward").unwrap().to_string();
        assert!(rendered.starts_with("risk \\ reward"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn test_group_mean_excludes_missing() {
        let means = group_mean(&events(), "risk", "wait").unwrap();
        assert_abs_diff_eq!(means.get(&Level::Number(0.0)).unwrap(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(means.get(&Level::Number(1.0)).unwrap(), 10.0, epsilon = 1e-12);
        assert_eq!(means.groups[1].count, 1);
    }

    #[test]
    fn test_samples_by_group() {
        let samples = samples_by_group(&events(), "risk", "wait").unwrap();
        assert_eq!(samples[0], (Level::Number(0.0), vec![2.0, 4.0]));
        assert_eq!(samples[1], (Level::Number(1.0), vec![10.0]));
    }

    #[test]
    fn test_bucket_validation() {
        assert!(Buckets::new(vec![0.0, 1.0, 1.0], labels(&["a", "b"])).is_err());
        assert!(Buckets::new(vec![0.0, 1.0, 2.0], labels(&["a"])).is_err());
        assert!(Buckets::new(vec![0.0], vec![]).is_err());
        assert!(Buckets::new(vec![0.0, 1.0, 2.0], labels(&["a", "b"])).is_ok());
    }

    #[test]
    fn test_bucket_assignment_right_closed() {
        let buckets = Buckets::new(vec![-1.0, 0.0, 1.0, 3.0, 9.0], labels(&["0", "1", "2-3", "4+"])).unwrap();
        assert_eq!(buckets.assign(0.0), BucketAssignment::Bucket(0));
        assert_eq!(buckets.assign(1.0), BucketAssignment::Bucket(1));
        assert_eq!(buckets.assign(2.0), BucketAssignment::Bucket(2));
        assert_eq!(buckets.assign(9.0), BucketAssignment::Bucket(3));
        assert_eq!(buckets.assign(-1.0), BucketAssignment::Unbucketed);
        assert_eq!(buckets.assign(12.0), BucketAssignment::Unbucketed);
        assert_eq!(buckets.assign(f64::NAN), BucketAssignment::Missing);
    }

    #[test]
    fn test_bucketize_column_groups() {
        let buckets = Buckets::new(vec![0.0, 3.0, 10.0], labels(&["low", "high"])).unwrap();
        let table = bucketize_column(&events(), "wait", &buckets, "wait_bucket").unwrap();
        let means = group_mean(&table, "wait_bucket", "wait").unwrap();
        assert_abs_diff_eq!(means.get(&Level::from("low")).unwrap(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(means.get(&Level::from("high")).unwrap(), 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_value_counts_include_missing() {
        let counts = value_counts(&events(), "risk").unwrap();
        assert_eq!(counts.counts, vec![(Level::Number(0.0), 2), (Level::Number(1.0), 2)]);
        assert_eq!(counts.missing, 1);
    }

    #[test]
    fn test_contingency_on_categorical_columns() {
        let table = Table::new(
            "events",
            df![
                "habit" => [Some("rat"), Some("fast"), Some("rat"), None],
                "risk" => [Some(1.0), Some(0.0), Some(0.0), Some(1.0)],
            ]
            .unwrap(),
        );
        let coerced = crate::clean::coerce_categorical(&table, &["habit", "risk"]).unwrap();
        let ct = contingency(&coerced, "habit", "risk").unwrap();
        assert_eq!(ct.row_levels, vec![Level::from("fast"), Level::from("rat")]);
        assert_eq!(ct.col_levels, vec![Level::Number(0.0), Level::Number(1.0)]);
        assert_eq!(ct.counts(), &[vec![1, 0], vec![1, 1]]);
    }

    #[test]
    fn test_describe() {
        let table = Table::new("t", df!["x" => [1.0, 2.0, 3.0, 4.0, f64::NAN]].unwrap());
        let summary = describe(&table, "x").unwrap();
        assert_eq!(summary.count, 4);
        assert_abs_diff_eq!(summary.mean, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.q25, 1.75, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.median, 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.max, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(column_max(&table, "x").unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_describe_empty_column() {
        let table = Table::new("t", df!["x" => [None::<f64>, None]].unwrap());
        let summary = describe(&table, "x").unwrap();
        assert_eq!(summary.count, 0);
        assert!(summary.mean.is_nan());
        assert!(column_max(&table, "x").is_err());
    }

    proptest! {
        #[test]
        fn prop_bucketize_assigns_exactly_once(value in -1.0f64..10.0) {
            let buckets = Buckets::new(vec![-1.0, 0.0, 1.0, 3.0, 10.0], labels(&["a", "b", "c", "d"])).unwrap();
            let hits = buckets
                .boundaries()
                .windows(2)
                .filter(|w| value > w[0] && value <= w[1])
                .count();
            match buckets.assign(value) {
                BucketAssignment::Bucket(i) => {
                    prop_assert_eq!(hits, 1);
                    prop_assert!(i < buckets.labels().len());
                }
                BucketAssignment::Unbucketed => prop_assert_eq!(hits, 0),
                BucketAssignment::Missing => prop_assert!(false, "finite value reported missing"),
            }
        }

        #[test]
        fn prop_contingency_total_matches_complete_rows(
            pairs in prop::collection::vec((prop::option::of(0u8..3), prop::option::of(0u8..4)), 1..80)
        ) {
            let a: Vec<Option<f64>> = pairs.iter().map(|p| p.0.map(f64::from)).collect();
            let b: Vec<Option<f64>> = pairs.iter().map(|p| p.1.map(f64::from)).collect();
            let complete = pairs.iter().filter(|p| p.0.is_some() && p.1.is_some()).count() as u64;
            let table = Table::new("t", df!["a" => a, "b" => b].unwrap());
            let ct = contingency(&table, "a", "b").unwrap();
            prop_assert_eq!(ct.total(), complete);
            prop_assert_eq!(ct.row_totals().iter().sum::<u64>(), ct.total());
            prop_assert_eq!(ct.col_totals().iter().sum::<u64>(), ct.total());
        }
    }
}
