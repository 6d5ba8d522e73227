//! Named snapshots of polars DataFrames
//!
//! A [`Table`] wraps a [`DataFrame`] together with the table name used in
//! error messages. Every cleaning or derivation step returns a new table
//! instead of mutating the one it was given.

use chrono::NaiveDateTime;
use perch_core::{Error, Result};
use polars::prelude::*;
use std::cmp::Ordering;
use std::fmt;

/// A single category value
#[derive(Debug, Clone, PartialEq)]
pub enum Level {
    /// Category taken from a numeric column (e.g. a 0/1 indicator)
    Number(f64),
    /// Category taken from a text column
    Text(String),
}

impl Level {
    /// Total order used for sorting levels: numbers first, then text
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }

    /// Numeric value of the level, if it has one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for Level {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Level {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{}", format_number(*v)),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Category view of one column: sorted levels plus one code per row
#[derive(Debug, Clone, PartialEq)]
pub struct Categories {
    levels: Vec<Level>,
    codes: Vec<Option<usize>>,
}

impl Categories {
    /// Levels are the sorted unique non-missing values
    pub fn from_values(values: &[Option<Level>]) -> Self {
        let mut levels: Vec<Level> = Vec::new();
        for value in values.iter().flatten() {
            if !levels.contains(value) {
                levels.push(value.clone());
            }
        }
        levels.sort_by(Level::total_cmp);

        let codes = values
            .iter()
            .map(|value| {
                value
                    .as_ref()
                    .and_then(|v| levels.iter().position(|level| level == v))
            })
            .collect();

        Self { levels, codes }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn codes(&self) -> &[Option<usize>] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Index of `level` among the sorted levels
    pub fn position(&self, level: &Level) -> Option<usize> {
        self.levels.iter().position(|l| l == level)
    }

    /// Level of row `i`, `None` when missing
    pub fn get(&self, i: usize) -> Option<&Level> {
        self.codes.get(i).copied().flatten().map(|c| &self.levels[c])
    }

    /// Decoded values in row order
    pub fn values(&self) -> Vec<Option<Level>> {
        (0..self.len()).map(|i| self.get(i).cloned()).collect()
    }
}

/// Short type name, as shown in inspection output
pub fn dtype_name(dtype: &DataType) -> &'static str {
    match dtype {
        DataType::Float64 | DataType::Float32 => "float64",
        DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => "int",
        DataType::String => "text",
        DataType::Boolean => "bool",
        DataType::Datetime(_, _) | DataType::Date => "datetime",
        DataType::Null => "null",
        dt if dt.is_categorical() => "category",
        _ => "other",
    }
}

pub(crate) fn is_number(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
            | DataType::Null
    )
}

/// Cast a numeric column to `Float64`, turning NaN and infinities into nulls
pub(crate) fn finite_f64(column: &Column) -> Result<Float64Chunked> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect::<Float64Chunked>()
        .with_name(column.name().clone()))
}

/// A named DataFrame
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    frame: DataFrame,
    /// Categorical columns coerced from numbers; their levels decode as numbers
    numeric_levels: Vec<String>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.numeric_levels == other.numeric_levels
            && self.frame.equals_missing(&other.frame)
    }
}

impl Table {
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
            numeric_levels: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_cols(&self) -> usize {
        self.frame.width()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.frame.shape()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Look up a column, failing with [`Error::MissingColumn`]
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.frame
            .column(name)
            .map_err(|_| Error::missing_column(name, &self.name))
    }

    /// Short type name of every column, in column order
    pub fn dtypes(&self) -> Vec<(String, &'static str)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), dtype_name(c.dtype())))
            .collect()
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.frame
            .column(name)
            .is_ok_and(|c| is_number(c.dtype()))
    }

    pub fn is_datetime(&self, name: &str) -> bool {
        self.frame
            .column(name)
            .is_ok_and(|c| matches!(c.dtype(), DataType::Datetime(_, _)))
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.frame
            .column(name)
            .is_ok_and(|c| c.dtype().is_categorical())
    }

    /// Numeric column as finite `Float64` values
    pub fn float_column(&self, name: &str) -> Result<Float64Chunked> {
        let column = self.column(name)?;
        if !is_number(column.dtype()) {
            return Err(self.type_error(name, "float64", column.dtype()));
        }
        finite_f64(column)
    }

    /// Numeric values of a column in row order; `None` marks a missing cell
    pub fn numeric(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(self.float_column(name)?.into_iter().collect())
    }

    /// Non-missing numeric values of a column
    pub fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self.float_column(name)?.into_iter().flatten().collect())
    }

    /// Row-aligned numeric pairs, dropping rows where either side is missing
    pub fn paired_numeric(&self, x: &str, y: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let xs = self.float_column(x)?;
        let ys = self.float_column(y)?;
        Ok(xs
            .into_iter()
            .zip(ys.into_iter())
            .filter_map(|(a, b)| a.zip(b))
            .unzip())
    }

    /// Timestamps of a datetime column in row order
    pub fn datetimes(&self, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
        let column = self.column(name)?;
        match column.dtype() {
            DataType::Datetime(_, _) => Ok(column
                .as_materialized_series()
                .datetime()?
                .as_datetime_iter()
                .collect()),
            other => Err(self.type_error(name, "datetime", other)),
        }
    }

    /// Category view of any numeric, text or categorical column
    pub fn levels_of(&self, name: &str) -> Result<Categories> {
        Ok(Categories::from_values(&self.level_values(name)?))
    }

    /// Levels of `column` row by row; `column` may come from a frame derived
    /// from this table (e.g. group-by keys)
    pub fn levels_in(&self, column: &Column) -> Result<Vec<Option<Level>>> {
        let name = column.name().as_str();
        let dtype = column.dtype();
        if is_number(dtype) {
            return Ok(finite_f64(column)?
                .into_iter()
                .map(|v| v.map(Level::Number))
                .collect());
        }
        if !(matches!(dtype, DataType::String | DataType::Boolean) || dtype.is_categorical()) {
            return Err(self.type_error(name, "numeric, text or category", dtype));
        }
        let numeric = self.numeric_levels.iter().any(|c| c == name);
        let text = column.cast(&DataType::String)?;
        let levels = text
            .str()?
            .into_iter()
            .map(|v| {
                v.map(|s| match s.parse::<f64>() {
                    Ok(x) if numeric => Level::Number(x),
                    _ => Level::Text(s.to_string()),
                })
            })
            .collect();
        Ok(levels)
    }

    fn level_values(&self, name: &str) -> Result<Vec<Option<Level>>> {
        self.levels_in(self.column(name)?)
    }

    /// Missing-value count for every column, in column order
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }

    /// Return a copy with `series` added, replacing any column of the same name
    ///
    /// The series must have one value per row; polars would otherwise
    /// broadcast a single value down the column.
    pub fn with_series(&self, series: Series) -> Result<Self> {
        let name = series.name().to_string();
        if series.len() != self.n_rows() {
            return Err(Error::size_mismatch(
                self.n_rows(),
                series.len(),
                &format!("column `{name}` of {}", self.name),
            ));
        }
        let mut frame = self.frame.clone();
        frame.with_column(series)?;
        Ok(Self {
            name: self.name.clone(),
            frame,
            numeric_levels: self
                .numeric_levels
                .iter()
                .filter(|c| **c != name)
                .cloned()
                .collect(),
        })
    }

    /// Return a copy with a `Float64` column added or replaced
    pub fn with_numeric(&self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        self.with_series(Series::new(name.into(), values))
    }

    /// Return a copy with `series` cast to a categorical column
    ///
    /// `numeric` marks levels that should decode back into numbers.
    pub(crate) fn with_categorical(&self, series: Series, numeric: bool) -> Result<Self> {
        let name = series.name().to_string();
        let categorical = series
            .cast(&DataType::String)?
            .cast(&DataType::Categorical(None, CategoricalOrdering::Lexical))?;
        let mut table = self.with_series(categorical)?;
        if numeric {
            table.numeric_levels.push(name);
        }
        Ok(table)
    }

    /// Rows where `mask` is true
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_rows() {
            return Err(Error::size_mismatch(self.n_rows(), mask.len(), "row mask"));
        }
        let mask: BooleanChunked = mask.iter().copied().collect();
        Ok(Self {
            name: self.name.clone(),
            frame: self.frame.filter(&mask)?,
            numeric_levels: self.numeric_levels.clone(),
        })
    }

    /// Rows whose `column` equals `level`
    pub fn filter_eq(&self, column: &str, level: &Level) -> Result<Self> {
        let mask: Vec<bool> = self
            .level_values(column)?
            .iter()
            .map(|v| v.as_ref() == Some(level))
            .collect();
        self.filter(&mask)
    }

    /// The first `n` rows
    pub fn head(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            frame: self.frame.head(Some(n)),
            numeric_levels: self.numeric_levels.clone(),
        }
    }

    fn type_error(&self, name: &str, expected: &str, found: &DataType) -> Error {
        Error::ColumnType {
            column: format!("{}.{name}", self.name),
            expected: expected.to_string(),
            found: dtype_name(found).to_string(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frame)
    }
}

/// Render a number without a trailing `.0` for whole values
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let frame = df![
            "risk" => [Some(0.0), Some(1.0), None, Some(1.0)],
            "habit" => [Some("fast"), None, Some("rat"), Some("fast")],
        ]
        .unwrap();
        Table::new("sample", frame)
    }

    #[test]
    fn test_shape_and_nulls() {
        let table = sample();
        assert_eq!(table.shape(), (4, 2));
        assert_eq!(
            table.null_counts(),
            vec![("risk".to_string(), 1), ("habit".to_string(), 1)]
        );
        assert_eq!(
            table.dtypes(),
            vec![("risk".to_string(), "float64"), ("habit".to_string(), "text")]
        );
    }

    #[test]
    fn test_missing_column_names_table() {
        let err = sample().numeric("reward").unwrap_err();
        assert_eq!(err.to_string(), "Missing column `reward` in sample");
    }

    #[test]
    fn test_type_mismatch() {
        let err = sample().numeric("habit").unwrap_err();
        assert!(matches!(err, Error::ColumnType { .. }));
    }

    #[test]
    fn test_non_finite_values_read_as_missing() {
        let frame = df!["x" => [1.0, f64::NAN, f64::INFINITY, 4.0]].unwrap();
        let table = Table::new("t", frame);
        assert_eq!(table.numeric("x").unwrap(), vec![Some(1.0), None, None, Some(4.0)]);
        assert_eq!(table.numeric_values("x").unwrap(), vec![1.0, 4.0]);
    }

    #[test]
    fn test_with_numeric_returns_new_snapshot() {
        let table = sample();
        let extended = table.with_numeric("x", vec![Some(1.0); 4]).unwrap();
        assert_eq!(table.n_cols(), 2);
        assert_eq!(extended.n_cols(), 3);

        let replaced = extended.with_numeric("x", vec![Some(2.0); 4]).unwrap();
        assert_eq!(replaced.n_cols(), 3);
        assert_eq!(replaced.numeric("x").unwrap()[0], Some(2.0));

        assert!(table.with_numeric("short", vec![Some(1.0)]).is_err());
    }

    #[test]
    fn test_with_series_rejects_wrong_length() {
        let table = sample();
        let err = table.with_numeric("short", vec![Some(1.0)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Size mismatch in column `short` of sample: expected 4, got 1"
        );
        let long = Series::new("habit".into(), vec!["a"; 5]);
        assert!(table.with_categorical(long, false).is_err());
        // The source table is unchanged either way
        assert_eq!(table.n_cols(), 2);
    }

    #[test]
    fn test_filter_eq() {
        let table = sample();
        let risky = table.filter_eq("risk", &Level::Number(1.0)).unwrap();
        assert_eq!(risky.n_rows(), 2);
        assert_eq!(risky.head(1).n_rows(), 1);
        let fast = table.filter_eq("habit", &Level::from("fast")).unwrap();
        assert_eq!(fast.numeric("risk").unwrap(), vec![Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_paired_numeric_drops_incomplete_rows() {
        let frame = df![
            "x" => [Some(1.0), None, Some(3.0)],
            "y" => [Some(2.0), Some(5.0), Some(6.0)],
        ]
        .unwrap();
        let (xs, ys) = Table::new("t", frame).paired_numeric("x", "y").unwrap();
        assert_eq!(xs, vec![1.0, 3.0]);
        assert_eq!(ys, vec![2.0, 6.0]);
    }

    #[test]
    fn test_categories_sorted() {
        let values = vec![
            Some(Level::from("spring")),
            None,
            Some(Level::from("autumn")),
            Some(Level::from("spring")),
        ];
        let cat = Categories::from_values(&values);
        assert_eq!(cat.levels(), &[Level::from("autumn"), Level::from("spring")]);
        assert_eq!(cat.codes(), &[Some(1), None, Some(0), Some(1)]);
        assert_eq!(cat.values(), values);
        assert_eq!(cat.position(&Level::from("spring")), Some(1));
    }

    #[test]
    fn test_display_renders_frame() {
        let rendered = sample().to_string();
        assert!(rendered.contains("risk"));
        assert!(rendered.contains("habit"));
        assert!(rendered.contains("null"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
