//! Chart specifications
//!
//! A [`ChartSpec`] describes what to draw (kind, titles, series) independent
//! of any backend. Specs serialize to JSON so a run can keep them next to the
//! rendered SVG files.

use perch_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Kind of chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartKind {
    /// Points per series; series marked as lines are drawn as lines
    Scatter,
    /// Connected points per series
    Line,
    /// Grouped bars: one bar per series within each category
    Bar,
    /// Bars stacked per category
    StackedBar,
    /// Counts of raw values in equal-width bins
    Histogram { bins: usize },
    /// One box per series of raw values
    BoxPlot,
    /// Point estimates with intervals and a reference line
    Forest { reference: f64 },
    /// Colored matrix cells labeled by `categories`
    Heatmap,
}

/// How a points series is drawn on a scatter chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    #[default]
    Point,
    Line,
}

/// Estimate with interval, one row of a forest plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub label: String,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Data carried by a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesData {
    Points(Vec<(f64, f64)>),
    Values(Vec<f64>),
    Intervals(Vec<Interval>),
    Matrix(Vec<Vec<f64>>),
}

/// A named series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub mark: Mark,
    pub data: SeriesData,
}

impl Series {
    pub fn points(name: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Point,
            data: SeriesData::Points(points),
        }
    }

    pub fn line(name: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Line,
            data: SeriesData::Points(points),
        }
    }

    pub fn values(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Point,
            data: SeriesData::Values(values),
        }
    }

    pub fn intervals(name: impl Into<String>, intervals: Vec<Interval>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Point,
            data: SeriesData::Intervals(intervals),
        }
    }

    pub fn matrix(name: impl Into<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            mark: Mark::Point,
            data: SeriesData::Matrix(rows),
        }
    }
}

/// Backend-independent description of a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    /// Category labels for bar, stacked bar and heatmap charts
    #[serde(default)]
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            kind,
            categories: Vec::new(),
            series: Vec::new(),
        }
    }

    pub fn x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = label.into();
        self
    }

    pub fn y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    pub fn categories<S: Into<String>>(mut self, categories: impl IntoIterator<Item = S>) -> Self {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Check that every series carries data this chart kind can draw
    pub fn validate(&self) -> Result<()> {
        if self.series.is_empty() {
            return Err(self.invalid("has no series"));
        }
        for series in &self.series {
            let ok = match (&self.kind, &series.data) {
                (ChartKind::Scatter | ChartKind::Line, SeriesData::Points(_)) => true,
                (ChartKind::Bar | ChartKind::StackedBar, SeriesData::Values(v)) => {
                    v.len() == self.categories.len()
                }
                (ChartKind::Histogram { bins }, SeriesData::Values(_)) => *bins > 0,
                (ChartKind::BoxPlot, SeriesData::Values(v)) => !v.is_empty(),
                (ChartKind::Forest { .. }, SeriesData::Intervals(i)) => !i.is_empty(),
                (ChartKind::Heatmap, SeriesData::Matrix(rows)) => {
                    let k = self.categories.len();
                    rows.len() == k && rows.iter().all(|r| r.len() == k)
                }
                _ => false,
            };
            if !ok {
                return Err(self.invalid(&format!("series `{}` does not fit a {:?} chart", series.name, self.kind)));
            }
        }
        Ok(())
    }

    /// JSON form of the chart
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Render(e.to_string()))
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::Render(format!("chart `{}` {reason}", self.title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_requires_matching_categories() {
        let spec = ChartSpec::new(ChartKind::Bar, "Counts")
            .categories(["0", "1"])
            .series(Series::values("reward=0", vec![3.0, 4.0]));
        assert!(spec.validate().is_ok());

        let bad = spec.clone().series(Series::values("reward=1", vec![1.0]));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_kind_data_mismatch() {
        let spec = ChartSpec::new(ChartKind::Heatmap, "Correlations")
            .series(Series::points("oops", vec![(1.0, 2.0)]));
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("Correlations"));
        assert!(ChartSpec::new(ChartKind::Line, "empty").validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let spec = ChartSpec::new(ChartKind::Histogram { bins: 40 }, "Landing to food")
            .x_label("seconds")
            .y_label("count")
            .series(Series::values("bat_landing_to_food", vec![1.0, 2.5]));
        let json = spec.to_json().unwrap();
        assert!(json.contains("\"type\": \"histogram\""));
        let back: ChartSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
