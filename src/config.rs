//! Analysis configuration
//!
//! Every field has a default, so a JSON config file only needs the keys it
//! changes. Positional command-line paths override the file.

use perch_core::{Error, Result};
use perch_frame::{Buckets, SeasonMapping};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Lower edges and labels of a bucketization whose upper end is the data maximum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Exclusive lower edge of each bucket, strictly increasing
    pub edges: Vec<f64>,
    pub labels: Vec<String>,
}

impl BucketConfig {
    fn new(edges: &[f64], labels: &[&str]) -> Self {
        Self {
            edges: edges.to_vec(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Close the last bucket at `max`
    ///
    /// When `max` does not exceed the last edge the top bucket would be empty
    /// and is left out.
    pub fn buckets(&self, max: f64) -> Result<Buckets> {
        if self.edges.len() != self.labels.len() {
            return Err(Error::InvalidParameter(format!(
                "{} bucket edges need {} labels, got {}",
                self.edges.len(),
                self.edges.len(),
                self.labels.len()
            )));
        }
        match self.edges.last() {
            Some(&last) if max > last => {
                let mut boundaries = self.edges.clone();
                boundaries.push(max);
                Buckets::new(boundaries, self.labels.clone())
            }
            _ => Buckets::new(
                self.edges.clone(),
                self.labels[..self.labels.len().saturating_sub(1)].to_vec(),
            ),
        }
    }
}

/// Settings shared by every analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub events_path: PathBuf,
    pub windows_path: PathBuf,
    /// Charts and the seasonal summary are written here
    pub output_dir: PathBuf,
    /// Smallest group a two-sample or per-season test will run on
    pub min_group_size: usize,
    /// Event-table column holding the season source
    pub event_season_column: String,
    pub event_season: SeasonMapping,
    /// Window-table column holding the season source
    pub window_season_column: String,
    pub window_season: SeasonMapping,
    /// Yates' correction for 2×2 chi-square tables
    pub continuity_correction: bool,
    pub confidence_level: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub histogram_bins: usize,
    pub rat_arrival_buckets: BucketConfig,
    pub rat_minutes_buckets: BucketConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("dataset1.csv"),
            windows_path: PathBuf::from("dataset2.csv"),
            output_dir: PathBuf::from("output"),
            min_group_size: 10,
            event_season_column: "season".to_string(),
            event_season: SeasonMapping::binary_code(),
            window_season_column: "month".to_string(),
            window_season: SeasonMapping::month_ranges(),
            continuity_correction: true,
            confidence_level: 0.95,
            max_iterations: 35,
            tolerance: 1e-8,
            histogram_bins: 40,
            rat_arrival_buckets: BucketConfig::new(&[-1.0, 0.0, 1.0, 3.0], &["0", "1", "2-3", "4+"]),
            rat_minutes_buckets: BucketConfig::new(&[-0.1, 0.0, 5.0, 30.0], &["0", "0-5", "5-30", "30+"]),
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::data_load(path, e))?;
        let config: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::data_load(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no stage can run with
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.max_iterations == 0 || self.tolerance <= 0.0 {
            return Err(Error::InvalidParameter(
                "max_iterations and tolerance must be positive".to_string(),
            ));
        }
        if self.histogram_bins == 0 {
            return Err(Error::InvalidParameter("histogram_bins must be positive".to_string()));
        }
        Ok(())
    }
}
