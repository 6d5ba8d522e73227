//! Categorical coercion and season derivation
//!
//! Season labels come from a [`SeasonMapping`] supplied by configuration.
//! The mapping is total: every input maps to winter, spring, or the explicit
//! [`Season::Missing`] marker.

use crate::table::{Level, Table};
use perch_core::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Convert the named columns to polars categorical columns
///
/// Levels are the sorted unique observed values. Columns that are already
/// categorical are left untouched, so the operation is idempotent.
pub fn coerce_categorical(table: &Table, columns: &[&str]) -> Result<Table> {
    let mut out = table.clone();
    for &name in columns {
        if out.is_categorical(name) {
            continue;
        }
        // Rejects datetime columns and names the table on a missing column
        let levels = out.levels_of(name)?.levels().len();
        let numeric = out.is_numeric(name);
        let series = if numeric {
            out.float_column(name)?.into_series()
        } else {
            out.column(name)?.as_materialized_series().clone()
        };
        out = out.with_categorical(series, numeric)?;
        debug!(column = name, levels, "coerced to category");
    }
    Ok(out)
}

/// Observation season
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Season {
    Winter,
    Spring,
    /// Input outside the mapping (or missing)
    Missing,
}

impl Season {
    /// The two real seasons, in calendar order; derived columns sort
    /// their levels alphabetically instead
    pub const ALL: [Season; 2] = [Season::Winter, Season::Spring];

    /// Label for a real season, `None` for [`Season::Missing`]
    pub fn label(self) -> Option<&'static str> {
        match self {
            Self::Winter => Some("winter"),
            Self::Spring => Some("spring"),
            Self::Missing => None,
        }
    }

    pub fn level(self) -> Option<Level> {
        self.label().map(Level::from)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().unwrap_or("missing"))
    }
}

/// Inclusive range of month numbers (1 = January)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub first: u32,
    pub last: u32,
}

impl MonthRange {
    pub fn contains(&self, month: u32) -> bool {
        (self.first..=self.last).contains(&month)
    }
}

/// How a source column is turned into a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeasonMapping {
    /// A numeric code per season (e.g. 0 = winter, 1 = spring)
    Code { winter: f64, spring: f64 },
    /// Month-number ranges; month names in text cells are also accepted
    MonthRange { winter: MonthRange, spring: MonthRange },
}

impl SeasonMapping {
    /// 0 → winter, 1 → spring
    pub fn binary_code() -> Self {
        Self::Code {
            winter: 0.0,
            spring: 1.0,
        }
    }

    /// Months 5–7 → winter, 8–10 → spring
    pub fn month_ranges() -> Self {
        Self::MonthRange {
            winter: MonthRange { first: 5, last: 7 },
            spring: MonthRange { first: 8, last: 10 },
        }
    }

    /// Classify a numeric cell
    pub fn classify_number(&self, value: f64) -> Season {
        if !value.is_finite() {
            return Season::Missing;
        }
        match self {
            Self::Code { winter, spring } => {
                if value == *winter {
                    Season::Winter
                } else if value == *spring {
                    Season::Spring
                } else {
                    Season::Missing
                }
            }
            Self::MonthRange { winter, spring } => {
                if value.fract() != 0.0 || value < 0.0 {
                    return Season::Missing;
                }
                let month = value as u32;
                if winter.contains(month) {
                    Season::Winter
                } else if spring.contains(month) {
                    Season::Spring
                } else {
                    Season::Missing
                }
            }
        }
    }

    /// Classify a text cell: numbers, month names, or season labels
    pub fn classify_text(&self, value: &str) -> Season {
        let value = value.trim();
        if let Ok(number) = value.parse::<f64>() {
            return self.classify_number(number);
        }
        match self {
            Self::Code { .. } => match value.to_ascii_lowercase().as_str() {
                "winter" => Season::Winter,
                "spring" => Season::Spring,
                _ => Season::Missing,
            },
            Self::MonthRange { .. } => month_number(value)
                .map_or(Season::Missing, |m| self.classify_number(f64::from(m))),
        }
    }

    /// Classify one level of a categorical column
    pub fn classify_level(&self, level: &Level) -> Season {
        match level {
            Level::Number(v) => self.classify_number(*v),
            Level::Text(s) => self.classify_text(s),
        }
    }
}

/// Month number for an English month name or three-letter abbreviation
pub fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august",
        "september", "october", "november", "december",
    ];
    let lower = name.trim().to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(&lower)))
        .map(|i| i as u32 + 1)
}

/// Season of every row of `source`, in row order
pub fn seasons(table: &Table, source: &str, mapping: &SeasonMapping) -> Result<Vec<Season>> {
    let seasons = match table.column(source)?.dtype() {
        DataType::Datetime(_, _) => {
            use chrono::Datelike;
            table
                .datetimes(source)?
                .into_iter()
                .map(|v| {
                    v.map_or(Season::Missing, |t| mapping.classify_number(f64::from(t.month())))
                })
                .collect()
        }
        _ if table.is_numeric(source) => table
            .numeric(source)?
            .into_iter()
            .map(|v| v.map_or(Season::Missing, |v| mapping.classify_number(v)))
            .collect(),
        _ => table
            .levels_of(source)?
            .values()
            .iter()
            .map(|v| v.as_ref().map_or(Season::Missing, |l| mapping.classify_level(l)))
            .collect(),
    };
    Ok(seasons)
}

/// Add a categorical season column derived from `source`
///
/// Only seasons that actually occur become levels, sorted like any other
/// categorical (spring before winter). Unmapped inputs become missing cells.
pub fn derive_season(
    table: &Table,
    source: &str,
    target: &str,
    mapping: &SeasonMapping,
) -> Result<Table> {
    let seasons = seasons(table, source, mapping)?;
    let labels: Vec<Option<&str>> = seasons.iter().map(|s| s.label()).collect();

    let missing = labels.iter().filter(|l| l.is_none()).count();
    debug!(source, target, missing, "derived season column");

    table.with_categorical(Series::new(target.into(), labels), false)
}
