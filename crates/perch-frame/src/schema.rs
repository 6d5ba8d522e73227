//! Required columns of the two observation tables
//!
//! The loaders produce loosely typed [`Table`]s. A [`Schema`] checks the
//! documented columns once, right after loading, so a missing or mistyped
//! column is reported immediately with its name instead of surfacing as a
//! failure deep inside a later stage.

use crate::table::Table;
use perch_core::{Error, Result};

/// Date/time columns of the event table
pub const EVENT_DATE_COLUMNS: &[&str] = &[
    "start_time",
    "rat_period_start",
    "rat_period_end",
    "sunset_time",
];

/// Date/time columns of the window table
pub const WINDOW_DATE_COLUMNS: &[&str] = &["time"];

/// Kind of values a schema column must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    DateTime,
    Numeric,
    /// Numeric 0/1 indicator
    Binary,
    /// Text or numeric label, or a timestamp whose month is the label
    Label,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            Self::DateTime => "datetime",
            Self::Numeric => "float64",
            Self::Binary => "0/1 indicator",
            Self::Label => "label",
        }
    }
}

/// Required columns and their kinds
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub table: String,
    pub fields: Vec<(String, FieldKind)>,
}

impl Schema {
    fn new(table: &str, fields: &[(&str, FieldKind)]) -> Self {
        Self {
            table: table.to_string(),
            fields: fields
                .iter()
                .map(|(name, kind)| (name.to_string(), *kind))
                .collect(),
        }
    }

    /// Schema of the bat-landing event table; `season_column` holds the
    /// season source
    pub fn events(season_column: &str) -> Self {
        Self::new(
            "event table",
            &[
                ("start_time", FieldKind::DateTime),
                ("bat_landing_to_food", FieldKind::Numeric),
                ("seconds_after_rat_arrival", FieldKind::Numeric),
                ("risk", FieldKind::Binary),
                ("reward", FieldKind::Binary),
                ("hours_after_sunset", FieldKind::Numeric),
                (season_column, FieldKind::Label),
            ],
        )
    }

    /// Schema of the 30-minute window table; `season_column` holds the
    /// season source
    pub fn windows(season_column: &str) -> Self {
        Self::new(
            "window table",
            &[
                ("time", FieldKind::DateTime),
                (season_column, FieldKind::Label),
                ("bat_landing_number", FieldKind::Numeric),
                ("rat_arrival_number", FieldKind::Numeric),
                ("rat_minutes", FieldKind::Numeric),
                ("food_availability", FieldKind::Numeric),
            ],
        )
    }

    /// Check that every required column exists with the right kind of values
    pub fn validate(&self, table: &Table) -> Result<()> {
        for (name, kind) in &self.fields {
            if !table.has_column(name) {
                return Err(Error::missing_column(name, &self.table));
            }
            let dtype = table
                .dtypes()
                .into_iter()
                .find(|(column, _)| column == name)
                .map_or("other", |(_, dtype)| dtype);
            let ok = match kind {
                FieldKind::DateTime => table.is_datetime(name),
                FieldKind::Numeric => table.is_numeric(name),
                FieldKind::Binary => {
                    (table.is_numeric(name) || table.is_categorical(name))
                        && table.levels_of(name).is_ok_and(|c| {
                            c.levels()
                                .iter()
                                .all(|l| matches!(l.as_number(), Some(v) if v == 0.0 || v == 1.0))
                        })
                }
                FieldKind::Label => table.is_datetime(name) || table.levels_of(name).is_ok(),
            };
            if !ok {
                return Err(Error::ColumnType {
                    column: format!("{}.{name}", self.table),
                    expected: kind.name().to_string(),
                    found: dtype.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::{Season, SeasonMapping};
    use crate::loader::read_csv;
    use std::path::Path;

    const EVENTS: &str = "\
start_time,bat_landing_to_food,habit,rat_period_start,rat_period_end,seconds_after_rat_arrival,risk,reward,month,sunset_time,hours_after_sunset,season
30/12/2017 18:37,16,rat,30/12/2017 18:35,30/12/2017 18:38,108,1,0,0,30/12/2017 16:45,1.87,0
30/12/2017 19:51,0.07,fast,30/12/2017 19:50,30/12/2017 19:55,17,0,1,0,30/12/2017 16:45,3.1,1
";

    fn events(text: &str) -> Table {
        read_csv(text.as_bytes(), Path::new("events.csv"), "events", EVENT_DATE_COLUMNS).unwrap()
    }

    #[test]
    fn test_event_schema_accepts_fixture() {
        Schema::events("season").validate(&events(EVENTS)).unwrap();
    }

    #[test]
    fn test_missing_required_column() {
        let text = EVENTS.replace(",reward,", ",payoff,");
        let err = Schema::events("season").validate(&events(&text)).unwrap_err();
        assert_eq!(err.to_string(), "Missing column `reward` in event table");
    }

    #[test]
    fn test_season_column_follows_configuration() {
        let table = events(EVENTS);
        Schema::events("month").validate(&table).unwrap();
        let err = Schema::events("period").validate(&table).unwrap_err();
        assert_eq!(err.to_string(), "Missing column `period` in event table");
        assert!(Schema::windows("period")
            .fields
            .contains(&("period".to_string(), FieldKind::Label)));
    }

    #[test]
    fn test_non_binary_indicator_rejected() {
        let text = EVENTS.replace(",1,0,0,30/12/2017 16:45,1.87", ",2,0,0,30/12/2017 16:45,1.87");
        let err = Schema::events("season").validate(&events(&text)).unwrap_err();
        assert!(matches!(err, Error::ColumnType { .. }));
        assert!(err.to_string().contains("risk"));
    }

    #[test]
    fn test_datetime_season_source_accepted() {
        let table = events(EVENTS);
        Schema::events("sunset_time").validate(&table).unwrap();

        let windows = read_csv(
            "time,month,bat_landing_number,rat_arrival_number,rat_minutes,food_availability\n\
             01/05/2018 18:00,5,48,1,4.11,4.0\n\
             02/09/2018 18:30,9,39,0,0,3.4\n"
                .as_bytes(),
            Path::new("windows.csv"),
            "windows",
            WINDOW_DATE_COLUMNS,
        )
        .unwrap();
        Schema::windows("time").validate(&windows).unwrap();
        let seasons = crate::clean::seasons(&windows, "time", &SeasonMapping::month_ranges()).unwrap();
        assert_eq!(seasons, vec![Season::Winter, Season::Spring]);
    }
}
