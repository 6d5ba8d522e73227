//! CSV loading with declared date/time columns
//!
//! Parsing is done by the polars CSV reader with schema inference over the
//! whole file. The reader does not guess dates: columns named in the date
//! manifest arrive as text and are parsed here, cell by cell, with the
//! accepted layouts, so any cell that fails aborts the load with its row.
//! Numeric columns are widened to `Float64` with NaN and infinities read as
//! missing.

use crate::table::{finite_f64, is_number, Table};
use chrono::{NaiveDate, NaiveDateTime};
use perch_core::{Error, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Timestamp layouts accepted in text date columns, tried in order
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Cell contents treated as missing, besides the empty cell
const MISSING_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL"];

/// Load a CSV file into a [`Table`]
///
/// # Arguments
/// * `path` - CSV file with a header row
/// * `name` - Table name used in error messages
/// * `date_columns` - Columns that must parse as timestamps
#[instrument(skip(path, date_columns), fields(path = %path.display()))]
pub fn load_csv(path: &Path, name: &str, date_columns: &[&str]) -> Result<Table> {
    let bytes = std::fs::read(path).map_err(|e| Error::data_load(path, e))?;
    let table = read_csv(bytes, path, name, date_columns)?;
    info!(
        rows = table.n_rows(),
        columns = table.n_cols(),
        "loaded {}",
        name
    );
    Ok(table)
}

/// Parse CSV bytes; `source` is only used for error messages
pub fn read_csv(
    bytes: impl Into<Vec<u8>>,
    source: &Path,
    name: &str,
    date_columns: &[&str],
) -> Result<Table> {
    let null_values = MISSING_MARKERS.iter().map(|m| (*m).into()).collect();
    let mut frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_try_parse_dates(false)
                .with_null_values(Some(NullValues::AllColumns(null_values))),
        )
        .into_reader_with_file_handle(Cursor::new(bytes.into()))
        .finish()
        .map_err(|e| Error::data_load(source, e))?;

    if frame.width() == 0 {
        return Err(Error::data_load(source, "no header row"));
    }
    for &date_column in date_columns {
        if frame.get_column_index(date_column).is_none() {
            return Err(Error::missing_column(date_column, name));
        }
    }
    debug!(rows = frame.height(), "read raw frame");

    let mut replacements = Vec::new();
    for column in frame.get_columns() {
        let header = column.name().as_str();
        if date_columns.contains(&header) {
            replacements.push(parse_date_column(column, source)?);
        } else if is_number(column.dtype()) {
            replacements.push(finite_f64(column)?.into_series());
        }
    }
    for series in replacements {
        frame.with_column(series)?;
    }

    Ok(Table::new(name, frame))
}

/// Parse a timestamp in any accepted layout
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

const DATETIME: DataType = DataType::Datetime(TimeUnit::Milliseconds, None);

fn parse_date_column(column: &Column, source: &Path) -> Result<Series> {
    let header = column.name().clone();
    match column.dtype() {
        DataType::Null => Ok(Series::full_null(header, column.len(), &DATETIME)),
        DataType::String => {
            let values = column
                .str()?
                .into_iter()
                .enumerate()
                .map(|(row, cell)| match cell {
                    None => Ok(None),
                    Some(value) => parse_datetime(value.trim()).map(Some).ok_or_else(|| {
                        Error::data_load(
                            source,
                            format!(
                                "column `{header}` row {}: cannot parse `{value}` as a date/time",
                                row + 1
                            ),
                        )
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(
                DatetimeChunked::from_naive_datetime_options(
                    header,
                    values,
                    TimeUnit::Milliseconds,
                )
                .into_series(),
            )
        }
        other => Err(Error::data_load(
            source,
            format!("column `{header}` holds {other} values, not dates"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn read(text: &str, dates: &[&str]) -> Result<Table> {
        read_csv(text.as_bytes(), Path::new("inline.csv"), "inline", dates)
    }

    #[test]
    fn test_infers_numeric_and_text() {
        let table = read("a,b,c\n1,x,4\n2.5,y,5\n,z,6\n", &[]).unwrap();
        assert_eq!(table.numeric("a").unwrap(), vec![Some(1.0), Some(2.5), None]);
        assert_eq!(table.numeric("c").unwrap(), vec![Some(4.0), Some(5.0), Some(6.0)]);
        let dtypes = table.dtypes();
        assert_eq!(dtypes[1], ("b".to_string(), "text"));
        assert_eq!(dtypes[2], ("c".to_string(), "float64"));
    }

    #[test]
    fn test_parses_declared_dates() {
        let table = read(
            "time,n\n30/12/2017 18:37,1\n2018-01-02 03:04:05,2\n",
            &["time"],
        )
        .unwrap();
        let values = table.datetimes("time").unwrap();
        let first = values[0].unwrap();
        assert_eq!((first.day(), first.month(), first.year()), (30, 12, 2017));
        assert_eq!(first.hour(), 18);
        assert_eq!(values[1].unwrap().second(), 5);
    }

    #[test]
    fn test_mixed_layouts_in_event_dates() {
        let text = "\
start_time,bat_landing_to_food,rat_period_start,rat_period_end,sunset_time,risk
30/12/2017 18:37,16,30/12/2017 18:35,30/12/2017 18:38,30/12/2017 16:45,1
2018-01-02 03:04:05,0.07,2018-01-02 03:00,02/01/2018 03:10:00,2018-01-01,0
2018-01-03T19:20:00,4,03/01/2018 19:15,2018-01-03 19:25,03/01/2018,1
";
        let dates = ["start_time", "rat_period_start", "rat_period_end", "sunset_time"];
        let table = read(text, &dates).unwrap();
        for name in dates {
            assert_eq!(table.datetimes(name).unwrap().len(), 3, "{name}");
        }
        let start = table.datetimes("start_time").unwrap();
        assert_eq!(start[0].unwrap().day(), 30);
        assert_eq!(start[1].unwrap().second(), 5);
        assert_eq!(start[2].unwrap().minute(), 20);
        let sunset = table.datetimes("sunset_time").unwrap();
        assert_eq!((sunset[2].unwrap().day(), sunset[2].unwrap().hour()), (3, 0));
        assert_eq!(table.numeric("risk").unwrap(), vec![Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_empty_date_column_is_all_missing() {
        let table = read("time,n
,1
,2
", &["time"]).unwrap();
        assert_eq!(table.datetimes("time").unwrap(), vec![None, None]);
    }

    #[test]
    fn test_iso_dates() {
        let table = read("time\n2018-01-02 03:04:05\n2018-02-03 04:05:06\n", &["time"]).unwrap();
        let values = table.datetimes("time").unwrap();
        assert_eq!(values[1].unwrap().month(), 2);
    }

    #[test]
    fn test_bad_date_names_column() {
        let err = read("time\n01/01/2018 10:00\nnot-a-date\n", &["time"]).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::DataLoad { .. }));
        assert!(message.contains("inline.csv"));
        assert!(message.contains("`time`"));
        assert!(message.contains("row 2"));
    }

    #[test]
    fn test_numeric_date_column_rejected() {
        let err = read("time\n1\n2\n", &["time"]).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_missing_declared_date_column() {
        let err = read("a\n1\n", &["time"]).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_csv(Path::new("/nonexistent/perch.csv"), "events", &[]).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn test_missing_markers() {
        let table = read("a\nNA\n3\nnan\n", &[]).unwrap();
        assert_eq!(table.numeric("a").unwrap(), vec![None, Some(3.0), None]);
    }

    #[test]
    fn test_infinite_cells_read_as_missing() {
        let table = read("a\n1.5\ninf\n-inf\n2\n", &[]).unwrap();
        assert_eq!(
            table.numeric("a").unwrap(),
            vec![Some(1.5), None, None, Some(2.0)]
        );
    }

    #[test]
    fn test_date_only_values() {
        let parsed = parse_datetime("2018-03-04").unwrap();
        assert_eq!(parsed.hour(), 0);
        assert!(parse_datetime("yesterday").is_none());
    }
}
