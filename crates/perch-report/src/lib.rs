//! Reporting for perch analyses
//!
//! Results are turned into console text and a summary file ([`text`]), and
//! into SVG charts described by backend-independent [`ChartSpec`] values
//! ([`chart`], [`render`]).

pub mod chart;
pub mod render;
pub mod text;

pub use chart::{ChartKind, ChartSpec, Interval, Mark, Series, SeriesData};
pub use render::render_svg;
pub use text::{
    format_result, skipped_line, summary_line, write_summary, CoefficientTable, OddsRatioTable,
    Outcome, ReportEntry,
};
