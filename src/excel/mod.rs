//! Excel export of year-end reports
//!
//! One worksheet per form type: a merged title row, a grouped two-level
//! header, one row per institution sorted by name, and a trailing notes column.

mod exporter;

pub use exporter::{header_groups, HeaderGroup, ReportColumn, YearEndExporter, FIRST_DATA_ROW};
