//! Screener row sources.
//!
//! Rows arrive as ordered lists of text cells with the header already
//! removed. Two sources exist:
//! - `GoogleSheetsClient`: the live screener worksheet
//! - `CsvRowSource`: a local CSV export, for offline runs and planning

mod csv_source;
mod google;

pub use csv_source::CsvRowSource;
pub use google::GoogleSheetsClient;

use async_trait::async_trait;

/// Anything that can produce screener rows for one run.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Fetch data rows, header excluded.
    async fn fetch_rows(&self) -> anyhow::Result<Vec<Vec<String>>>;
}

/// Drop the header row if present and pad every row to the widest one.
///
/// Sheet exports omit trailing empty cells, so a row whose last columns are
/// blank would otherwise look too short to parse.
pub(crate) fn normalize_rows(mut rows: Vec<Vec<String>>, has_header: bool) -> Vec<Vec<String>> {
    if has_header && !rows.is_empty() {
        rows.remove(0);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    rows
}
