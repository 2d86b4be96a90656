//! Local CSV export of the screener worksheet.

use crate::sheets::{normalize_rows, RowSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads screener rows from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    path: PathBuf,
    has_header: bool,
}

impl CsvRowSource {
    pub fn new(path: impl Into<PathBuf>, has_header: bool) -> Self {
        Self {
            path: path.into(),
            has_header,
        }
    }

    /// Parse CSV text into rows of cells.
    fn parse(&self, text: &str) -> Result<Vec<Vec<String>>> {
        // Headers are handled by `normalize_rows`, rows may differ in width.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Malformed CSV record {}", index + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(normalize_rows(rows, self.has_header))
    }
}

#[async_trait]
impl RowSource for CsvRowSource {
    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }

    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let rows = self.parse(&text)?;
        debug!(path = %self.path.display(), rows = rows.len(), "Loaded CSV rows");
        Ok(rows)
    }
}
