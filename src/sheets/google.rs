//! Google Sheets API v4 values client.

use crate::config::SheetConfig;
use crate::sheets::{normalize_rows, RowSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument, warn};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// Response of `spreadsheets.values.get`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    range: String,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the screener worksheet through the Sheets REST API.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    http: Client,
    base_url: String,
    config: SheetConfig,
}

impl GoogleSheetsClient {
    /// Create a new Sheets client.
    pub fn new(config: &SheetConfig, timeout_secs: u64) -> Result<Self> {
        Self::with_base_url(config, timeout_secs, SHEETS_BASE_URL)
    }

    /// Create a Sheets client against a custom base URL.
    pub fn with_base_url(config: &SheetConfig, timeout_secs: u64, base_url: &str) -> Result<Self> {
        anyhow::ensure!(
            !config.spreadsheet_id.trim().is_empty(),
            "GOOGLE_SHEET_ID must be set"
        );
        anyhow::ensure!(
            !config.api_key.is_empty() || !config.access_token.is_empty(),
            "GOOGLE_API_KEY or GOOGLE_ACCESS_TOKEN must be set"
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            config: config.clone(),
        })
    }

    fn values_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(self.config.spreadsheet_id.trim()),
            urlencoding::encode(&self.config.worksheet)
        )
    }
}

/// Render a cell the way it appears in the sheet.
fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RowSource for GoogleSheetsClient {
    fn describe(&self) -> String {
        format!(
            "Google Sheet {} / {}",
            self.config.spreadsheet_id, self.config.worksheet
        )
    }

    #[instrument(skip(self), fields(worksheet = %self.config.worksheet))]
    async fn fetch_rows(&self) -> Result<Vec<Vec<String>>> {
        let mut request = self
            .http
            .get(self.values_url())
            .query(&[("majorDimension", "ROWS")]);

        // An OAuth token takes precedence over an API key.
        if !self.config.access_token.is_empty() {
            request = request.bearer_auth(&self.config.access_token);
        } else {
            request = request.query(&[("key", self.config.api_key.as_str())]);
        }

        info!("Opening Google Sheet: {}", self.describe());
        let response = request
            .send()
            .await
            .context("Failed to fetch sheet values")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google Sheets API error {}: {}", status, body);
        }

        let range: ValueRange = response
            .json()
            .await
            .context("Failed to parse sheet values response")?;

        if range.values.is_empty() {
            warn!(range = %range.range, "No data found in sheet");
            return Ok(Vec::new());
        }

        let rows = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();

        Ok(normalize_rows(rows, self.config.has_header))
    }
}
