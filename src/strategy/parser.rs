//! Screener row normalization.

use crate::config::ColumnConfig;
use crate::utils::decimal::parse_decimal;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::trace;

/// A fully typed screener row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerRow {
    /// Instrument identifier as written in the sheet (e.g., "EUR_USD")
    pub pair: String,
    pub price: Decimal,
    /// Signed percent distance from the all-time high (negative = below)
    pub pct_from_ath: Decimal,
    pub long_ma: Decimal,
    pub bullish_marker: String,
    pub bullish_go: bool,
    pub bearish_marker: String,
    pub bearish_go: bool,
}

/// Why a raw row was not turned into a [`ScreenerRow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("row has {cells} cells, need more than {max_index}")]
    TooShort { cells: usize, max_index: usize },
    #[error("empty pair")]
    EmptyPair,
    #[error("header row")]
    HeaderRow,
    #[error("invalid price '{0}'")]
    InvalidPrice(String),
    #[error("invalid percent from ATH '{0}'")]
    InvalidPctFromAth(String),
    #[error("invalid long MA '{0}'")]
    InvalidLongMa(String),
}

impl SkipReason {
    /// Short stable label for tallying.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::TooShort { .. } => "too_short",
            SkipReason::EmptyPair => "empty_pair",
            SkipReason::HeaderRow => "header_row",
            SkipReason::InvalidPrice(_) => "invalid_price",
            SkipReason::InvalidPctFromAth(_) => "invalid_pct_from_ath",
            SkipReason::InvalidLongMa(_) => "invalid_long_ma",
        }
    }
}

/// Parse a numeric cell.
///
/// Trims whitespace and one trailing percent sign. Blank or unparseable
/// cells yield `None`, never a default.
pub fn parse_cell_number(raw: &str) -> Option<Decimal> {
    let value = raw.trim();
    let value = value.strip_suffix('%').unwrap_or(value).trim();
    if value.is_empty() {
        return None;
    }
    parse_decimal(value)
}

/// Turns raw sheet rows into typed screener rows.
#[derive(Debug, Clone)]
pub struct RowParser {
    columns: ColumnConfig,
    bullish_go_token: String,
    bearish_go_token: String,
}

impl RowParser {
    pub fn new(columns: ColumnConfig, bullish_go_token: &str, bearish_go_token: &str) -> Self {
        Self {
            columns,
            bullish_go_token: bullish_go_token.trim().to_string(),
            bearish_go_token: bearish_go_token.trim().to_string(),
        }
    }

    /// Parse one row of cells.
    pub fn parse<S: AsRef<str>>(&self, cells: &[S]) -> Result<ScreenerRow, SkipReason> {
        let cols = &self.columns;
        let max_index = cols.max_index();

        if cells.len() <= max_index {
            return Err(SkipReason::TooShort {
                cells: cells.len(),
                max_index,
            });
        }

        let cell = |idx: usize| cells[idx].as_ref();

        let pair = cell(cols.pair).trim();
        if pair.is_empty() {
            return Err(SkipReason::EmptyPair);
        }
        if pair.eq_ignore_ascii_case("pair") {
            return Err(SkipReason::HeaderRow);
        }

        let price = parse_cell_number(cell(cols.price))
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| SkipReason::InvalidPrice(cell(cols.price).to_string()))?;

        let long_ma = parse_cell_number(cell(cols.long_ma))
            .filter(|ma| *ma > Decimal::ZERO)
            .ok_or_else(|| SkipReason::InvalidLongMa(cell(cols.long_ma).to_string()))?;

        let pct_from_ath = parse_cell_number(cell(cols.pct_from_ath))
            .ok_or_else(|| SkipReason::InvalidPctFromAth(cell(cols.pct_from_ath).to_string()))?;

        let sentiment = cell(cols.sentiment).trim();

        let row = ScreenerRow {
            pair: pair.to_string(),
            price,
            pct_from_ath,
            long_ma,
            bullish_marker: cell(cols.bullish_marker).trim().to_string(),
            bullish_go: sentiment == self.bullish_go_token,
            bearish_marker: cell(cols.bearish_marker).trim().to_string(),
            bearish_go: sentiment == self.bearish_go_token,
        };

        trace!(
            pair = %row.pair,
            price = %row.price,
            pct_from_ath = %row.pct_from_ath,
            long_ma = %row.long_ma,
            "Parsed row"
        );
        Ok(row)
    }
}
