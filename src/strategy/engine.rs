//! Single-pass selection of order intents from screener rows.

use crate::config::AllocationConfig;
use crate::strategy::allocator::{AllocationCalculator, Side};
use crate::strategy::filter::{AccountState, Candidate, PositionFilter, RejectReason};
use crate::strategy::intent::{OrderIntent, OrderIntentBuilder};
use crate::strategy::parser::{RowParser, SkipReason};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// A raw row that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row_number: usize,
    pub reason: SkipReason,
}

/// A parsed row that produced no candidate on one side.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSide {
    pub row_number: usize,
    pub pair: String,
    pub side: Side,
    pub reason: RejectReason,
}

/// Everything one selection pass produced.
#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub generated_at: DateTime<Utc>,
    pub buying_power: Decimal,
    pub rows_scanned: usize,
    /// Accepted candidates in row-scan order
    pub candidates: Vec<Candidate>,
    /// Intents for candidates that buy at least one unit, same order
    pub intents: Vec<OrderIntent>,
    pub skipped: Vec<SkippedRow>,
    pub rejected: Vec<RejectedSide>,
}

impl SelectionReport {
    /// Skipped rows tallied by reason.
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for skip in &self.skipped {
            *counts.entry(skip.reason.label()).or_insert(0) += 1;
        }
        counts
    }

    /// Rejected row/sides tallied by reason.
    pub fn reject_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for reject in &self.rejected {
            *counts.entry(reject.reason.label()).or_insert(0) += 1;
        }
        counts
    }

    /// Candidates that were dropped for sizing below one unit.
    pub fn dropped_candidates(&self) -> usize {
        self.candidates.len() - self.intents.len()
    }
}

/// Turns screener rows and an account snapshot into order intents.
///
/// Holds only immutable configuration; all per-run state lives inside
/// [`SelectionEngine::select`].
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    parser: RowParser,
    calculator: AllocationCalculator,
    min_notional: Decimal,
    notional_decimals: u32,
    first_row_number: usize,
}

impl SelectionEngine {
    /// Create an engine from allocation settings. Row numbering assumes a
    /// header row was removed, so the first data row is row 2.
    pub fn new(config: &AllocationConfig) -> Self {
        Self::with_parts(
            RowParser::new(
                config.columns,
                &config.bullish_go_token,
                &config.bearish_go_token,
            ),
            AllocationCalculator::from_config(config),
            config.min_notional,
            config.notional_decimals,
        )
    }

    pub fn with_parts(
        parser: RowParser,
        calculator: AllocationCalculator,
        min_notional: Decimal,
        notional_decimals: u32,
    ) -> Self {
        Self {
            parser,
            calculator,
            min_notional,
            notional_decimals,
            first_row_number: 2,
        }
    }

    /// Set the sheet row number of the first row passed to `select`.
    pub fn with_first_row_number(mut self, first_row_number: usize) -> Self {
        self.first_row_number = first_row_number;
        self
    }

    /// Scan rows in order and select candidates.
    ///
    /// For each row the bullish path is evaluated before the bearish one,
    /// so a pair qualifying on both sides is taken long.
    #[instrument(skip_all, fields(rows = rows.len(), buying_power = %account.buying_power))]
    pub fn select<R, S>(&self, rows: &[R], account: &AccountState) -> SelectionReport
    where
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let mut filter = PositionFilter::new(account, self.min_notional, self.notional_decimals);
        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut rejected = Vec::new();

        for (offset, cells) in rows.iter().enumerate() {
            let row_number = self.first_row_number + offset;

            let row = match self.parser.parse(cells.as_ref()) {
                Ok(row) => row,
                Err(reason) => {
                    debug!(row_number, %reason, "Skipping row");
                    skipped.push(SkippedRow { row_number, reason });
                    continue;
                }
            };

            for side in Side::EVALUATION_ORDER {
                match filter.evaluate(&row, side, row_number, &self.calculator) {
                    Ok(candidate) => {
                        info!(
                            row_number,
                            pair = %candidate.pair,
                            side = %candidate.side,
                            price = %candidate.price,
                            notional = %candidate.notional,
                            "Selected candidate"
                        );
                        candidates.push(candidate);
                    }
                    Err(reason) => {
                        debug!(
                            row_number,
                            pair = %row.pair,
                            path = side.path(),
                            %reason,
                            "Rejected"
                        );
                        rejected.push(RejectedSide {
                            row_number,
                            pair: row.pair.clone(),
                            side,
                            reason,
                        });
                    }
                }
            }
        }

        let intents: Vec<OrderIntent> = candidates
            .iter()
            .filter_map(OrderIntentBuilder::build)
            .collect();

        if candidates.is_empty() {
            info!("No valid candidates found in sheet");
        }

        SelectionReport {
            generated_at: Utc::now(),
            buying_power: account.buying_power,
            rows_scanned: rows.len(),
            candidates,
            intents,
            skipped,
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn test_engine() -> SelectionEngine {
        SelectionEngine::new(&AllocationConfig::default())
    }

    struct RowFixture<'a> {
        pair: &'a str,
        price: &'a str,
        pct: &'a str,
        long_ma: &'a str,
        bull: &'a str,
        sentiment: &'a str,
        bear: &'a str,
    }

    fn cells(row: RowFixture<'_>) -> Vec<String> {
        let mut cells = vec![String::new(); 23];
        cells[0] = row.pair.to_string();
        cells[1] = row.price.to_string();
        cells[2] = row.pct.to_string();
        cells[10] = row.long_ma.to_string();
        cells[18] = row.bull.to_string();
        cells[20] = row.sentiment.to_string();
        cells[22] = row.bear.to_string();
        cells
    }

    fn bullish_row(pair: &str, price: &str, pct: &str, long_ma: &str) -> Vec<String> {
        cells(RowFixture {
            pair,
            price,
            pct,
            long_ma,
            bull: "💎",
            sentiment: "🟢",
            bear: "",
        })
    }

    fn bearish_row(pair: &str, price: &str, pct: &str, long_ma: &str) -> Vec<String> {
        cells(RowFixture {
            pair,
            price,
            pct,
            long_ma,
            bull: "",
            sentiment: "🔴",
            bear: "📉",
        })
    }

    // =========================================================================
    // Worked Examples
    // =========================================================================

    #[test]
    fn test_example_bullish_sizing() {
        let rows = vec![bullish_row("EUR_USD", "100", "-10%", "110")];
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].notional, dec!(2200.00));
        assert_eq!(report.intents.len(), 1);
        assert_eq!(report.intents[0].units, 22);
        assert_eq!(report.intents[0].side, Side::Long);
    }

    #[test]
    fn test_example_above_ath_yields_nothing() {
        let rows = vec![bullish_row("EUR_USD", "100", "5", "110")];
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));

        assert!(report.candidates.is_empty());
        assert_eq!(report.reject_counts().get("bracket_not_applicable"), Some(&1));
    }

    #[test]
    fn test_example_sub_threshold_rejected() {
        let mut row = bullish_row("EUR_USD", "100", "-1", "146");
        row[18] = "✨".to_string();
        let report = test_engine().select(&[row], &AccountState::new(dec!(10)));

        assert!(report.candidates.is_empty());
        assert_eq!(
            report.rejected[0].reason,
            RejectReason::BelowMinimum(dec!(0.73))
        );
    }

    #[test]
    fn test_example_clamped_to_buying_power() {
        let rows = vec![bullish_row("XAG_USD", "20", "-25", "90")];
        let report = test_engine().select(&rows, &AccountState::new(dec!(500)));

        assert_eq!(report.candidates[0].notional, dec!(500.00));
        assert_eq!(report.intents[0].units, 25); // floor(500 / 20)
    }

    #[test]
    fn test_example_held_pair_excluded() {
        let mut row = bullish_row("EUR_USD", "100", "-10", "110");
        row[22] = "📉".to_string();
        let account = AccountState::new(dec!(10000)).with_held(["EUR_USD"]);

        let report = test_engine().select(&[row], &account);
        assert!(report.candidates.is_empty());
        assert_eq!(report.reject_counts().get("already_held"), Some(&1));
    }

    // =========================================================================
    // Ordering and Deduplication
    // =========================================================================

    #[test]
    fn test_first_acceptance_wins_across_rows() {
        let rows = vec![
            bullish_row("EUR_USD", "100", "-10", "110"),
            bearish_row("EUR_USD", "100", "-3", "90"),
            bullish_row("EUR_USD", "100", "-20", "120"),
        ];
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].side, Side::Long);
        assert_eq!(report.candidates[0].row_number, 2);
        assert_eq!(report.reject_counts().get("duplicate_pair"), Some(&2));
    }

    #[test]
    fn test_short_side_from_bearish_path() {
        // 10000 * 0.20 * 2.0 * (120 / 100) = 4800 -> 40 units short
        let rows = vec![bearish_row("USD_JPY", "120", "-3", "100")];
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));

        assert_eq!(report.candidates[0].side, Side::Short);
        assert_eq!(report.candidates[0].notional, dec!(4800));
        assert_eq!(report.intents[0].units, -40);
    }

    #[test]
    fn test_candidates_keep_scan_order() {
        let rows = vec![
            bullish_row("AUD_USD", "1", "-3", "1"),
            bearish_row("GBP_USD", "1", "-3", "1"),
            bullish_row("EUR_USD", "1", "-25", "1"),
        ];
        let report = test_engine().select(&rows, &AccountState::new(dec!(1000)));

        let pairs: Vec<&str> = report.candidates.iter().map(|c| c.pair.as_str()).collect();
        assert_eq!(pairs, vec!["AUD_USD", "GBP_USD", "EUR_USD"]);
    }

    #[test]
    fn test_candidates_within_bounds() {
        let rows = vec![
            bullish_row("AUD_USD", "0.65", "-30", "3.2"),
            bullish_row("EUR_USD", "1.08", "-7", "1.1"),
            bearish_row("USD_CAD", "1.37", "-1", "1.2"),
        ];
        let account = AccountState::new(dec!(750));
        let report = test_engine().select(&rows, &account);

        assert_eq!(report.candidates.len(), 3);
        for c in &report.candidates {
            assert!(c.notional >= dec!(1.0));
            assert!(c.notional <= account.buying_power);
            assert_eq!(c.notional, c.notional.round_dp(2));
        }
    }

    // =========================================================================
    // Malformed Input
    // =========================================================================

    #[test]
    fn test_malformed_rows_skipped_without_halting() {
        let rows = vec![
            vec!["Pair".to_string(), "Price".to_string()],
            cells(RowFixture {
                pair: "pair",
                price: "Price",
                pct: "% Down",
                long_ma: "Long MA",
                bull: "Icon",
                sentiment: "Sentiment",
                bear: "Icon",
            }),
            bullish_row("", "100", "-10", "110"),
            bullish_row("EUR_USD", "abc", "-10", "110"),
            bullish_row("GBP_USD", "1.25", "-10", "1.3"),
        ];
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));

        assert_eq!(report.rows_scanned, 5);
        assert_eq!(report.skipped.len(), 4);
        assert_eq!(report.skipped[0].row_number, 2);
        assert_eq!(report.skip_counts().get("too_short"), Some(&1));
        assert_eq!(report.skip_counts().get("header_row"), Some(&1));
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].row_number, 6);
    }

    #[test]
    fn test_empty_input_is_empty_report() {
        let rows: Vec<Vec<String>> = Vec::new();
        let report = test_engine().select(&rows, &AccountState::new(dec!(10000)));
        assert!(report.candidates.is_empty());
        assert!(report.intents.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_sub_unit_candidate_dropped_from_intents() {
        // 100 * 0.05 * 2.0 * 1.0 = 10 notional at a price of 2400
        let rows = vec![bullish_row("XAU_USD", "2400", "-1", "2400")];
        let report = test_engine().select(&rows, &AccountState::new(dec!(100)));

        assert_eq!(report.candidates.len(), 1);
        assert!(report.intents.is_empty());
        assert_eq!(report.dropped_candidates(), 1);
    }

    #[test]
    fn test_row_numbering_without_header() {
        let rows = vec![bullish_row("EUR_USD", "100", "-10", "110")];
        let engine = test_engine().with_first_row_number(1);
        let report = engine.select(&rows, &AccountState::new(dec!(10000)));
        assert_eq!(report.candidates[0].row_number, 1);
    }

    #[test]
    fn test_repeated_runs_are_independent() {
        let engine = test_engine();
        let rows = vec![bullish_row("EUR_USD", "100", "-10", "110")];
        let account = AccountState::new(dec!(10000));

        let first = engine.select(&rows, &account);
        let second = engine.select(&rows, &account);
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(second.candidates.len(), 1);
    }
}
