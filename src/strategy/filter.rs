//! Candidate acceptance rules.

use crate::strategy::allocator::{Allocation, AllocationCalculator, Side};
use crate::strategy::parser::ScreenerRow;
use crate::utils::decimal::{round_to_precision, truncate_to_precision};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Account snapshot the engine sizes against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountState {
    /// Capital deployable this run
    pub buying_power: Decimal,
    /// Instruments with a non-zero long or short position
    pub held: HashSet<String>,
}

impl AccountState {
    pub fn new(buying_power: Decimal) -> Self {
        Self {
            buying_power,
            held: HashSet::new(),
        }
    }

    pub fn with_held<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.held.extend(instruments.into_iter().map(Into::into));
        self
    }

    pub fn is_held(&self, pair: &str) -> bool {
        self.held.contains(pair)
    }
}

/// A row/side that passed every acceptance rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub pair: String,
    pub price: Decimal,
    pub raw_notional: Decimal,
    /// Clamped to buying power and rounded
    pub notional: Decimal,
    pub side: Side,
    /// 1-based sheet row the candidate came from
    pub row_number: usize,
}

/// Why a row/side did not become a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("go signal not set")]
    NoGoSignal,
    #[error("mood marker '{0}' not in multiplier table")]
    UnknownMarker(String),
    #[error("bracket not applicable for {0}% from ATH")]
    BracketNotApplicable(Decimal),
    #[error("instrument already held")]
    AlreadyHeld,
    #[error("notional calculation overflowed")]
    Overflow,
    #[error("raw notional {0} below minimum")]
    BelowMinimum(Decimal),
    #[error("notional {0} below minimum after clamping and rounding")]
    BelowMinimumAfterRounding(Decimal),
    #[error("pair already selected this run")]
    DuplicatePair,
}

impl RejectReason {
    /// Short stable label for tallying.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NoGoSignal => "no_go_signal",
            RejectReason::UnknownMarker(_) => "unknown_marker",
            RejectReason::BracketNotApplicable(_) => "bracket_not_applicable",
            RejectReason::AlreadyHeld => "already_held",
            RejectReason::Overflow => "overflow",
            RejectReason::BelowMinimum(_) => "below_minimum",
            RejectReason::BelowMinimumAfterRounding(_) => "below_minimum_after_rounding",
            RejectReason::DuplicatePair => "duplicate_pair",
        }
    }
}

/// Applies the acceptance pipeline to each row/side in scan order.
///
/// Lives for one run: the set of already selected pairs starts empty.
#[derive(Debug)]
pub struct PositionFilter<'a> {
    account: &'a AccountState,
    min_notional: Decimal,
    notional_decimals: u32,
    used_pairs: HashSet<String>,
}

impl<'a> PositionFilter<'a> {
    pub fn new(account: &'a AccountState, min_notional: Decimal, notional_decimals: u32) -> Self {
        Self {
            account,
            min_notional,
            notional_decimals,
            used_pairs: HashSet::new(),
        }
    }

    /// Run one row/side through the rules. Accepted candidates reserve
    /// their pair for the rest of the run.
    pub fn evaluate(
        &mut self,
        row: &ScreenerRow,
        side: Side,
        row_number: usize,
        calculator: &AllocationCalculator,
    ) -> Result<Candidate, RejectReason> {
        let (go, marker) = match side {
            Side::Long => (row.bullish_go, &row.bullish_marker),
            Side::Short => (row.bearish_go, &row.bearish_marker),
        };
        if !go {
            return Err(RejectReason::NoGoSignal);
        }
        let mood_scale = calculator
            .mood_scale(row, side)
            .ok_or_else(|| RejectReason::UnknownMarker(marker.clone()))?;

        let fraction = calculator
            .brackets()
            .for_side(side, row.pct_from_ath)
            .ok_or(RejectReason::BracketNotApplicable(row.pct_from_ath))?;

        if self.account.is_held(&row.pair) {
            return Err(RejectReason::AlreadyHeld);
        }

        let Allocation {
            base,
            trend_factor,
            raw_notional,
            ..
        } = calculator
            .size(row, side, self.account.buying_power, fraction, mood_scale)
            .ok_or(RejectReason::Overflow)?;

        debug!(
            row_number,
            pair = %row.pair,
            path = side.path(),
            price = %row.price,
            pct_from_ath = %row.pct_from_ath,
            bracket_fraction = %fraction,
            marker = %marker,
            %mood_scale,
            long_ma = %row.long_ma,
            %trend_factor,
            %base,
            %raw_notional,
            "Sized row"
        );

        if raw_notional < self.min_notional {
            return Err(RejectReason::BelowMinimum(raw_notional));
        }

        let clamped = if raw_notional > self.account.buying_power {
            debug!(
                pair = %row.pair,
                %raw_notional,
                buying_power = %self.account.buying_power,
                "Notional exceeds buying power, clamping"
            );
            self.account.buying_power
        } else {
            raw_notional
        };

        // Rounding must never push the notional past buying power.
        let mut notional = round_to_precision(clamped, self.notional_decimals);
        if notional > self.account.buying_power {
            notional = truncate_to_precision(clamped, self.notional_decimals);
        }
        if notional < self.min_notional {
            return Err(RejectReason::BelowMinimumAfterRounding(notional));
        }

        if !self.used_pairs.insert(row.pair.clone()) {
            return Err(RejectReason::DuplicatePair);
        }

        Ok(Candidate {
            pair: row.pair.clone(),
            price: row.price,
            raw_notional,
            notional,
            side,
            row_number,
        })
    }

    /// Pairs accepted so far this run.
    pub fn selected_pairs(&self) -> &HashSet<String> {
        &self.used_pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    fn test_calculator() -> AllocationCalculator {
        AllocationCalculator::from_config(&AllocationConfig::default())
    }

    fn test_row(pair: &str, price: Decimal, pct: Decimal, long_ma: Decimal) -> ScreenerRow {
        ScreenerRow {
            pair: pair.to_string(),
            price,
            pct_from_ath: pct,
            long_ma,
            bullish_marker: "💎".to_string(),
            bullish_go: true,
            bearish_marker: "💀".to_string(),
            bearish_go: false,
        }
    }

    fn bearish(mut row: ScreenerRow) -> ScreenerRow {
        row.bullish_go = false;
        row.bearish_go = true;
        row
    }

    // =========================================================================
    // Acceptance
    // =========================================================================

    #[test]
    fn test_accepts_worked_example() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(100), dec!(-10), dec!(110));

        let candidate = filter.evaluate(&row, Side::Long, 2, &calc).unwrap();
        assert_eq!(candidate.notional, dec!(2200.00));
        assert_eq!(candidate.side, Side::Long);
        assert_eq!(candidate.row_number, 2);
        assert!(filter.selected_pairs().contains("EUR_USD"));
    }

    #[test]
    fn test_bearish_candidate_is_short() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = bearish(test_row("XAU_USD", dec!(120), dec!(-2), dec!(100)));

        // 10000 * 0.20 * 2.5 * 1.2 = 6000
        let candidate = filter.evaluate(&row, Side::Short, 3, &calc).unwrap();
        assert_eq!(candidate.side, Side::Short);
        assert_eq!(candidate.notional, dec!(6000));
    }

    // =========================================================================
    // Rejection Steps
    // =========================================================================

    #[test]
    fn test_rejects_without_go_signal() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(100), dec!(-10), dec!(110));

        assert_eq!(
            filter.evaluate(&row, Side::Short, 2, &calc),
            Err(RejectReason::NoGoSignal)
        );
    }

    #[test]
    fn test_rejects_unknown_marker() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let mut row = test_row("EUR_USD", dec!(100), dec!(-10), dec!(110));
        row.bullish_marker = "🐢".to_string();

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::UnknownMarker("🐢".to_string()))
        );
    }

    #[test]
    fn test_rejects_above_ath() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(100), dec!(5), dec!(110));

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::BracketNotApplicable(dec!(5)))
        );
    }

    #[test]
    fn test_rejects_held_instrument_on_both_sides() {
        let account = AccountState::new(dec!(10000)).with_held(["EUR_USD"]);
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(100), dec!(-10), dec!(110));

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::AlreadyHeld)
        );
        assert_eq!(
            filter.evaluate(&bearish(row), Side::Short, 2, &calc),
            Err(RejectReason::AlreadyHeld)
        );
    }

    #[test]
    fn test_rejects_sub_threshold_raw_notional() {
        // 10 * 0.05 * 1.0 * 1.46 = 0.73
        let account = AccountState::new(dec!(10));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let mut row = test_row("EUR_USD", dec!(100), dec!(-1), dec!(146));
        row.bullish_marker = "💥".to_string();

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::BelowMinimum(dec!(0.73)))
        );
    }

    #[test]
    fn test_clamps_to_buying_power() {
        // 500 * 0.20 * 2.0 * 4.5 = 900, clamped to 500
        let account = AccountState::new(dec!(500));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(20), dec!(-25), dec!(90));

        let candidate = filter.evaluate(&row, Side::Long, 2, &calc).unwrap();
        assert_eq!(candidate.raw_notional, dec!(900));
        assert_eq!(candidate.notional, dec!(500.00));
    }

    #[test]
    fn test_rejects_when_clamp_and_rounding_drop_below_minimum() {
        // 0.994 * 0.20 * 2.0 * 10 = 3.976, clamped to 0.994, rounded to 0.99
        let account = AccountState::new(dec!(0.994));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(1), dec!(-25), dec!(10));

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::BelowMinimumAfterRounding(dec!(0.99)))
        );
    }

    #[test]
    fn test_clamped_notional_rounds_down_to_buying_power() {
        // 500.555 * 0.20 * 2.0 * 4.5 = 900.999, clamped to 500.555.
        // Nearest rounding would give 500.56, above buying power.
        let account = AccountState::new(dec!(500.555));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(20), dec!(-25), dec!(90));

        let candidate = filter.evaluate(&row, Side::Long, 2, &calc).unwrap();
        assert_eq!(candidate.notional, dec!(500.55));
        assert!(candidate.notional <= account.buying_power);
    }

    #[test]
    fn test_unclamped_notional_at_buying_power_rounds_down() {
        // 1001.115 * 0.05 * 1.0 * 20 = 1001.115, equal to buying power, so no clamp
        let account = AccountState::new(dec!(1001.115));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let mut row = test_row("EUR_USD", dec!(1), dec!(-1), dec!(20));
        row.bullish_marker = "💥".to_string();

        let candidate = filter.evaluate(&row, Side::Long, 2, &calc).unwrap();
        assert_eq!(candidate.raw_notional, dec!(1001.115));
        assert_eq!(candidate.notional, dec!(1001.11));
    }

    #[test]
    fn test_clamp_below_minimum_is_not_rounded_up() {
        // Clamped to 0.996; rounding to 1.00 would exceed buying power
        let account = AccountState::new(dec!(0.996));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(1), dec!(-25), dec!(10));

        assert_eq!(
            filter.evaluate(&row, Side::Long, 2, &calc),
            Err(RejectReason::BelowMinimumAfterRounding(dec!(0.99)))
        );
    }

    #[test]
    fn test_rejects_second_acceptance_of_same_pair() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let row = test_row("EUR_USD", dec!(100), dec!(-10), dec!(110));

        assert!(filter.evaluate(&row, Side::Long, 2, &calc).is_ok());
        assert_eq!(
            filter.evaluate(&bearish(row), Side::Short, 5, &calc),
            Err(RejectReason::DuplicatePair)
        );
    }

    #[test]
    fn test_rejected_rows_do_not_reserve_pair() {
        let account = AccountState::new(dec!(10000));
        let calc = test_calculator();
        let mut filter = PositionFilter::new(&account, dec!(1), 2);
        let above_ath = test_row("EUR_USD", dec!(100), dec!(3), dec!(110));
        let below_ath = test_row("EUR_USD", dec!(100), dec!(-3), dec!(110));

        assert!(filter.evaluate(&above_ath, Side::Long, 2, &calc).is_err());
        assert!(filter.evaluate(&below_ath, Side::Long, 3, &calc).is_ok());
    }

    proptest! {
        #[test]
        fn prop_notional_never_exceeds_buying_power(
            bp_ten_thousandths in 10_000i64..1_000_000_000,
            price_cents in 1i64..100_000,
            ma_cents in 1i64..100_000,
            pct in -60i64..=0,
        ) {
            let account = AccountState::new(Decimal::new(bp_ten_thousandths, 4));
            let calc = test_calculator();
            let mut filter = PositionFilter::new(&account, dec!(1), 2);
            let row = test_row(
                "EUR_USD",
                Decimal::new(price_cents, 2),
                Decimal::from(pct),
                Decimal::new(ma_cents, 2),
            );

            if let Ok(candidate) = filter.evaluate(&row, Side::Long, 2, &calc) {
                prop_assert!(candidate.notional >= dec!(1));
                prop_assert!(candidate.notional <= account.buying_power);
                prop_assert_eq!(candidate.notional, candidate.notional.round_dp(2));
            }
        }
    }

    #[test]
    fn test_reject_labels() {
        assert_eq!(RejectReason::AlreadyHeld.label(), "already_held");
        assert_eq!(RejectReason::DuplicatePair.to_string(), "pair already selected this run");
    }
}
