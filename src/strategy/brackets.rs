//! Distance-from-ATH allocation brackets.

use crate::config::BracketStep;
use crate::strategy::Side;
use rust_decimal::Decimal;

/// Ordered, immutable step function from distance below ATH to an
/// allocation fraction of buying power.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketTable {
    steps: Vec<BracketStep>,
}

impl BracketTable {
    /// Build a table from steps ordered by ascending upper bound.
    ///
    /// Tables come from validated configuration; see `Config::validate`.
    pub fn new(steps: Vec<BracketStep>) -> Self {
        Self { steps }
    }

    /// Allocation fraction for a signed percent-from-ATH value.
    ///
    /// Prices above the all-time high (positive input) are not applicable.
    /// Upper bounds are inclusive, so exactly 6% down falls in the first
    /// step of the default table.
    pub fn fraction(&self, pct_from_ath: Decimal) -> Option<Decimal> {
        if pct_from_ath > Decimal::ZERO {
            return None;
        }
        let distance = pct_from_ath.abs();

        self.steps
            .iter()
            .find(|step| step.upper_bound.map_or(true, |bound| distance <= bound))
            .map(|step| step.fraction)
    }

    /// 1-based step number a distance falls in.
    pub fn step_for(&self, pct_from_ath: Decimal) -> Option<usize> {
        if pct_from_ath > Decimal::ZERO {
            return None;
        }
        let distance = pct_from_ath.abs();

        self.steps
            .iter()
            .position(|step| step.upper_bound.map_or(true, |bound| distance <= bound))
            .map(|idx| idx + 1)
    }

    pub fn steps(&self) -> &[BracketStep] {
        &self.steps
    }
}

/// Bullish and bearish bracket policies.
#[derive(Debug, Clone)]
pub struct BracketSelector {
    bullish: BracketTable,
    bearish: BracketTable,
}

impl BracketSelector {
    pub fn new(bullish: BracketTable, bearish: BracketTable) -> Self {
        Self { bullish, bearish }
    }

    pub fn bullish(&self, pct_from_ath: Decimal) -> Option<Decimal> {
        self.bullish.fraction(pct_from_ath)
    }

    pub fn bearish(&self, pct_from_ath: Decimal) -> Option<Decimal> {
        self.bearish.fraction(pct_from_ath)
    }

    pub fn for_side(&self, side: Side, pct_from_ath: Decimal) -> Option<Decimal> {
        match side {
            Side::Long => self.bullish(pct_from_ath),
            Side::Short => self.bearish(pct_from_ath),
        }
    }
}
