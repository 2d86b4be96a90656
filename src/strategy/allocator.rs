//! Bracket, mood and trend sizing of raw notionals.

use crate::config::{AllocationConfig, MoodMultiplier};
use crate::strategy::brackets::{BracketSelector, BracketTable};
use crate::strategy::parser::ScreenerRow;
use crate::utils::decimal::safe_div;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Direction of a prospective position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Produced by the bullish path
    Long,
    /// Produced by the bearish path
    Short,
}

impl Side {
    /// Evaluation order for a single row. Bullish goes first, so it wins a
    /// pair that qualifies on both paths.
    pub const EVALUATION_ORDER: [Side; 2] = [Side::Long, Side::Short];

    /// Sign applied to unit counts.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Side::Long => "bullish",
            Side::Short => "bearish",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Immutable mood marker -> scale factor lookup.
#[derive(Debug, Clone, Default)]
pub struct MultiplierTable {
    scales: HashMap<String, Decimal>,
}

impl MultiplierTable {
    pub fn new(entries: &[MoodMultiplier]) -> Self {
        let scales = entries
            .iter()
            .map(|e| (e.marker.trim().to_string(), e.scale))
            .collect();
        Self { scales }
    }

    /// Scale for a marker, or `None` when the marker is blank or unknown.
    pub fn lookup(&self, marker: &str) -> Option<Decimal> {
        let marker = marker.trim();
        if marker.is_empty() {
            return None;
        }
        self.scales.get(marker).copied()
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }
}

/// Breakdown of a raw notional, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub bracket_fraction: Decimal,
    pub base: Decimal,
    pub mood_scale: Decimal,
    pub trend_factor: Decimal,
    pub raw_notional: Decimal,
}

/// Combines bracket, mood and trend factors into a raw notional.
///
/// Holds only immutable tables; identical inputs always size identically.
#[derive(Debug, Clone)]
pub struct AllocationCalculator {
    brackets: BracketSelector,
    bullish_multipliers: MultiplierTable,
    bearish_multipliers: MultiplierTable,
}

impl AllocationCalculator {
    /// Create a new allocation calculator.
    pub fn new(
        brackets: BracketSelector,
        bullish_multipliers: MultiplierTable,
        bearish_multipliers: MultiplierTable,
    ) -> Self {
        Self {
            brackets,
            bullish_multipliers,
            bearish_multipliers,
        }
    }

    pub fn from_config(config: &AllocationConfig) -> Self {
        Self::new(
            BracketSelector::new(
                BracketTable::new(config.bullish_brackets.clone()),
                BracketTable::new(config.bearish_brackets.clone()),
            ),
            MultiplierTable::new(&config.bullish_multipliers),
            MultiplierTable::new(&config.bearish_multipliers),
        )
    }

    pub fn brackets(&self) -> &BracketSelector {
        &self.brackets
    }

    /// Mood scale for the side's marker on this row.
    pub fn mood_scale(&self, row: &ScreenerRow, side: Side) -> Option<Decimal> {
        match side {
            Side::Long => self.bullish_multipliers.lookup(&row.bullish_marker),
            Side::Short => self.bearish_multipliers.lookup(&row.bearish_marker),
        }
    }

    /// Price position relative to the long moving average.
    ///
    /// Bullish sizing grows when price trades below the average, bearish
    /// sizing when it trades above.
    pub fn trend_factor(row: &ScreenerRow, side: Side) -> Option<Decimal> {
        match side {
            Side::Long => safe_div(row.long_ma, row.price),
            Side::Short => safe_div(row.price, row.long_ma),
        }
    }

    /// Raw notional before any clamping.
    ///
    /// Returns `None` only on arithmetic overflow.
    pub fn size(
        &self,
        row: &ScreenerRow,
        side: Side,
        buying_power: Decimal,
        bracket_fraction: Decimal,
        mood_scale: Decimal,
    ) -> Option<Allocation> {
        let base = buying_power.checked_mul(bracket_fraction)?;
        let trend_factor = Self::trend_factor(row, side)?;
        let raw_notional = base.checked_mul(mood_scale)?.checked_mul(trend_factor)?;

        Some(Allocation {
            bracket_fraction,
            base,
            mood_scale,
            trend_factor,
            raw_notional,
        })
    }
}
