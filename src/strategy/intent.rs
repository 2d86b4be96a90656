//! Conversion of sized candidates into integral order intents.

use crate::strategy::allocator::Side;
use crate::strategy::filter::Candidate;
use crate::utils::decimal::whole_units;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

/// A market order the broker should submit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderIntent {
    pub pair: String,
    /// Signed unit count: positive buys, negative sells. Never zero.
    pub units: i64,
    pub side: Side,
    /// Sheet price the units were computed from
    pub price: Decimal,
    pub notional: Decimal,
}

impl OrderIntent {
    /// Absolute unit count.
    pub fn quantity(&self) -> u64 {
        self.units.unsigned_abs()
    }
}

/// Builds order intents from accepted candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderIntentBuilder;

impl OrderIntentBuilder {
    /// `None` when the notional buys less than one whole unit.
    pub fn build(candidate: &Candidate) -> Option<OrderIntent> {
        let units = match whole_units(candidate.notional, candidate.price) {
            Some(units) if units > 0 => units,
            Some(_) => {
                debug!(
                    pair = %candidate.pair,
                    price = %candidate.price,
                    notional = %candidate.notional,
                    "Calculated units <= 0, dropping candidate"
                );
                return None;
            }
            None => {
                warn!(
                    pair = %candidate.pair,
                    price = %candidate.price,
                    notional = %candidate.notional,
                    "Unit count not representable, dropping candidate"
                );
                return None;
            }
        };

        Some(OrderIntent {
            pair: candidate.pair.clone(),
            units: units * candidate.side.sign(),
            side: candidate.side,
            price: candidate.price,
            notional: candidate.notional,
        })
    }
}
