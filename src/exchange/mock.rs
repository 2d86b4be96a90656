//! In-memory paper trading broker.

use crate::exchange::traits::Broker;
use crate::exchange::types::OrderReceipt;
use crate::strategy::{AccountState, OrderIntent};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated account state.
#[derive(Debug, Clone, Default)]
pub struct PaperAccount {
    pub buying_power: Decimal,
    /// Net signed units per instrument
    pub positions: HashMap<String, i64>,
    pub order_count: u64,
}

/// Paper broker that fills every affordable market order at the intent's
/// reference price.
pub struct PaperBroker {
    state: RwLock<PaperAccount>,
    order_id_counter: AtomicU64,
}

impl PaperBroker {
    /// Create a paper account with the given starting buying power.
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            state: RwLock::new(PaperAccount {
                buying_power: starting_balance,
                ..Default::default()
            }),
            order_id_counter: AtomicU64::new(1),
        }
    }

    /// Seed an existing position.
    pub async fn with_position(self, instrument: &str, units: i64) -> Self {
        self.state
            .write()
            .await
            .positions
            .insert(instrument.to_string(), units);
        self
    }

    /// Snapshot of the simulated account.
    pub async fn snapshot(&self) -> PaperAccount {
        self.state.read().await.clone()
    }

    fn next_order_id(&self) -> u64 {
        self.order_id_counter.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn account_state(&self) -> Result<AccountState> {
        let state = self.state.read().await;
        let held = state
            .positions
            .iter()
            .filter(|(_, units)| **units != 0)
            .map(|(instrument, _)| instrument.clone());

        Ok(AccountState::new(state.buying_power).with_held(held))
    }

    async fn submit_market_order(&self, intent: &OrderIntent) -> Result<OrderReceipt> {
        anyhow::ensure!(intent.units != 0, "Units must be non-zero for a market order");

        let cost = Decimal::from(intent.quantity())
            .checked_mul(intent.price)
            .ok_or_else(|| anyhow::anyhow!("Order cost overflow for {}", intent.pair))?;

        let mut state = self.state.write().await;
        anyhow::ensure!(
            cost <= state.buying_power,
            "Insufficient buying power for {}: need {}, have {}",
            intent.pair,
            cost,
            state.buying_power
        );

        state.buying_power -= cost;
        state.order_count += 1;

        let net = {
            let position = state.positions.entry(intent.pair.clone()).or_insert(0);
            *position += intent.units;
            *position
        };
        if net == 0 {
            state.positions.remove(&intent.pair);
        }

        let order_id = self.next_order_id();
        debug!(order_id, pair = %intent.pair, net_units = net, "Paper position updated");
        info!(
            pair = %intent.pair,
            units = intent.units,
            price = %intent.price,
            %cost,
            remaining = %state.buying_power,
            "[PAPER] Market order filled"
        );

        Ok(OrderReceipt {
            pair: intent.pair.clone(),
            units: intent.units,
            order_id: Some(format!("PAPER-{}", order_id)),
            fill_id: Some(format!("PAPER-{}-FILL", order_id)),
            fill_price: Some(intent.price),
        })
    }
}
