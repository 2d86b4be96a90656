//! Order submission for selected intents.

use crate::config::ExecutionConfig;
use crate::exchange::{Broker, OrderReceipt};
use crate::strategy::{AccountState, OrderIntent};
use serde::Serialize;
use tracing::{error, info, warn};

/// Submits order intents to a broker.
pub struct OrderExecutor {
    config: ExecutionConfig,
}

/// Outcome of one submission attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub pair: String,
    pub units: i64,
    pub success: bool,
    pub receipt: Option<OrderReceipt>,
    pub error: Option<String>,
}

impl OrderExecutor {
    /// Create a new order executor.
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// In single-position mode nothing is traded while any position is open.
    pub fn should_skip_run(&self, account: &AccountState) -> bool {
        self.config.single_position_mode && !account.held.is_empty()
    }

    /// Intents that will actually be submitted.
    pub fn eligible<'a>(&self, intents: &'a [OrderIntent]) -> &'a [OrderIntent] {
        if self.config.single_position_mode {
            &intents[..intents.len().min(1)]
        } else {
            intents
        }
    }

    /// Submit intents in order.
    ///
    /// Every intent is independent: a failure is recorded and the next
    /// intent is still attempted.
    pub async fn submit_all(
        &self,
        broker: &dyn Broker,
        intents: &[OrderIntent],
    ) -> Vec<SubmissionResult> {
        let eligible = self.eligible(intents);
        if eligible.len() < intents.len() {
            info!(
                selected = intents.len(),
                submitting = eligible.len(),
                "Single-position mode: submitting first intent only"
            );
        }

        let mut results = Vec::with_capacity(eligible.len());
        for intent in eligible {
            let result = match broker.submit_market_order(intent).await {
                Ok(receipt) => {
                    info!(
                        broker = broker.name(),
                        pair = %intent.pair,
                        units = intent.units,
                        order_id = receipt.order_id.as_deref().unwrap_or("-"),
                        "Order placed"
                    );
                    SubmissionResult {
                        pair: intent.pair.clone(),
                        units: intent.units,
                        success: true,
                        receipt: Some(receipt),
                        error: None,
                    }
                }
                Err(e) => {
                    error!(
                        broker = broker.name(),
                        pair = %intent.pair,
                        units = intent.units,
                        error = %e,
                        "Order submission failed"
                    );
                    SubmissionResult {
                        pair: intent.pair.clone(),
                        units: intent.units,
                        success: false,
                        receipt: None,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some orders were not placed");
        }

        results
    }
}
