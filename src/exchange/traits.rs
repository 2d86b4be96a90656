//! Broker-agnostic trading interface.
//!
//! The selection engine never talks to a broker directly: account state is
//! fetched before a run and intents are submitted after it, each through
//! this trait.

use crate::exchange::types::OrderReceipt;
use crate::strategy::{AccountState, OrderIntent};
use async_trait::async_trait;

/// A venue that can report account state and take market orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broker: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Buying power and currently held instruments.
    async fn account_state(&self) -> anyhow::Result<AccountState>;

    /// Submit one intent as a market order.
    ///
    /// A failure here concerns this intent only.
    async fn submit_market_order(&self, intent: &OrderIntent) -> anyhow::Result<OrderReceipt>;
}
