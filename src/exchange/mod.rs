//! Broker integrations.
//!
//! ## Oanda
//! REST v20 client for:
//! - Account summary (buying power)
//! - Open positions (held instruments)
//! - Market order submission
//!
//! ## Paper
//! In-memory broker for dry runs without an Oanda account.

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::OandaClient;
pub use mock::PaperBroker;
pub use traits::Broker;
#[cfg(test)]
pub use traits::MockBroker;
pub use types::*;
