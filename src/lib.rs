//! # Screener Trader
//!
//! Reads a market screener worksheet, sizes directional positions with a
//! bracket table scaled by mood markers and trend, and places market orders
//! on Oanda for the pairs that pass every acceptance rule.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `sheets`: Screener row sources (Google Sheets, CSV)
//! - `strategy`: Row parsing, allocation sizing, filtering and submission
//! - `exchange`: Oanda REST client and paper broker
//! - `utils`: Shared utilities and decimal arithmetic

pub mod config;
pub mod exchange;
pub mod sheets;
pub mod strategy;
pub mod utils;

pub use config::Config;
