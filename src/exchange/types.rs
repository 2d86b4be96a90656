//! Type definitions for Oanda v20 API requests and responses.

use crate::utils::decimal::parse_decimal;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response from `GET /v3/accounts/{id}/summary`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSummaryResponse {
    pub account: AccountSummary,
}

/// Account summary fields used for sizing. Oanda sends numbers as strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    #[serde(default)]
    pub margin_available: Option<String>,
    #[serde(rename = "NAV", default)]
    pub nav: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
}

impl AccountSummary {
    /// Buying power and the field it came from.
    ///
    /// Prefers `marginAvailable`, then `NAV`, then `balance`, skipping
    /// fields that are missing or unparseable.
    pub fn buying_power(&self) -> Option<(&'static str, Decimal)> {
        [
            ("marginAvailable", &self.margin_available),
            ("NAV", &self.nav),
            ("balance", &self.balance),
        ]
        .into_iter()
        .find_map(|(name, value)| {
            value
                .as_deref()
                .and_then(|v| parse_decimal(v.trim()))
                .map(|bp| (name, bp))
        })
    }
}

/// Response from `GET /v3/accounts/{id}/openPositions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenPositionsResponse {
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// Open position on one instrument.
#[derive(Debug, Clone, Deserialize)]
pub struct Position {
    pub instrument: String,
    #[serde(default)]
    pub long: PositionSide,
    #[serde(default)]
    pub short: PositionSide,
}

impl Position {
    /// Whether either side carries non-zero units.
    pub fn is_open(&self) -> bool {
        self.long.is_open() || self.short.is_open()
    }
}

/// One side of a position.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionSide {
    #[serde(default)]
    pub units: String,
}

impl PositionSide {
    /// Unparseable unit strings count as flat.
    pub fn is_open(&self) -> bool {
        parse_decimal(self.units.trim())
            .map(|u| u != Decimal::ZERO)
            .unwrap_or(false)
    }
}

/// Body of `POST /v3/accounts/{id}/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct MarketOrderRequest {
    pub order: MarketOrder,
}

/// Market order specification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    pub instrument: String,
    /// Signed units as a string: positive buys, negative sells
    pub units: String,
    pub time_in_force: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub position_fill: String,
}

impl MarketOrder {
    pub fn new(instrument: &str, units: i64, time_in_force: &str, position_fill: &str) -> Self {
        Self {
            instrument: instrument.to_string(),
            units: units.to_string(),
            time_in_force: time_in_force.to_string(),
            order_type: "MARKET".to_string(),
            position_fill: position_fill.to_string(),
        }
    }
}

/// Response to an order creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateResponse {
    #[serde(default)]
    pub order_create_transaction: Option<Transaction>,
    #[serde(default)]
    pub order_fill_transaction: Option<FillTransaction>,
    #[serde(default)]
    pub order_cancel_transaction: Option<CancelTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FillTransaction {
    pub id: String,
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelTransaction {
    pub id: String,
    #[serde(default)]
    pub reason: String,
}

/// Error body returned with 4xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({})", self.error_message, code),
            None => write!(f, "{}", self.error_message),
        }
    }
}

/// Broker-agnostic record of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReceipt {
    pub pair: String,
    pub units: i64,
    pub order_id: Option<String>,
    pub fill_id: Option<String>,
    pub fill_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buying_power_prefers_margin_available() {
        let summary: AccountSummaryResponse = serde_json::from_str(
            r#"{"account": {"marginAvailable": "2500.1234", "NAV": "3000", "balance": "2900"}}"#,
        )
        .unwrap();
        assert_eq!(
            summary.account.buying_power(),
            Some(("marginAvailable", dec!(2500.1234)))
        );
    }

    #[test]
    fn test_buying_power_falls_back() {
        let summary = AccountSummary {
            margin_available: Some("n/a".to_string()),
            balance: Some("1200.50".to_string()),
            ..Default::default()
        };
        assert_eq!(summary.buying_power(), Some(("balance", dec!(1200.50))));
        assert_eq!(AccountSummary::default().buying_power(), None);
    }

    #[test]
    fn test_error_response_display() {
        let err: ErrorResponse = serde_json::from_str(
            r#"{"errorMessage": "Insufficient authorization", "errorCode": "INSUFFICIENT_AUTHORIZATION"}"#,
        )
        .unwrap();
        assert_eq!(
            err.to_string(),
            "Insufficient authorization (INSUFFICIENT_AUTHORIZATION)"
        );

        let bare = ErrorResponse {
            error_message: "Bad request".to_string(),
            error_code: None,
        };
        assert_eq!(bare.to_string(), "Bad request");
    }

    #[test]
    fn test_position_open_detection() {
        let positions: OpenPositionsResponse = serde_json::from_str(
            r#"{"positions": [
                {"instrument": "EUR_USD", "long": {"units": "100"}, "short": {"units": "0"}},
                {"instrument": "USD_JPY", "long": {"units": "0"}, "short": {"units": "-250"}},
                {"instrument": "GBP_USD", "long": {"units": "0"}, "short": {"units": "0"}}
            ]}"#,
        )
        .unwrap();

        let open: Vec<&str> = positions
            .positions
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.instrument.as_str())
            .collect();
        assert_eq!(open, vec!["EUR_USD", "USD_JPY"]);
    }

    #[test]
    fn test_market_order_serialization() {
        let body = MarketOrderRequest {
            order: MarketOrder::new("EUR_USD", -40, "FOK", "DEFAULT"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["order"]["units"], "-40");
        assert_eq!(json["order"]["type"], "MARKET");
        assert_eq!(json["order"]["timeInForce"], "FOK");
        assert_eq!(json["order"]["positionFill"], "DEFAULT");
    }
}
