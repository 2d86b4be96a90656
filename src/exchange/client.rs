//! Oanda v20 REST API client.

use crate::config::{ExecutionConfig, OandaConfig, OandaEnvironment};
use crate::exchange::traits::Broker;
use crate::exchange::types::*;
use crate::strategy::{AccountState, OrderIntent};
use crate::utils::decimal::parse_decimal;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument};

const PRACTICE_BASE_URL: &str = "https://api-fxpractice.oanda.com";
const LIVE_BASE_URL: &str = "https://api-fxtrade.oanda.com";

/// Oanda API client for one account.
pub struct OandaClient {
    http: Client,
    api_key: String,
    account_id: String,
    base_url: String,
    time_in_force: String,
    position_fill: String,
}

impl OandaClient {
    /// Create a new Oanda client from configuration.
    pub fn new(config: &OandaConfig, execution: &ExecutionConfig) -> Result<Self> {
        let base_url = match config.environment {
            OandaEnvironment::Live => LIVE_BASE_URL,
            OandaEnvironment::Practice => PRACTICE_BASE_URL,
        };
        Self::with_base_url(config, execution, base_url)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        config: &OandaConfig,
        execution: &ExecutionConfig,
        base_url: &str,
    ) -> Result<Self> {
        anyhow::ensure!(
            !config.api_key.is_empty() && !config.account_id.is_empty(),
            "OANDA_API_KEY and OANDA_ACCOUNT_ID must be set"
        );

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            account_id: config.account_id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            time_in_force: execution.time_in_force.clone(),
            position_fill: execution.position_fill.clone(),
        })
    }

    fn account_url(&self, path: &str) -> String {
        format!("{}/v3/accounts/{}{}", self.base_url, self.account_id, path)
    }

    /// Send an authenticated request and decode the JSON body.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .filter(|e| !e.error_message.is_empty())
                .map(|e| e.to_string())
                .unwrap_or(body);
            anyhow::bail!("Oanda API error {} on {}: {}", status, what, message);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Get the account summary.
    #[instrument(skip(self))]
    pub async fn get_account_summary(&self) -> Result<AccountSummary> {
        let request = self.http.get(self.account_url("/summary"));
        let response: AccountSummaryResponse = self.send(request, "account summary").await?;
        Ok(response.account)
    }

    /// Get all open positions.
    #[instrument(skip(self))]
    pub async fn get_open_positions(&self) -> Result<Vec<Position>> {
        let request = self.http.get(self.account_url("/openPositions"));
        let response: OpenPositionsResponse = self.send(request, "open positions").await?;
        Ok(response.positions)
    }

    /// Place a market order. Positive units buy, negative units sell.
    #[instrument(skip(self))]
    pub async fn create_market_order(
        &self,
        instrument: &str,
        units: i64,
    ) -> Result<OrderCreateResponse> {
        anyhow::ensure!(units != 0, "Units must be non-zero for a market order");

        let body = MarketOrderRequest {
            order: MarketOrder::new(instrument, units, &self.time_in_force, &self.position_fill),
        };
        debug!("Placing market order: {:?}", body.order);

        let request = self.http.post(self.account_url("/orders")).json(&body);
        self.send(request, "order").await
    }
}

#[async_trait]
impl Broker for OandaClient {
    fn name(&self) -> &'static str {
        "oanda"
    }

    async fn account_state(&self) -> Result<AccountState> {
        let (summary, positions) =
            tokio::try_join!(self.get_account_summary(), self.get_open_positions())?;

        let (source, buying_power) = summary
            .buying_power()
            .context("Could not determine buying power from account summary")?;
        info!(source, %buying_power, "Using buying power");

        let held = positions
            .into_iter()
            .filter(|p| p.is_open())
            .map(|p| p.instrument);

        Ok(AccountState::new(buying_power).with_held(held))
    }

    async fn submit_market_order(&self, intent: &OrderIntent) -> Result<OrderReceipt> {
        info!(
            pair = %intent.pair,
            units = intent.units,
            side = %intent.side,
            notional = %intent.notional,
            price = %intent.price,
            "Submitting market order"
        );

        let response = self.create_market_order(&intent.pair, intent.units).await?;

        if let Some(cancel) = &response.order_cancel_transaction {
            anyhow::bail!(
                "Order for {} cancelled (transaction {}): {}",
                intent.pair,
                cancel.id,
                cancel.reason
            );
        }

        let fill = response.order_fill_transaction.as_ref();
        Ok(OrderReceipt {
            pair: intent.pair.clone(),
            units: intent.units,
            order_id: response.order_create_transaction.map(|t| t.id),
            fill_id: fill.map(|f| f.id.clone()),
            fill_price: fill
                .and_then(|f| f.price.as_deref())
                .and_then(parse_decimal),
        })
    }
}
