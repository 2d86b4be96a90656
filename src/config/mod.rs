//! Configuration management for the screener trader.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Oanda API credentials
    #[serde(default)]
    pub oanda: OandaConfig,
    /// Screener sheet location and credentials
    #[serde(default)]
    pub sheet: SheetConfig,
    /// Position sizing tables and thresholds
    #[serde(default)]
    pub allocation: AllocationConfig,
    /// Order submission parameters
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Paper trading account
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OandaConfig {
    /// Personal access token
    #[serde(default)]
    pub api_key: String,
    /// Account the bot trades in
    #[serde(default)]
    pub account_id: String,
    /// Target environment
    #[serde(default)]
    pub environment: OandaEnvironment,
    /// HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Oanda REST environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OandaEnvironment {
    #[default]
    Practice,
    Live,
}

impl OandaEnvironment {
    /// Anything other than "live" maps to the practice environment.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("live") {
            OandaEnvironment::Live
        } else {
            OandaEnvironment::Practice
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet ID from the sheet URL
    #[serde(default)]
    pub spreadsheet_id: String,
    /// Worksheet (tab) holding the screener
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
    /// API key for publicly readable sheets
    #[serde(default)]
    pub api_key: String,
    /// OAuth bearer token for private sheets (takes precedence over the API key)
    #[serde(default)]
    pub access_token: String,
    /// Whether the first row is a header to drop
    #[serde(default = "default_true")]
    pub has_header: bool,
}

/// 0-based positions of the screener columns the parser reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_col_pair")]
    pub pair: usize,
    #[serde(default = "default_col_price")]
    pub price: usize,
    #[serde(default = "default_col_pct_from_ath")]
    pub pct_from_ath: usize,
    #[serde(default = "default_col_long_ma")]
    pub long_ma: usize,
    #[serde(default = "default_col_bullish_marker")]
    pub bullish_marker: usize,
    #[serde(default = "default_col_sentiment")]
    pub sentiment: usize,
    #[serde(default = "default_col_bearish_marker")]
    pub bearish_marker: usize,
}

impl ColumnConfig {
    /// Highest column index any field reads from.
    pub fn max_index(&self) -> usize {
        [
            self.pair,
            self.price,
            self.pct_from_ath,
            self.long_ma,
            self.bullish_marker,
            self.sentiment,
            self.bearish_marker,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// One step of a distance-from-ATH bracket table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketStep {
    /// Inclusive upper bound on the absolute distance below ATH (percent).
    /// `None` marks the open-ended last step.
    #[serde(default)]
    pub upper_bound: Option<Decimal>,
    /// Fraction of buying power allocated in this step (0.0-1.0)
    pub fraction: Decimal,
}

impl BracketStep {
    pub fn bounded(upper_bound: Decimal, fraction: Decimal) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            fraction,
        }
    }

    pub fn open(fraction: Decimal) -> Self {
        Self {
            upper_bound: None,
            fraction,
        }
    }
}

/// Scale factor applied to rows carrying a given mood marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodMultiplier {
    pub marker: String,
    pub scale: Decimal,
}

impl MoodMultiplier {
    pub fn new(marker: &str, scale: Decimal) -> Self {
        Self {
            marker: marker.to_string(),
            scale,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Screener column layout
    #[serde(default)]
    pub columns: ColumnConfig,
    /// Sentiment cell value that enables the bullish path
    #[serde(default = "default_bullish_go_token")]
    pub bullish_go_token: String,
    /// Sentiment cell value that enables the bearish path
    #[serde(default = "default_bearish_go_token")]
    pub bearish_go_token: String,
    /// Bullish brackets (farther below ATH = larger allocation)
    #[serde(default = "default_bullish_brackets")]
    pub bullish_brackets: Vec<BracketStep>,
    /// Bearish brackets (closer to ATH = larger allocation)
    #[serde(default = "default_bearish_brackets")]
    pub bearish_brackets: Vec<BracketStep>,
    /// Bullish mood marker scales
    #[serde(default = "default_bullish_multipliers")]
    pub bullish_multipliers: Vec<MoodMultiplier>,
    /// Bearish mood marker scales
    #[serde(default = "default_bearish_multipliers")]
    pub bearish_multipliers: Vec<MoodMultiplier>,
    /// Minimum notional for a candidate, in account currency
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    /// Decimal places notionals are rounded to
    #[serde(default = "default_notional_decimals")]
    pub notional_decimals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Oanda time-in-force for market orders
    #[serde(default = "default_time_in_force")]
    pub time_in_force: String,
    /// Oanda position fill mode
    #[serde(default = "default_position_fill")]
    pub position_fill: String,
    /// Hold at most one position: skip the run while anything is held and
    /// submit only the first intent otherwise
    #[serde(default)]
    pub single_position_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Starting buying power for paper trading
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Decimal,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_worksheet() -> String {
    "Oanda-Screener".to_string()
}

fn default_col_pair() -> usize {
    0 // A
}

fn default_col_price() -> usize {
    1 // B
}

fn default_col_pct_from_ath() -> usize {
    2 // C
}

fn default_col_long_ma() -> usize {
    10 // K
}

fn default_col_bullish_marker() -> usize {
    18 // S
}

fn default_col_sentiment() -> usize {
    20 // U
}

fn default_col_bearish_marker() -> usize {
    22 // W
}

fn default_bullish_go_token() -> String {
    "🟢".to_string()
}

fn default_bearish_go_token() -> String {
    "🔴".to_string()
}

fn default_bullish_brackets() -> Vec<BracketStep> {
    vec![
        BracketStep::bounded(Decimal::new(6, 0), Decimal::new(5, 2)), // 0-6% down -> 5%
        BracketStep::bounded(Decimal::new(12, 0), Decimal::new(10, 2)), // 6-12% -> 10%
        BracketStep::bounded(Decimal::new(18, 0), Decimal::new(15, 2)), // 12-18% -> 15%
        BracketStep::open(Decimal::new(20, 2)),                        // 18%+ -> 20%
    ]
}

fn default_bearish_brackets() -> Vec<BracketStep> {
    vec![
        BracketStep::bounded(Decimal::new(6, 0), Decimal::new(20, 2)),
        BracketStep::bounded(Decimal::new(12, 0), Decimal::new(15, 2)),
        BracketStep::bounded(Decimal::new(18, 0), Decimal::new(10, 2)),
        BracketStep::open(Decimal::new(5, 2)),
    ]
}

fn default_bullish_multipliers() -> Vec<MoodMultiplier> {
    vec![
        MoodMultiplier::new("💎", Decimal::new(20, 1)),
        MoodMultiplier::new("💥", Decimal::ONE),
        MoodMultiplier::new("🚀", Decimal::new(20, 1)),
        MoodMultiplier::new("✨", Decimal::ONE),
        MoodMultiplier::new("📊", Decimal::new(20, 1)),
    ]
}

fn default_bearish_multipliers() -> Vec<MoodMultiplier> {
    vec![
        MoodMultiplier::new("💀", Decimal::new(25, 1)),
        MoodMultiplier::new("📉", Decimal::new(20, 1)),
        MoodMultiplier::new("🔻", Decimal::new(20, 1)),
        MoodMultiplier::new("⚠️", Decimal::ONE),
    ]
}

fn default_min_notional() -> Decimal {
    Decimal::ONE
}

fn default_notional_decimals() -> u32 {
    2
}

fn default_time_in_force() -> String {
    "FOK".to_string()
}

fn default_position_fill() -> String {
    "DEFAULT".to_string()
}

fn default_starting_balance() -> Decimal {
    Decimal::new(10_000, 0)
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .prefix("SCREENER"),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply the conventional unprefixed variables on top of loaded values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OANDA_API_KEY") {
            self.oanda.api_key = v;
        }
        if let Some(v) = get("OANDA_ACCOUNT_ID") {
            self.oanda.account_id = v;
        }
        if let Some(v) = get("OANDA_ENV") {
            self.oanda.environment = OandaEnvironment::from_env_value(&v);
        }
        if let Some(v) = get("GOOGLE_SHEET_ID") {
            self.sheet.spreadsheet_id = v;
        }
        if let Some(v) = get("GOOGLE_WORKSHEET_NAME") {
            self.sheet.worksheet = v;
        }
        if let Some(v) = get("GOOGLE_API_KEY") {
            self.sheet.api_key = v;
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.sheet.access_token = v;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let alloc = &self.allocation;

        validate_brackets("bullish_brackets", &alloc.bullish_brackets)?;
        validate_brackets("bearish_brackets", &alloc.bearish_brackets)?;
        validate_multipliers("bullish_multipliers", &alloc.bullish_multipliers)?;
        validate_multipliers("bearish_multipliers", &alloc.bearish_multipliers)?;

        anyhow::ensure!(
            !alloc.bullish_go_token.trim().is_empty() && !alloc.bearish_go_token.trim().is_empty(),
            "go tokens must not be empty"
        );
        anyhow::ensure!(
            alloc.bullish_go_token.trim() != alloc.bearish_go_token.trim(),
            "bullish and bearish go tokens must differ"
        );
        anyhow::ensure!(
            alloc.min_notional > Decimal::ZERO,
            "min_notional must be positive"
        );
        anyhow::ensure!(
            self.paper.starting_balance > Decimal::ZERO,
            "paper starting_balance must be positive"
        );
        anyhow::ensure!(
            self.oanda.request_timeout_secs > 0,
            "request_timeout_secs must be positive"
        );

        Ok(())
    }
}

fn validate_brackets(name: &str, steps: &[BracketStep]) -> Result<()> {
    anyhow::ensure!(!steps.is_empty(), "{} must have at least one step", name);

    let (last, bounded) = steps.split_last().context("empty bracket table")?;
    anyhow::ensure!(
        last.upper_bound.is_none(),
        "{}: last step must be open-ended",
        name
    );

    let mut previous: Option<Decimal> = None;
    for step in bounded {
        let bound = step
            .upper_bound
            .with_context(|| format!("{}: only the last step may be open-ended", name))?;
        anyhow::ensure!(
            bound >= Decimal::ZERO,
            "{}: bounds must be non-negative",
            name
        );
        if let Some(prev) = previous {
            anyhow::ensure!(bound > prev, "{}: bounds must be strictly increasing", name);
        }
        previous = Some(bound);
    }

    for step in steps {
        anyhow::ensure!(
            step.fraction > Decimal::ZERO && step.fraction <= Decimal::ONE,
            "{}: fractions must be between 0 and 1",
            name
        );
    }

    Ok(())
}

fn validate_multipliers(name: &str, entries: &[MoodMultiplier]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        anyhow::ensure!(
            !entry.marker.trim().is_empty(),
            "{}: markers must not be empty",
            name
        );
        anyhow::ensure!(
            entry.scale > Decimal::ZERO,
            "{}: scale for {} must be positive",
            name,
            entry.marker
        );
        anyhow::ensure!(
            seen.insert(entry.marker.trim()),
            "{}: duplicate marker {}",
            name,
            entry.marker
        );
    }
    Ok(())
}

impl Default for OandaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            account_id: String::new(),
            environment: OandaEnvironment::Practice,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            worksheet: default_worksheet(),
            api_key: String::new(),
            access_token: String::new(),
            has_header: true,
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            pair: default_col_pair(),
            price: default_col_price(),
            pct_from_ath: default_col_pct_from_ath(),
            long_ma: default_col_long_ma(),
            bullish_marker: default_col_bullish_marker(),
            sentiment: default_col_sentiment(),
            bearish_marker: default_col_bearish_marker(),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            columns: ColumnConfig::default(),
            bullish_go_token: default_bullish_go_token(),
            bearish_go_token: default_bearish_go_token(),
            bullish_brackets: default_bullish_brackets(),
            bearish_brackets: default_bearish_brackets(),
            bullish_multipliers: default_bullish_multipliers(),
            bearish_multipliers: default_bearish_multipliers(),
            min_notional: default_min_notional(),
            notional_decimals: default_notional_decimals(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            time_in_force: default_time_in_force(),
            position_fill: default_position_fill(),
            single_position_mode: false,
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
        }
    }
}
