//! Configuration loading and validation
//!
//! Settings come from an optional file plus the process environment (env
//! wins), merged by the `config` crate. Every recognized key is then parsed
//! with a fixed type and default. Unparseable or inconsistent values are
//! collected into a single [`ConfigReport`] instead of being coerced.

use chrono::NaiveTime;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// Re-export filter criteria (built from the filter keys below)
pub use crate::filter::types::{FilterCriteria, SignalRange};

/// A single configuration problem
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?} as {expected}")]
    Parse {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{key}: {value} is outside [{min}, {max}]")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{key}: {value:?} is not a HH:MM time")]
    InvalidTime { key: String, value: String },

    #[error("{key}: invalid wallet address {value:?}")]
    InvalidWallet { key: String, value: String },

    #[error("{0}")]
    Inconsistent(String),

    #[error("configuration source: {0}")]
    Source(String),
}

/// Every configuration problem found at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigReport(pub Vec<ConfigError>);

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigReport {}

impl From<ConfigError> for ConfigReport {
    fn from(e: ConfigError) -> Self {
        ConfigReport(vec![e])
    }
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub trading: TradingConfig,
    pub stream: StreamConfig,
    pub jito: JitoConfig,
    pub zero_slot: RelayConfig,
    pub nozomi: RelayConfig,
    pub blox_route: BloxRouteConfig,
    pub filters: FilterCriteria,
    /// Mints and creator wallets never bought
    pub blacklist: Vec<Pubkey>,
    pub copy_trading: CopyTradingConfig,
    pub exit: ExitConfig,
    pub inverse_buy: InverseBuyConfig,
    pub timer: TimerConfig,
    pub mode: ModeConfig,
    pub advanced: AdvancedConfig,
    pub telegram: TelegramConfig,
}

/// Core sizing, fee and submission settings
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    /// Minimum SOL invested in a token (lamports) before it is eligible for a buy
    pub threshold_buy: u64,
    /// SOL invested in a held token (lamports) at which the position is fully exited
    pub threshold_sell: u64,
    /// Submission deadline for normal intents
    pub max_wait_time_ms: u64,
    /// SOL spent per normal buy
    pub token_amount_sol: f64,
    /// Priority fee in lamports per compute unit
    pub unit_price: f64,
    pub unit_limit: u32,
    pub slippage_bps: u32,
    /// Attempts for direct RPC submission
    pub counter: u32,
    pub rpc_http: String,
    /// In-flight submissions allowed per venue
    pub venue_max_inflight: usize,
}

impl TradingConfig {
    /// Compute-budget price in micro-lamports per compute unit
    pub fn unit_price_micro_lamports(&self) -> u64 {
        (self.unit_price * 1_000_000.0).round().max(0.0) as u64
    }
}

/// Event ingestion settings (the gRPC client itself is external)
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub yellowstone_grpc_http: String,
    pub yellowstone_grpc_token: String,
    pub ping_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_retries: u32,
    pub queue_capacity: usize,
    pub worker_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JitoConfig {
    pub use_jito: bool,
    pub block_engine_url: String,
    /// Priority fee in micro-lamports per compute unit for Jito submissions
    pub priority_fee: u64,
    pub tip_value: u64,
    /// Submit as a bundle (`sendBundle`) instead of `sendTransaction`
    pub bundle: bool,
}

/// Relay with a plain JSON-RPC endpoint (ZeroSlot, Nozomi)
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub url: String,
    pub tip_value: u64,
    pub tip_account: Option<Pubkey>,
}

impl RelayConfig {
    pub fn enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloxRouteConfig {
    pub network: String,
    pub region: String,
    pub auth_header: String,
    pub tip_value: u64,
    pub tip_account: Option<Pubkey>,
}

impl BloxRouteConfig {
    pub fn enabled(&self) -> bool {
        !self.auth_header.is_empty()
    }

    /// Submit endpoint for the configured network and region
    pub fn endpoint(&self) -> String {
        if self.network.eq_ignore_ascii_case("mainnet") {
            format!("https://{}.solana.dex.blxrbdn.com/api/v2/submit", self.region)
        } else {
            "https://solana.dex.bxrtest.com/api/v2/submit".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyTradingConfig {
    pub enabled: bool,
    /// Percent of the target's trade to mirror
    pub buy_sell_percent: f64,
    pub target_wallets: Vec<Pubkey>,
    pub multi_target_mode: bool,
    pub mc_threshold_to_buy: f64,
    pub mc_threshold_to_follow: f64,
}

/// Exit strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStrategy {
    /// Timed partial exits (PL_STAGE_n)
    Staged,
    /// Single full exit on take-profit / stop-loss breach
    TakeProfitStopLoss,
}

impl FromStr for ExitStrategy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staged" | "private_logic" => Ok(ExitStrategy::Staged),
            "take_profit_stop_loss" | "tp_sl" => Ok(ExitStrategy::TakeProfitStopLoss),
            _ => Err(()),
        }
    }
}

/// One configured exit stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageConfig {
    /// Percent of the remaining position to sell
    pub percent: f64,
    /// Delay since entry
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitConfig {
    pub strategy: ExitStrategy,
    pub private_logic_enabled: bool,
    pub stages: Vec<StageConfig>,
    pub take_profit_enabled: bool,
    pub take_profit_pct: f64,
    pub stop_loss_enabled: bool,
    pub stop_loss_pct: f64,
    /// Drop from peak that fires the next stage immediately
    pub downing_percent: f64,
    pub sell_all_tokens: bool,
    pub retry_interval_ms: u64,
    /// Failed-sell window before escalation
    pub time_exceed_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InverseBuyConfig {
    pub enabled: bool,
    pub amount_sol: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerConfig {
    pub enabled: bool,
    pub start_time: NaiveTime,
    pub stop_time: NaiveTime,
    pub auto_sell_on_stop: bool,
}

/// How intents are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Live,
    Simulation,
    Paper,
}

impl TradingMode {
    pub fn is_simulated(&self) -> bool {
        !matches!(self, TradingMode::Live)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Simulation => write!(f, "simulation"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeConfig {
    pub simulation_mode: bool,
    pub live_mode: bool,
    pub paper_trading: bool,
}

impl ModeConfig {
    /// Resolve the effective mode; any simulated flag wins over LIVE_MODE
    pub fn trading_mode(&self) -> TradingMode {
        if self.simulation_mode {
            TradingMode::Simulation
        } else if self.paper_trading {
            TradingMode::Paper
        } else if self.live_mode {
            TradingMode::Live
        } else {
            TradingMode::Simulation
        }
    }

    /// True when LIVE_MODE was requested but a simulated flag overrides it
    pub fn is_conflicting(&self) -> bool {
        self.live_mode && (self.simulation_mode || self.paper_trading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedConfig {
    /// Deadline for limit-mode intents; also the "young token" window
    pub limit_wait_time_ms: u64,
    /// Buy size cap while a token is younger than `limit_wait_time_ms`
    pub limit_buy_amount_sol: f64,
    pub review_cycle_ms: u64,
    /// Market updates older than this are ignored
    pub time_delta_threshold_secs: u64,
    pub price_delta_threshold_pct: f64,
    pub min_buy_confidence: f64,
    pub min_sell_confidence: f64,
    pub daily_buy_budget_sol: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn enabled(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".into()
}

fn default_jito_url() -> String {
    "https://ny.mainnet.block-engine.jito.wtf".into()
}

fn default_time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn default_stages() -> Vec<StageConfig> {
    (1..=7u64)
        .map(|n| StageConfig {
            percent: n as f64 * 10.0,
            delay_ms: n * 1000,
        })
        .collect()
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            threshold_buy: 3_000_000_000,
            threshold_sell: 10_000_000_000,
            max_wait_time_ms: 650,
            token_amount_sol: 1.0,
            unit_price: 0.001,
            unit_limit: 200_000,
            slippage_bps: 100,
            counter: 10,
            rpc_http: default_rpc_endpoint(),
            venue_max_inflight: 16,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            yellowstone_grpc_http: String::new(),
            yellowstone_grpc_token: String::new(),
            ping_interval_secs: 30,
            reconnect_delay_secs: 5,
            max_retries: 10,
            queue_capacity: 10_000,
            worker_count: 4,
        }
    }
}

impl Default for JitoConfig {
    fn default() -> Self {
        Self {
            use_jito: false,
            block_engine_url: default_jito_url(),
            priority_fee: 1000,
            tip_value: 1000,
            bundle: true,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            tip_value: 1000,
            tip_account: None,
        }
    }
}

impl Default for BloxRouteConfig {
    fn default() -> Self {
        Self {
            network: "mainnet".to_string(),
            region: "ny".to_string(),
            auth_header: String::new(),
            tip_value: 1000,
            tip_account: None,
        }
    }
}

impl Default for CopyTradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buy_sell_percent: 100.0,
            target_wallets: Vec::new(),
            multi_target_mode: false,
            mc_threshold_to_buy: 1_000_000.0,
            mc_threshold_to_follow: 500_000.0,
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            strategy: ExitStrategy::TakeProfitStopLoss,
            private_logic_enabled: false,
            stages: default_stages(),
            take_profit_enabled: true,
            take_profit_pct: 50.0,
            stop_loss_enabled: true,
            stop_loss_pct: 30.0,
            downing_percent: 50.0,
            sell_all_tokens: false,
            retry_interval_ms: 1000,
            time_exceed_secs: 30,
        }
    }
}

impl Default for InverseBuyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amount_sol: 0.1,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: default_time(0, 0),
            stop_time: default_time(23, 59),
            auto_sell_on_stop: false,
        }
    }
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            simulation_mode: false,
            live_mode: true,
            paper_trading: false,
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            limit_wait_time_ms: 30_000,
            limit_buy_amount_sol: 0.5,
            review_cycle_ms: 120_000,
            time_delta_threshold_secs: 300,
            price_delta_threshold_pct: 5.0,
            min_buy_confidence: 0.7,
            min_sell_confidence: 0.6,
            daily_buy_budget_sol: 10.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            stream: StreamConfig::default(),
            jito: JitoConfig::default(),
            zero_slot: RelayConfig::default(),
            nozomi: RelayConfig::default(),
            blox_route: BloxRouteConfig::default(),
            filters: FilterCriteria::default(),
            blacklist: Vec::new(),
            copy_trading: CopyTradingConfig::default(),
            exit: ExitConfig::default(),
            inverse_buy: InverseBuyConfig::default(),
            timer: TimerConfig::default(),
            mode: ModeConfig::default(),
            advanced: AdvancedConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

/// Raw merged settings (file + environment), looked up by flat key
pub struct Settings {
    inner: config::Config,
}

impl Settings {
    /// Merge an optional settings file with the process environment
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let inner = builder
            .add_source(config::Environment::default())
            .build()
            .map_err(|e| ConfigError::Source(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Build settings from explicit key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder
                .set_override(key.as_ref().to_ascii_lowercase(), value.into())
                .map_err(|e| ConfigError::Source(e.to_string()))?;
        }
        let inner = builder
            .build()
            .map_err(|e| ConfigError::Source(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Raw value for a key; arrays are joined with commas, blank counts as unset
    fn raw(&self, key: &str) -> Option<String> {
        let key = key.to_ascii_lowercase();
        let value = match self.inner.get_string(&key) {
            Ok(s) => s,
            Err(_) => self
                .inner
                .get_array(&key)
                .ok()?
                .into_iter()
                .filter_map(|v| v.into_string().ok())
                .collect::<Vec<_>>()
                .join(","),
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Typed key reader that records every problem instead of stopping at the first
struct Loader<'a> {
    settings: &'a Settings,
    errors: Vec<ConfigError>,
}

impl<'a> Loader<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            errors: Vec::new(),
        }
    }

    fn string(&mut self, key: &str, default: &str) -> String {
        self.settings.raw(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&mut self, key: &str, default: T, expected: &'static str) -> T {
        match self.settings.raw(key) {
            None => default,
            Some(value) => match value.parse::<T>() {
                Ok(v) => v,
                Err(_) => {
                    self.errors.push(ConfigError::Parse {
                        key: key.to_string(),
                        value,
                        expected,
                    });
                    default
                }
            },
        }
    }

    fn u64(&mut self, key: &str, default: u64) -> u64 {
        self.parse(key, default, "unsigned integer")
    }

    fn u32(&mut self, key: &str, default: u32) -> u32 {
        self.parse(key, default, "unsigned integer")
    }

    fn usize(&mut self, key: &str, default: usize) -> usize {
        self.parse(key, default, "unsigned integer")
    }

    fn f64(&mut self, key: &str, default: f64) -> f64 {
        let value = self.parse(key, default, "number");
        if value.is_nan() {
            self.errors.push(ConfigError::Parse {
                key: key.to_string(),
                value: "NaN".to_string(),
                expected: "number",
            });
            return default;
        }
        value
    }

    fn bounded(&mut self, key: &str, default: f64, min: f64, max: f64) -> f64 {
        let value = self.f64(key, default);
        if value < min || value > max {
            self.errors.push(ConfigError::OutOfRange {
                key: key.to_string(),
                value,
                min,
                max,
            });
            return default;
        }
        value
    }

    fn percent(&mut self, key: &str, default: f64) -> f64 {
        self.bounded(key, default, 0.0, 100.0)
    }

    fn bool(&mut self, key: &str, default: bool) -> bool {
        match self.settings.raw(key) {
            None => default,
            Some(value) => match parse_bool(&value) {
                Some(b) => b,
                None => {
                    self.errors.push(ConfigError::Parse {
                        key: key.to_string(),
                        value,
                        expected: "boolean",
                    });
                    default
                }
            },
        }
    }

    fn time(&mut self, key: &str, default: NaiveTime) -> NaiveTime {
        match self.settings.raw(key) {
            None => default,
            Some(value) => match parse_time_of_day(&value) {
                Some(t) => t,
                None => {
                    self.errors.push(ConfigError::InvalidTime {
                        key: key.to_string(),
                        value,
                    });
                    default
                }
            },
        }
    }

    fn pubkey(&mut self, key: &str) -> Option<Pubkey> {
        let value = self.settings.raw(key)?;
        match Pubkey::from_str(&value) {
            Ok(pk) => Some(pk),
            Err(_) => {
                self.errors.push(ConfigError::InvalidWallet {
                    key: key.to_string(),
                    value,
                });
                None
            }
        }
    }

    fn pubkey_list(&mut self, key: &str) -> Vec<Pubkey> {
        let Some(value) = self.settings.raw(key) else {
            return Vec::new();
        };
        let mut wallets = Vec::new();
        for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Pubkey::from_str(item) {
                Ok(pk) => wallets.push(pk),
                Err(_) => self.errors.push(ConfigError::InvalidWallet {
                    key: key.to_string(),
                    value: item.to_string(),
                }),
            }
        }
        wallets
    }

    fn range(&mut self, prefix_min: &str, prefix_max: &str, enabled: &str, default: SignalRange) -> SignalRange {
        SignalRange {
            enabled: self.bool(enabled, default.enabled),
            min: self.f64(prefix_min, default.min),
            max: self.f64(prefix_max, default.max),
        }
    }
}

/// Parse a boolean flag ("true"/"false", "1"/"0", "yes"/"no", "on"/"off")
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a strict 24-hour `HH:MM` time of day
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let (h, m) = value.trim().split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let hours: u32 = h.parse().ok()?;
    let minutes: u32 = m.parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

impl Config {
    /// Load configuration from an optional file and environment variables
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigReport> {
        let settings = Settings::load(path)?;
        Self::from_settings(&settings)
    }

    /// Parse and validate every recognized key
    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigReport> {
        let d = Config::default();
        let mut l = Loader::new(settings);

        let trading = TradingConfig {
            threshold_buy: l.u64("THRESHOLD_BUY", d.trading.threshold_buy),
            threshold_sell: l.u64("THRESHOLD_SELL", d.trading.threshold_sell),
            max_wait_time_ms: l.u64("MAX_WAIT_TIME", d.trading.max_wait_time_ms),
            token_amount_sol: l.f64("TOKEN_AMOUNT", d.trading.token_amount_sol),
            unit_price: l.f64("UNIT_PRICE", d.trading.unit_price),
            unit_limit: l.u32("UNIT_LIMIT", d.trading.unit_limit),
            slippage_bps: l.u32("SLIPPAGE", d.trading.slippage_bps),
            counter: l.u32("COUNTER", d.trading.counter),
            rpc_http: l.string("RPC_HTTP", &d.trading.rpc_http),
            venue_max_inflight: l.usize("VENUE_MAX_INFLIGHT", d.trading.venue_max_inflight),
        };

        let stream = StreamConfig {
            yellowstone_grpc_http: l.string("YELLOWSTONE_GRPC_HTTP", ""),
            yellowstone_grpc_token: l.string("YELLOWSTONE_GRPC_TOKEN", ""),
            ping_interval_secs: l.u64("YELLOWSTONE_PING_INTERVAL", d.stream.ping_interval_secs),
            reconnect_delay_secs: l.u64("YELLOWSTONE_RECONNECT_DELAY", d.stream.reconnect_delay_secs),
            max_retries: l.u32("YELLOWSTONE_MAX_RETRIES", d.stream.max_retries),
            queue_capacity: l.usize("INGEST_QUEUE_CAPACITY", d.stream.queue_capacity),
            worker_count: l.usize("WORKER_COUNT", d.stream.worker_count),
        };

        let jito = JitoConfig {
            use_jito: l.bool("USE_JITO", d.jito.use_jito),
            block_engine_url: l.string("JITO_BLOCK_ENGINE_URL", &d.jito.block_engine_url),
            priority_fee: l.u64("JITO_PRIORITY_FEE", d.jito.priority_fee),
            tip_value: l.u64("JITO_TIP_VALUE", d.jito.tip_value),
            bundle: l.bool("BUNDLE_CHECK", d.jito.bundle),
        };

        let zero_slot = RelayConfig {
            url: l.string("ZERO_SLOT_URL", ""),
            tip_value: l.u64("ZERO_SLOT_TIP_VALUE", d.zero_slot.tip_value),
            tip_account: l.pubkey("ZERO_SLOT_TIP_ACCOUNT"),
        };

        let nozomi = RelayConfig {
            url: l.string("NOZOMI_URL", ""),
            tip_value: l.u64("NOZOMI_TIP_VALUE", d.nozomi.tip_value),
            tip_account: l.pubkey("NOZOMI_TIP_ACCOUNT"),
        };

        let blox_route = BloxRouteConfig {
            network: l.string("NETWORK", &d.blox_route.network),
            region: l.string("REGION", &d.blox_route.region),
            auth_header: l.string("AUTH_HEADER", ""),
            tip_value: l.u64("BLOXROUTE_TIP_VALUE", d.blox_route.tip_value),
            tip_account: l.pubkey("BLOXROUTE_TIP_ACCOUNT"),
        };

        let df = &d.filters;
        let filters = FilterCriteria {
            market_cap: l.range("MIN_MARKET_CAP", "MAX_MARKET_CAP", "MARKET_CAP_ENABLED", df.market_cap),
            volume: l.range("MIN_VOLUME", "MAX_VOLUME", "VOLUME_ENABLED", df.volume),
            buy_sell_count: l.range(
                "MIN_NUMBER_OF_BUY_SELL",
                "MAX_NUMBER_OF_BUY_SELL",
                "BUY_SELL_COUNT_ENABLED",
                df.buy_sell_count,
            ),
            sol_invested: l.range("SOL_INVESTED", "SOL_INVESTED_MAX", "SOL_INVESTED_ENABLED", df.sol_invested),
            launcher_balance: l.range(
                "MIN_LAUNCHER_SOL_BALANCE",
                "MAX_LAUNCHER_SOL_BALANCE",
                "LAUNCHER_SOL_ENABLED",
                df.launcher_balance,
            ),
            dev_buy: l.range("MIN_DEV_BUY", "MAX_DEV_BUY", "DEV_BUY_ENABLED", df.dev_buy),
            max_launch_age_ms: l.u64("MIN_LAST_TIME", df.max_launch_age_ms),
        };

        let blacklist = l.pubkey_list("BLACKLIST");

        let copy_trading = CopyTradingConfig {
            enabled: l.bool("COPY_TRADING_ENABLED", d.copy_trading.enabled),
            buy_sell_percent: l.percent("BUY_SELL_PERCENT", d.copy_trading.buy_sell_percent),
            target_wallets: l.pubkey_list("TARGET_WALLETS"),
            multi_target_mode: l.bool("MULTI_TARGET_MODE", d.copy_trading.multi_target_mode),
            mc_threshold_to_buy: l.f64("MC_THRESHOLD_TO_BUY", d.copy_trading.mc_threshold_to_buy),
            mc_threshold_to_follow: l.f64("MC_THRESHOLD_TO_FOLLOW", d.copy_trading.mc_threshold_to_follow),
        };

        let private_logic_enabled = l.bool("PRIVATE_LOGIC_ENABLED", d.exit.private_logic_enabled);
        let stages = d
            .exit
            .stages
            .iter()
            .enumerate()
            .map(|(i, default)| StageConfig {
                percent: l.percent(&format!("PL_STAGE_{}_PERCENT", i + 1), default.percent),
                delay_ms: l.u64(&format!("PL_STAGE_{}_DELAY", i + 1), default.delay_ms),
            })
            .collect();
        let strategy = match settings.raw("EXIT_STRATEGY") {
            None if private_logic_enabled => ExitStrategy::Staged,
            None => ExitStrategy::TakeProfitStopLoss,
            Some(value) => value.parse().unwrap_or_else(|_| {
                l.errors.push(ConfigError::Parse {
                    key: "EXIT_STRATEGY".to_string(),
                    value,
                    expected: "staged | take_profit_stop_loss",
                });
                d.exit.strategy
            }),
        };
        let exit = ExitConfig {
            strategy,
            private_logic_enabled,
            stages,
            take_profit_enabled: l.bool("TAKE_PROFIT", d.exit.take_profit_enabled),
            take_profit_pct: l.bounded("TAKE_PROFIT_PERCENT", d.exit.take_profit_pct, 0.0, f64::INFINITY),
            stop_loss_enabled: l.bool("STOP_LOSS", d.exit.stop_loss_enabled),
            stop_loss_pct: l.percent("STOP_LOSS_PERCENT", d.exit.stop_loss_pct),
            downing_percent: l.percent("DOWNING_PERCENT", d.exit.downing_percent),
            sell_all_tokens: l.bool("SELL_ALL_TOKENS", d.exit.sell_all_tokens),
            retry_interval_ms: l.u64("STAGE_RETRY_INTERVAL", d.exit.retry_interval_ms),
            time_exceed_secs: l.u64("TIME_EXCEED", d.exit.time_exceed_secs),
        };

        let inverse_buy = InverseBuyConfig {
            enabled: l.bool("INVERSE_BUY_ENABLED", d.inverse_buy.enabled),
            amount_sol: l.f64("INVERSE_BUY_AMOUNT", d.inverse_buy.amount_sol),
        };

        let timer = TimerConfig {
            enabled: l.bool("TIMER_ENABLED", d.timer.enabled),
            start_time: l.time("BOT_START_TIME", d.timer.start_time),
            stop_time: l.time("BOT_STOP_TIME", d.timer.stop_time),
            auto_sell_on_stop: l.bool("AUTO_SELL_ON_STOP", d.timer.auto_sell_on_stop),
        };

        let mode = ModeConfig {
            simulation_mode: l.bool("SIMULATION_MODE", d.mode.simulation_mode),
            live_mode: l.bool("LIVE_MODE", d.mode.live_mode),
            paper_trading: l.bool("PAPER_TRADING", d.mode.paper_trading),
        };

        let da = &d.advanced;
        let advanced = AdvancedConfig {
            limit_wait_time_ms: l.u64("LIMIT_WAIT_TIME", da.limit_wait_time_ms),
            limit_buy_amount_sol: l.f64("LIMIT_BUY_AMOUNT_IN_LIMIT_WAIT_TIME", da.limit_buy_amount_sol),
            review_cycle_ms: l.u64("REVIEW_CYCLE_DURATION", da.review_cycle_ms),
            time_delta_threshold_secs: l.u64("TIME_DELTA_THRESHOLD", da.time_delta_threshold_secs),
            price_delta_threshold_pct: l.percent("PRICE_DELTA_THRESHOLD", da.price_delta_threshold_pct),
            min_buy_confidence: l.bounded("MIN_BUY_CONFIDENCE", da.min_buy_confidence, 0.0, 1.0),
            min_sell_confidence: l.bounded("MIN_SELL_CONFIDENCE", da.min_sell_confidence, 0.0, 1.0),
            daily_buy_budget_sol: l.f64("DAILY_BUY_BUDGET", da.daily_buy_budget_sol),
        };

        let telegram = TelegramConfig {
            bot_token: l.string("TELEGRAM_BOT_TOKEN", ""),
            chat_id: l.string("TELEGRAM_CHAT_ID", ""),
        };

        let mut errors = l.errors;
        let config = Config {
            trading,
            stream,
            jito,
            zero_slot,
            nozomi,
            blox_route,
            filters,
            blacklist,
            copy_trading,
            exit,
            inverse_buy,
            timer,
            mode,
            advanced,
            telegram,
        };
        errors.extend(config.validate());

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigReport(errors))
        }
    }

    /// Cross-field validation
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.trading.threshold_buy >= self.trading.threshold_sell {
            errors.push(ConfigError::Inconsistent(format!(
                "THRESHOLD_BUY ({}) must be less than THRESHOLD_SELL ({})",
                self.trading.threshold_buy, self.trading.threshold_sell
            )));
        }

        if self.trading.slippage_bps > 10_000 {
            errors.push(ConfigError::OutOfRange {
                key: "SLIPPAGE".to_string(),
                value: self.trading.slippage_bps as f64,
                min: 0.0,
                max: 10_000.0,
            });
        }

        if self.trading.counter == 0 {
            errors.push(ConfigError::Inconsistent("COUNTER must be at least 1".to_string()));
        }

        if self.trading.token_amount_sol <= 0.0 {
            errors.push(ConfigError::Inconsistent("TOKEN_AMOUNT must be positive".to_string()));
        }

        if self.stream.worker_count == 0 || self.stream.queue_capacity == 0 {
            errors.push(ConfigError::Inconsistent(
                "WORKER_COUNT and INGEST_QUEUE_CAPACITY must be positive".to_string(),
            ));
        }

        if self.trading.venue_max_inflight == 0 {
            errors.push(ConfigError::Inconsistent("VENUE_MAX_INFLIGHT must be positive".to_string()));
        }

        for (name, range) in self.filters.named_ranges() {
            if range.min.is_finite() && range.max.is_finite() && range.min > range.max {
                errors.push(ConfigError::Inconsistent(format!(
                    "{} range: min ({}) cannot be greater than max ({})",
                    name, range.min, range.max
                )));
            }
        }

        if self.advanced.daily_buy_budget_sol < 0.0 {
            errors.push(ConfigError::Inconsistent("DAILY_BUY_BUDGET cannot be negative".to_string()));
        }

        if self.inverse_buy.enabled && self.inverse_buy.amount_sol <= 0.0 {
            errors.push(ConfigError::Inconsistent(
                "INVERSE_BUY_AMOUNT must be positive when inverse buy is enabled".to_string(),
            ));
        }

        if self.copy_trading.enabled && self.copy_trading.target_wallets.is_empty() {
            errors.push(ConfigError::Inconsistent(
                "COPY_TRADING_ENABLED requires at least one TARGET_WALLETS entry".to_string(),
            ));
        }

        if self.exit.strategy == ExitStrategy::Staged
            && self.exit.stages.iter().all(|s| s.percent <= 0.0)
        {
            errors.push(ConfigError::Inconsistent(
                "staged exit strategy needs at least one PL_STAGE_n_PERCENT above zero".to_string(),
            ));
        }

        errors
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let venues = [
            ("jito", self.jito.use_jito),
            ("zeroslot", self.zero_slot.enabled()),
            ("nozomi", self.nozomi.enabled()),
            ("bloxroute", self.blox_route.enabled()),
        ]
        .iter()
        .filter(|(_, on)| *on)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>();

        format!(
            r#"Configuration:
  Mode: {}
  RPC:
    endpoint: {}
  Venues: {}
    jito: {} (tip {} lamports, bundle {})
    zeroslot: {} (tip {} lamports)
    nozomi: {} (tip {} lamports)
    bloxroute: {} {} auth {} (tip {} lamports)
  Trading:
    buy amount: {} SOL
    thresholds: buy {} / sell {} lamports
    slippage: {}bps, counter {}
    priority: {} micro-lamports/CU, limit {} CU
    max wait: {}ms, limit wait: {}ms
  Filters:
    market cap: {}
    volume: {}
    buy/sell count: {}
    SOL invested: {}
    launcher balance: {}
    dev buy: {}
    max launch age: {}ms
  Exit:
    strategy: {:?}
    take profit: {} ({}%), stop loss: {} ({}%)
    downing: {}%, sell all: {}
  Blacklist: {} entries
  Copy trading: {} ({} targets, multi {})
  Inverse buy: {} ({} SOL)
  Timer: {} ({} - {}, auto-sell {})
  Budget: {} SOL/day, confidence buy {} / sell {}
  Telegram: {}
"#,
            self.mode.trading_mode(),
            mask_url(&self.trading.rpc_http),
            if venues.is_empty() { "rpc only".to_string() } else { venues.join(", ") },
            mask_url(&self.jito.block_engine_url),
            self.jito.tip_value,
            self.jito.bundle,
            mask_url(&self.zero_slot.url),
            self.zero_slot.tip_value,
            mask_url(&self.nozomi.url),
            self.nozomi.tip_value,
            self.blox_route.network,
            self.blox_route.region,
            if self.blox_route.auth_header.is_empty() { "(not set)" } else { "***" },
            self.blox_route.tip_value,
            self.trading.token_amount_sol,
            self.trading.threshold_buy,
            self.trading.threshold_sell,
            self.trading.slippage_bps,
            self.trading.counter,
            self.trading.unit_price_micro_lamports(),
            self.trading.unit_limit,
            self.trading.max_wait_time_ms,
            self.advanced.limit_wait_time_ms,
            self.filters.market_cap,
            self.filters.volume,
            self.filters.buy_sell_count,
            self.filters.sol_invested,
            self.filters.launcher_balance,
            self.filters.dev_buy,
            self.filters.max_launch_age_ms,
            self.exit.strategy,
            self.exit.take_profit_enabled,
            self.exit.take_profit_pct,
            self.exit.stop_loss_enabled,
            self.exit.stop_loss_pct,
            self.exit.downing_percent,
            self.exit.sell_all_tokens,
            self.blacklist.len(),
            self.copy_trading.enabled,
            self.copy_trading.target_wallets.len(),
            self.copy_trading.multi_target_mode,
            self.inverse_buy.enabled,
            self.inverse_buy.amount_sol,
            self.timer.enabled,
            self.timer.start_time.format("%H:%M"),
            self.timer.stop_time.format("%H:%M"),
            self.timer.auto_sell_on_stop,
            self.advanced.daily_buy_budget_sol,
            self.advanced.min_buy_confidence,
            self.advanced.min_sell_confidence,
            if self.telegram.enabled() { "***" } else { "(not set)" },
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if url.is_empty() {
        return "(not set)".to_string();
    }
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(pairs: &[(&str, &str)]) -> std::result::Result<Config, ConfigReport> {
        let settings = Settings::from_pairs(pairs.iter().map(|(k, v)| (*k, v.to_string()))).unwrap();
        Config::from_settings(&settings)
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]).unwrap();
        assert_eq!(config.trading.threshold_sell, 10_000_000_000);
        assert_eq!(config.trading.threshold_buy, 3_000_000_000);
        assert_eq!(config.trading.max_wait_time_ms, 650);
        assert!(!config.jito.use_jito);
        assert_eq!(config.jito.tip_value, 1000);
        assert_eq!(config.exit.stages.len(), 7);
        assert_eq!(config.exit.stages[0].percent, 10.0);
        assert_eq!(config.exit.strategy, ExitStrategy::TakeProfitStopLoss);
        assert_eq!(config.mode.trading_mode(), TradingMode::Live);
    }

    #[test]
    fn test_typed_keys() {
        let config = load(&[
            ("THRESHOLD_SELL", "20000000000"),
            ("THRESHOLD_BUY", "5000000000"),
            ("JITO_TIP_VALUE", "2000"),
            ("USE_JITO", "yes"),
            ("PRIVATE_LOGIC_ENABLED", "true"),
            ("PL_STAGE_1_PERCENT", "15.0"),
            ("BOT_START_TIME", "08:30"),
            ("UNIT_PRICE", "0.002"),
        ])
        .unwrap();

        assert_eq!(config.trading.threshold_sell, 20_000_000_000);
        assert_eq!(config.jito.tip_value, 2000);
        assert!(config.jito.use_jito);
        assert_eq!(config.exit.strategy, ExitStrategy::Staged);
        assert_eq!(config.exit.stages[0].percent, 15.0);
        assert_eq!(config.timer.start_time, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(config.trading.unit_price_micro_lamports(), 2000);
    }

    #[test]
    fn test_unparseable_values_are_reported_together() {
        let report = load(&[
            ("MAX_WAIT_TIME", "soon"),
            ("USE_JITO", "maybe"),
            ("BOT_STOP_TIME", "24:00"),
            ("TARGET_WALLETS", "not-a-wallet"),
        ])
        .unwrap_err();

        assert_eq!(report.0.len(), 4);
        assert!(report.0.iter().any(|e| matches!(e, ConfigError::Parse { key, .. } if key == "MAX_WAIT_TIME")));
        assert!(report.0.iter().any(|e| matches!(e, ConfigError::InvalidTime { .. })));
        assert!(report.0.iter().any(|e| matches!(e, ConfigError::InvalidWallet { .. })));
    }

    #[test]
    fn test_validation_errors() {
        let report = load(&[
            ("THRESHOLD_BUY", "20000000000"),
            ("THRESHOLD_SELL", "10000000000"),
            ("MIN_MARKET_CAP", "20"),
            ("MAX_MARKET_CAP", "10"),
        ])
        .unwrap_err();
        assert_eq!(report.0.len(), 2);
    }

    #[test]
    fn test_out_of_range_percent() {
        let report = load(&[("PL_STAGE_3_PERCENT", "150")]).unwrap_err();
        assert!(matches!(report.0[0], ConfigError::OutOfRange { .. }));

        let report = load(&[("MIN_BUY_CONFIDENCE", "1.5")]).unwrap_err();
        assert!(matches!(report.0[0], ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_time_format() {
        assert!(parse_time_of_day("12:30").is_some());
        assert!(parse_time_of_day("00:00").is_some());
        assert!(parse_time_of_day("23:59").is_some());
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("12:60").is_none());
        assert!(parse_time_of_day("12:3").is_none());
        assert!(parse_time_of_day("123:30").is_none());
    }

    #[test]
    fn test_target_wallets_list() {
        let config = load(&[
            ("COPY_TRADING_ENABLED", "true"),
            (
                "TARGET_WALLETS",
                "DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK, 11111111111111111111111111111112",
            ),
        ])
        .unwrap();
        assert_eq!(config.copy_trading.target_wallets.len(), 2);
    }

    #[test]
    fn test_blacklist_list() {
        let report = load(&[("BLACKLIST", "11111111111111111111111111111112,not-a-key")]).unwrap_err();
        assert!(matches!(&report.0[0], ConfigError::InvalidWallet { key, .. } if key == "BLACKLIST"));

        let config = load(&[("BLACKLIST", "11111111111111111111111111111112")]).unwrap();
        assert_eq!(config.blacklist.len(), 1);
        assert!(Config::default().blacklist.is_empty());
    }

    #[test]
    fn test_copy_trading_requires_targets() {
        let report = load(&[("COPY_TRADING_ENABLED", "true")]).unwrap_err();
        assert!(matches!(report.0[0], ConfigError::Inconsistent(_)));
    }

    #[test]
    fn test_mode_resolution() {
        let config = load(&[("LIVE_MODE", "true"), ("SIMULATION_MODE", "true")]).unwrap();
        assert_eq!(config.mode.trading_mode(), TradingMode::Simulation);
        assert!(config.mode.is_conflicting());

        let config = load(&[("LIVE_MODE", "false")]).unwrap();
        assert!(config.mode.trading_mode().is_simulated());

        let config = load(&[("PAPER_TRADING", "1")]).unwrap();
        assert_eq!(config.mode.trading_mode(), TradingMode::Paper);
    }

    #[test]
    fn test_explicit_exit_strategy_wins() {
        let config = load(&[
            ("PRIVATE_LOGIC_ENABLED", "true"),
            ("EXIT_STRATEGY", "take_profit_stop_loss"),
        ])
        .unwrap();
        assert_eq!(config.exit.strategy, ExitStrategy::TakeProfitStopLoss);
    }

    #[test]
    fn test_settings_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "token_amount = 0.25").unwrap();
        writeln!(file, "max_wait_time = 900").unwrap();
        writeln!(file, "target_wallets = [\"DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK\"]").unwrap();
        file.flush().unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.raw("TOKEN_AMOUNT").as_deref(), Some("0.25"));
        assert_eq!(settings.raw("MAX_WAIT_TIME").as_deref(), Some("900"));
        assert_eq!(
            settings.raw("TARGET_WALLETS").as_deref(),
            Some("DYw8jCTfwHNRJhhmFcbXvVDTqWMEVFBX6ZKUmG5CNSKK")
        );
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(mask_url("https://api.example.com"), "https://api.example.com");
        assert_eq!(mask_url(""), "(not set)");
    }

    #[test]
    fn test_bloxroute_endpoint() {
        let mut blox = BloxRouteConfig::default();
        assert_eq!(blox.endpoint(), "https://ny.solana.dex.blxrbdn.com/api/v2/submit");
        blox.network = "testnet".to_string();
        assert!(blox.endpoint().contains("bxrtest"));
    }
}
