use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub market: MarketConfig,
    pub venues: VenuesConfig,
    pub supervisor: SupervisorConfig,
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Which market the supervisor trades and how deep it looks into the book.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// The reference trading pair, e.g. "GCBUSDT".
    pub default_symbol: String,
    /// Depth levels requested per order book snapshot.
    #[serde(default = "default_depth_limit")]
    pub depth_limit: u32,
}

fn default_depth_limit() -> u32 {
    50
}

/// Connection settings for both venues. The active venue is selected here;
/// both profiles stay configured so operators can switch without a redeploy.
#[derive(Debug, Clone, Deserialize)]
pub struct VenuesConfig {
    /// "a" or "b".
    pub active: String,
    pub venue_a: VenueConfig,
    pub venue_b: VenueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub base_url: String,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
    /// Per-call deadline in seconds for single operations.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Per-call deadline in seconds for batch operations.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
}

fn default_recv_window() -> u64 {
    5000
}

fn default_http_timeout() -> u64 {
    10
}

fn default_batch_timeout() -> u64 {
    30
}

/// Engine scheduling knobs. Defaults mirror the per-strategy cadence the
/// system was tuned with; operators can slow a strategy down without a build.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_tick_conditional")]
    pub conditional_tick_secs: u64,
    #[serde(default = "default_tick_accumulator")]
    pub accumulator_tick_secs: u64,
    #[serde(default = "default_tick_market_maker")]
    pub market_maker_tick_secs: u64,
    #[serde(default = "default_tick_stabilizer")]
    pub stabilizer_tick_secs: u64,
    #[serde(default = "default_tick_price_keeper")]
    pub price_keeper_tick_secs: u64,
    #[serde(default = "default_tick_buy_wall")]
    pub buy_wall_tick_secs: u64,
    #[serde(default = "default_tick_sell_liquidity")]
    pub sell_liquidity_tick_secs: u64,
    #[serde(default = "default_tick_price_gap")]
    pub price_gap_tick_secs: u64,
    /// Seconds granted to in-flight work units during shutdown.
    #[serde(default = "default_shutdown_deadline")]
    pub shutdown_deadline_secs: u64,
}

fn default_tick_conditional() -> u64 {
    10
}
fn default_tick_accumulator() -> u64 {
    60
}
fn default_tick_market_maker() -> u64 {
    30
}
fn default_tick_stabilizer() -> u64 {
    5
}
fn default_tick_price_keeper() -> u64 {
    3
}
fn default_tick_buy_wall() -> u64 {
    10
}
fn default_tick_sell_liquidity() -> u64 {
    10
}
fn default_tick_price_gap() -> u64 {
    3
}
fn default_shutdown_deadline() -> u64 {
    5
}

/// Telegram notification settings. Empty token or chat id disables alerting.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub chat_id: String,
}

/// Bind address for the HTTP control surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directive string for the env-filter, e.g. "info,engine=debug".
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default = "default_log_dir")]
    pub directory: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Sanity checks that cannot be expressed in the type system.
impl Settings {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.market.default_symbol.is_empty() {
            return Err(crate::error::ConfigError::Invalid(
                "market.default_symbol".to_string(),
                "must not be empty".to_string(),
            ));
        }
        match self.venues.active.as_str() {
            "a" | "b" => {}
            other => {
                return Err(crate::error::ConfigError::Invalid(
                    "venues.active".to_string(),
                    format!("expected \"a\" or \"b\", got \"{}\"", other),
                ));
            }
        }
        if self.supervisor.shutdown_deadline_secs == 0 {
            return Err(crate::error::ConfigError::Invalid(
                "supervisor.shutdown_deadline_secs".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
