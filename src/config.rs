use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub arbiter: ArbiterConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Run identifier; generated per process when unset
    #[serde(default = "default_run_id")]
    pub run_id: String,
    /// Starting cash in USD
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Assets replayed each tick
    #[serde(default = "default_asset_universe")]
    pub asset_universe: Vec<String>,
    /// Log a progress line every N ticks (0 = never)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_project_name() -> String {
    "NexusQuant".to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
fn default_initial_capital() -> f64 {
    100_000.0
}
fn default_asset_universe() -> Vec<String> {
    [
        "BTC-USD", "ETH-USD", "SOL-USD", // Crypto
        "AAPL", "MSFT", "NVDA", "TSLA", // Tech
        "SPY", "QQQ", "GLD", // Macro
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_progress_interval() -> u64 {
    10
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            version: default_version(),
            run_id: default_run_id(),
            initial_capital: default_initial_capital(),
            asset_universe: default_asset_universe(),
            progress_interval: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Directory holding one `<ASSET>.csv` file per asset
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Signal fusion parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Advice below this confidence is ignored
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// EMA weight of the fresh raw score (1.0 = no memory)
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
}

fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_smoothing_factor() -> f64 {
    0.3
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            smoothing_factor: default_smoothing_factor(),
        }
    }
}

/// Capital allocation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Maximum fraction of deployable equity in any single asset
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    /// Fraction of equity always held back as cash
    #[serde(default = "default_cash_reserve_pct")]
    pub cash_reserve_pct: f64,
}

fn default_max_position_pct() -> f64 {
    0.15
}
fn default_cash_reserve_pct() -> f64 {
    0.05
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_position_pct: default_max_position_pct(),
            cash_reserve_pct: default_cash_reserve_pct(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Drawdown fraction that triggers a risk warning
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,
    /// Number of observations in the rolling volatility window
    #[serde(default = "default_volatility_lookback")]
    pub volatility_lookback: usize,
    /// Volatility used when history is too short
    #[serde(default = "default_volatility")]
    pub default_volatility: f64,
}

fn default_max_drawdown_pct() -> f64 {
    0.15
}
fn default_volatility_lookback() -> usize {
    20
}
fn default_volatility() -> f64 {
    0.02
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown_pct: default_max_drawdown_pct(),
            volatility_lookback: default_volatility_lookback(),
            default_volatility: default_volatility(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Minimum absolute USD difference that produces an order
    #[serde(default = "default_threshold_usd")]
    pub threshold_usd: f64,
    /// Price used when an asset has never printed a valid price
    #[serde(default = "default_floor_price")]
    pub floor_price: f64,
}

fn default_threshold_usd() -> f64 {
    100.0
}
fn default_floor_price() -> f64 {
    0.01
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            threshold_usd: default_threshold_usd(),
            floor_price: default_floor_price(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Minimum ticks between discretionary advisor calls per asset
    #[serde(default = "default_llm_cooldown_ticks")]
    pub llm_cooldown_ticks: u64,
    /// Bars required before the quant advisor emits a real signal
    #[serde(default = "default_quant_min_history")]
    pub quant_min_history: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_llm_cooldown_ticks() -> u64 {
    20
}
fn default_quant_min_history() -> usize {
    20
}
fn default_rsi_period() -> usize {
    14
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            llm_cooldown_ticks: default_llm_cooldown_ticks(),
            quant_min_history: default_quant_min_history(),
            rsi_period: default_rsi_period(),
            llm: LlmConfig::default(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint used by the analyst
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_enabled")]
    pub enabled: bool,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_llm_enabled() -> bool {
    true
}
fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_llm_enabled(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; recording is in-memory when unset
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rolling log files (stdout only when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("NEXUS_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (NEXUS_ARBITER__SMOOTHING_FACTOR, etc.)
            .add_source(
                Environment::with_prefix("NEXUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("simulation.asset_universe"),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.simulation.initial_capital > 0.0) {
            errors.push("initial_capital must be positive".to_string());
        }

        if self.simulation.asset_universe.is_empty() {
            errors.push("asset_universe must not be empty".to_string());
        }

        let alpha = self.arbiter.smoothing_factor;
        if !(alpha > 0.0 && alpha <= 1.0) {
            errors.push(format!("smoothing_factor must be in (0, 1], got {alpha}"));
        }

        if !self.arbiter.confidence_threshold.is_finite()
            || self.arbiter.confidence_threshold < 0.0
        {
            errors.push("confidence_threshold must be a non-negative number".to_string());
        }

        let cap = self.allocator.max_position_pct;
        if !(cap > 0.0 && cap <= 1.0) {
            errors.push(format!("max_position_pct must be in (0, 1], got {cap}"));
        }

        let reserve = self.allocator.cash_reserve_pct;
        if !(0.0..1.0).contains(&reserve) {
            errors.push(format!("cash_reserve_pct must be in [0, 1), got {reserve}"));
        }

        if self.risk.volatility_lookback < 2 {
            errors.push("volatility_lookback must be at least 2".to_string());
        }

        if !(self.risk.default_volatility > 0.0) {
            errors.push("default_volatility must be positive".to_string());
        }

        if !(self.execution.threshold_usd >= 0.0) {
            errors.push("execution threshold_usd must be non-negative".to_string());
        }

        if !(self.execution.floor_price > 0.0) {
            errors.push("execution floor_price must be positive".to_string());
        }

        if self.advisor.rsi_period == 0 {
            errors.push("rsi_period must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
