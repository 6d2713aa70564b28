//! Server configuration via CLI args and environment variables.

use std::time::Duration;

use clap::Parser;
use url::Url;

use seon_service::ServiceConfig;
use seon_service::rate_limit::RatePolicy;
use seon_service::sweeper::SweepIntervals;
use seon_upstream::{GeminiConfig, RecaptchaConfig, gemini, recaptcha};

/// AI search server for the Seon documentation site.
#[derive(Parser, Debug, Clone)]
#[command(name = "seon-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "SEON_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080, env = "SEON_PORT")]
    pub port: u16,

    /// Log level.
    #[arg(long, default_value = "info", env = "SEON_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "SEON_LOG_FORMAT")]
    pub log_format: String,

    /// CORS allowed origins (comma-separated). Empty for no CORS.
    #[arg(long, env = "SEON_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    // --- Rate limiting ---
    /// Searches allowed per client per window (0 = unlimited).
    #[arg(long, default_value_t = 10, env = "SEON_RATE_LIMIT")]
    pub rate_limit: u64,

    /// Rate-limit window in seconds.
    #[arg(long, default_value_t = 15 * 60, env = "SEON_RATE_LIMIT_WINDOW")]
    pub rate_limit_window: u64,

    /// Block applied after exceeding the limit, in seconds (0 = no block).
    #[arg(long, default_value_t = 30 * 60, env = "SEON_RATE_LIMIT_BLOCK")]
    pub rate_limit_block: u64,

    /// Penalty budget per window after failed verification (0 = no penalty).
    #[arg(long, default_value_t = 3, env = "SEON_STRICT_RATE_LIMIT")]
    pub strict_rate_limit: u64,

    #[arg(long, default_value_t = 5 * 60, env = "SEON_STRICT_RATE_LIMIT_WINDOW")]
    pub strict_rate_limit_window: u64,

    #[arg(long, default_value_t = 60 * 60, env = "SEON_STRICT_RATE_LIMIT_BLOCK")]
    pub strict_rate_limit_block: u64,

    // --- Stores ---
    /// Maximum cached selections (0 = caching off).
    #[arg(long, default_value_t = 100, env = "SEON_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Cached selection lifetime in seconds.
    #[arg(long, default_value_t = 60 * 60, env = "SEON_CACHE_TTL")]
    pub cache_ttl: u64,

    /// Recent queries remembered per client for duplicate detection.
    #[arg(long, default_value_t = 10, env = "SEON_RECENT_CAPACITY")]
    pub recent_capacity: usize,

    /// How long a recent query is remembered, in seconds.
    #[arg(long, default_value_t = 15 * 60, env = "SEON_RECENT_RETENTION")]
    pub recent_retention: u64,

    /// Rate-limit sweep interval in seconds (0 = disabled).
    #[arg(long, default_value_t = 5 * 60, env = "SEON_SWEEP_RATE_LIMITS")]
    pub sweep_rate_limits: u64,

    /// Cache sweep interval in seconds (0 = disabled).
    #[arg(long, default_value_t = 30 * 60, env = "SEON_SWEEP_CACHE")]
    pub sweep_cache: u64,

    /// Recent-query sweep interval in seconds (0 = disabled).
    #[arg(long, default_value_t = 10 * 60, env = "SEON_SWEEP_RECENT_QUERIES")]
    pub sweep_recent_queries: u64,

    // --- Upstream ---
    /// API key for the generative-AI service.
    #[arg(long, env = "SEON_AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: String,

    #[arg(long, default_value = gemini::DEFAULT_MODEL, env = "SEON_AI_MODEL")]
    pub ai_model: String,

    #[arg(long, default_value = gemini::DEFAULT_BASE_URL, env = "SEON_AI_BASE_URL")]
    pub ai_base_url: Url,

    /// Completion timeout in seconds (0 = disabled).
    #[arg(long, default_value_t = 30, env = "SEON_AI_TIMEOUT")]
    pub ai_timeout: u64,

    /// Verification secret. Without it, supplied tokens are not checked.
    #[arg(long, env = "SEON_VERIFY_SECRET", hide_env_values = true)]
    pub verify_secret: Option<String>,

    #[arg(long, default_value = recaptcha::DEFAULT_BASE_URL, env = "SEON_VERIFY_BASE_URL")]
    pub verify_base_url: Url,

    /// Lowest verification score accepted as human.
    #[arg(long, default_value_t = recaptcha::DEFAULT_MIN_SCORE, env = "SEON_VERIFY_MIN_SCORE")]
    pub verify_min_score: f64,

    /// Timeout for verification requests in seconds (0 = disabled).
    #[arg(long, default_value_t = 10, env = "SEON_VERIFY_TIMEOUT")]
    pub verify_timeout: u64,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            rate_limit: policy(
                self.rate_limit,
                self.rate_limit_window,
                self.rate_limit_block,
            ),
            strict_rate_limit: policy(
                self.strict_rate_limit,
                self.strict_rate_limit_window,
                self.strict_rate_limit_block,
            ),
            cache_capacity: self.cache_capacity,
            cache_ttl: Duration::from_secs(self.cache_ttl),
            recent_capacity: self.recent_capacity,
            recent_retention: Duration::from_secs(self.recent_retention),
            ai_timeout: Duration::from_secs(self.ai_timeout),
        }
    }

    pub fn sweep_intervals(&self) -> SweepIntervals {
        SweepIntervals {
            rate_limits: Duration::from_secs(self.sweep_rate_limits),
            cache: Duration::from_secs(self.sweep_cache),
            recent_queries: Duration::from_secs(self.sweep_recent_queries),
        }
    }

    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            base_url: self.ai_base_url.clone(),
            model: self.ai_model.clone(),
            api_key: self.ai_api_key.clone(),
        }
    }

    /// `None` when no verification secret is configured.
    pub fn recaptcha_config(&self) -> Option<RecaptchaConfig> {
        self.verify_secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|secret| RecaptchaConfig {
                base_url: self.verify_base_url.clone(),
                secret: secret.clone(),
                min_score: self.verify_min_score,
            })
    }
}

fn policy(max_requests: u64, window_secs: u64, block_secs: u64) -> RatePolicy {
    RatePolicy {
        max_requests,
        window: Duration::from_secs(window_secs),
        block_duration: (block_secs > 0).then(|| Duration::from_secs(block_secs)),
    }
}
