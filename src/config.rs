use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub lookup: LookupSettings,
    #[serde(default)]
    pub tiers: TierSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    pub ingest: IngestSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: String,
    pub l1_cache_size: Option<u64>,
    pub l1_ttl_secs: Option<u64>,
}

/// External WHOIS lookup API
#[derive(Debug, Clone, Deserialize)]
pub struct LookupSettings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

/// Lifetimes of the cache tiers
#[derive(Debug, Clone, Deserialize)]
pub struct TierSettings {
    #[serde(default = "default_name_ttl_secs")]
    pub name_ttl_secs: u64,
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,
    #[serde(default = "default_recent_window_minutes")]
    pub recent_window_minutes: i64,
    #[serde(default = "default_bulk_window_minutes")]
    pub bulk_window_minutes: i64,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            name_ttl_secs: default_name_ttl_secs(),
            response_ttl_secs: default_response_ttl_secs(),
            recent_window_minutes: default_recent_window_minutes(),
            bulk_window_minutes: default_bulk_window_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Header set by a trusted fronting proxy (e.g. `CF-Connecting-IP`)
    /// that carries the caller address. Unset means the TCP peer address.
    #[serde(default)]
    pub client_ip_header: Option<String>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            client_ip_header: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    pub free_url: String,
    pub paid_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_progress_ttl_secs")]
    pub progress_ttl_secs: u64,
    pub schedule_interval_secs: Option<u64>,
}

fn default_lookup_timeout_ms() -> u64 { 5_000 }
fn default_batch_size() -> usize { 10 }
fn default_batch_delay_ms() -> u64 { 100 }
fn default_name_ttl_secs() -> u64 { 1_800 }
fn default_response_ttl_secs() -> u64 { 600 }
fn default_recent_window_minutes() -> i64 { 1_440 }
fn default_bulk_window_minutes() -> i64 { 10_080 }
fn default_max_requests() -> usize { 50 }
fn default_window_ms() -> u64 { 3_600_000 }
fn default_ingest_batch_size() -> usize { 1_000 }
fn default_progress_ttl_secs() -> u64 { 3_600 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// Apply `LOG_LEVEL` / `LOG_FORMAT` on top of the configured values
    pub fn with_env_overrides(self) -> Self {
        self.overridden_by(std::env::var("LOG_LEVEL").ok(), std::env::var("LOG_FORMAT").ok())
    }

    pub fn overridden_by(mut self, level: Option<String>, format: Option<String>) -> Self {
        if let Some(level) = level.filter(|l| !l.trim().is_empty()) {
            self.level = level;
        }
        if let Some(format) = format.filter(|f| !f.trim().is_empty()) {
            self.format = format;
        }
        self
    }

    pub fn is_pretty(&self) -> bool {
        self.format.eq_ignore_ascii_case("pretty")
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with DOMAINS_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., DOMAINS__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("DOMAINS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("DOMAINS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("REDIS_URL", "cache.redis_url"),
        ("IP2WHOIS_API_KEY", "lookup.api_key"),
        ("DOMAINS_INDEX_API_KEY", "ingest.api_key"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let tiers = TierSettings::default();
        assert_eq!(tiers.name_ttl_secs, 1_800);
        assert_eq!(tiers.response_ttl_secs, 600);
        assert_eq!(tiers.recent_window_minutes, 24 * 60);
        assert_eq!(tiers.bulk_window_minutes, 7 * 24 * 60);
    }

    #[test]
    fn test_default_rate_limit() {
        let limits = RateLimitSettings::default();
        assert_eq!(limits.max_requests, 50);
        assert_eq!(limits.window_ms, 3_600_000);
        assert!(limits.client_ip_header.is_none());
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_logging_env_overrides_file_values() {
        let file = LoggingSettings {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        };

        let kept = file.clone().overridden_by(None, Some(String::new()));
        assert_eq!(kept.level, "warn");
        assert!(kept.is_pretty());

        let overridden = file.overridden_by(Some("debug".to_string()), Some("json".to_string()));
        assert_eq!(overridden.level, "debug");
        assert!(!overridden.is_pretty());
    }

    #[test]
    fn test_load_shipped_defaults() {
        let settings = Settings::load_from("config/default.toml").expect("default config parses");
        assert_eq!(settings.lookup.batch_size, 10);
        assert_eq!(settings.lookup.timeout_ms, 5_000);
        assert_eq!(settings.ingest.batch_size, 1_000);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, "json");
    }
}
