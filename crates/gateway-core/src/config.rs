//! Configuration module for the streaming-URL gateway.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stub: StubConfig,
    pub rate_limit: RateLimitConfig,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the JSON API and redirect endpoints listen on.
    pub bind_addr: String,
}

/// Database and data-directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL, e.g. `sqlite:///var/lib/gateway/state.db`.
    pub url: String,
    /// Root directory for per-drive credential blobs and SQLite files.
    pub data_dir: PathBuf,
}

/// Stub file generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubConfig {
    /// Base URL prepended to generated `.strm` contents. `None` falls back
    /// to the `stream://{kind}/{pick_handle}` placeholder scheme.
    pub base_url: Option<String>,
    /// Seconds a resolved signed URL is cached in the Redirect Cache.
    pub cache_ttl_seconds: u64,
}

/// Per-drive upstream request rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second, per drive.
    pub requests_per_second: u32,
    /// Token bucket burst capacity.
    pub burst: u32,
}

/// Upstream HTTP client timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8115".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("streaming-url-gateway");
        Self {
            url: format!("sqlite://{}/state.db", data_dir.display()),
            data_dir,
        }
    }
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            cache_ttl_seconds: 3600,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2,
            burst: 2,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            read_timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/streaming-url-gateway/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("streaming-url-gateway")
            .join("config.yaml")
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"rate_limit.requests_per_second"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.bind_addr".into(),
                message: format!("not a valid host:port: {}", self.server.bind_addr),
            });
        }

        if self.database.url.is_empty() {
            errors.push(ValidationError {
                field: "database.url".into(),
                message: "must not be empty".into(),
            });
        }
        if !self.database.data_dir.is_absolute() {
            errors.push(ValidationError {
                field: "database.data_dir".into(),
                message: "must be an absolute path".into(),
            });
        }

        if self.stub.cache_ttl_seconds == 0 {
            errors.push(ValidationError {
                field: "stub.cache_ttl_seconds".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError {
                field: "rate_limit.requests_per_second".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.rate_limit.burst == 0 {
            errors.push(ValidationError {
                field: "rate_limit.burst".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.upstream.connect_timeout_seconds == 0 {
            errors.push(ValidationError {
                field: "upstream.connect_timeout_seconds".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.upstream.read_timeout_seconds == 0 {
            errors.push(ValidationError {
                field: "upstream.read_timeout_seconds".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn server_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server.bind_addr = addr.into();
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = url.into();
        self
    }

    pub fn database_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.config.database.data_dir = data_dir;
        self
    }

    pub fn stub_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.stub.base_url = Some(base_url.into());
        self
    }

    pub fn stub_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.config.stub.cache_ttl_seconds = seconds;
        self
    }

    pub fn rate_limit_requests_per_second(mut self, n: u32) -> Self {
        self.config.rate_limit.requests_per_second = n;
        self
    }

    pub fn rate_limit_burst(mut self, n: u32) -> Self {
        self.config.rate_limit.burst = n;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:8115");
        assert_eq!(cfg.stub.cache_ttl_seconds, 3600);
        assert!(cfg.stub.base_url.is_none());
        assert_eq!(cfg.rate_limit.requests_per_second, 2);
        assert_eq!(cfg.upstream.connect_timeout_seconds, 30);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let cfg = Config::default();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
    }

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
server:
  bind_addr: "127.0.0.1:9000"
database:
  url: "sqlite:///tmp/gw/state.db"
  data_dir: /tmp/gw
stub:
  base_url: "https://gw.example.com"
  cache_ttl_seconds: 120
rate_limit:
  requests_per_second: 5
  burst: 10
upstream:
  connect_timeout_seconds: 10
  read_timeout_seconds: 60
logging:
  level: debug
  json: true
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.database.data_dir, PathBuf::from("/tmp/gw"));
        assert_eq!(cfg.stub.base_url.as_deref(), Some("https://gw.example.com"));
        assert_eq!(cfg.stub.cache_ttl_seconds, 120);
        assert_eq!(cfg.rate_limit.requests_per_second, 5);
        assert_eq!(cfg.upstream.read_timeout_seconds, 60);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:8115");
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn validate_catches_invalid_bind_addr() {
        let mut cfg = Config::default();
        cfg.server.bind_addr = "not-an-addr".into();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "server.bind_addr"));
    }

    #[test]
    fn validate_catches_relative_data_dir() {
        let mut cfg = Config::default();
        cfg.database.data_dir = PathBuf::from("relative/path");
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "database.data_dir"));
    }

    #[test]
    fn validate_catches_zero_rate_limit_and_ttl() {
        let mut cfg = Config::default();
        cfg.rate_limit.requests_per_second = 0;
        cfg.rate_limit.burst = 0;
        cfg.stub.cache_ttl_seconds = 0;
        let errors = cfg.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"rate_limit.requests_per_second"));
        assert!(fields.contains(&"rate_limit.burst"));
        assert!(fields.contains(&"stub.cache_ttl_seconds"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            assert!(!cfg.validate().iter().any(|e| e.field == "logging.level"));
        }
    }

    #[test]
    fn builder_starts_from_defaults() {
        let cfg = ConfigBuilder::new().build();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:8115");
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .server_bind_addr("0.0.0.0:9999")
            .database_url("sqlite:///custom/state.db")
            .database_data_dir(PathBuf::from("/custom"))
            .stub_base_url("https://custom.example.com")
            .stub_cache_ttl_seconds(60)
            .rate_limit_requests_per_second(10)
            .rate_limit_burst(20)
            .logging_level("warn")
            .logging_json(true)
            .build();

        assert_eq!(cfg.server.bind_addr, "0.0.0.0:9999");
        assert_eq!(cfg.database.data_dir, PathBuf::from("/custom"));
        assert_eq!(cfg.stub.base_url.as_deref(), Some("https://custom.example.com"));
        assert_eq!(cfg.stub.cache_ttl_seconds, 60);
        assert_eq!(cfg.rate_limit.requests_per_second, 10);
        assert_eq!(cfg.rate_limit.burst, 20);
        assert_eq!(cfg.logging.level, "warn");
        assert!(cfg.logging.json);
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new()
            .rate_limit_requests_per_second(0)
            .logging_level("nope")
            .build_validated();
        assert!(result.is_err());
        assert!(result.unwrap_err().len() >= 2);
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let p = Config::default_path();
        assert!(p.ends_with("streaming-url-gateway/config.yaml"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "rate_limit.burst".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "rate_limit.burst: must be greater than 0");
    }
}
