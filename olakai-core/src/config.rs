use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::ConfigError;

pub const DEFAULT_MONITOR_ENDPOINT: &str = "https://app.olakai.ai/api/monitoring/prompt";
pub const DEFAULT_CONTROL_ENDPOINT: &str = "https://app.olakai.ai/api/control/prompt";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide SDK settings. Built once, validated by `initialize`, then
/// shared read-only.
#[derive(Clone, Debug)]
pub struct OlakaiConfig {
    pub api_key: SecretString,
    pub monitor_endpoint: String,
    pub control_endpoint: String,
    /// Retries after the first attempt of a send.
    pub retries: u32,
    pub timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed sends to one endpoint before its breaker opens.
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown: Duration,
    pub debug: bool,
    pub verbose: bool,
    pub sdk_version: String,
}

impl OlakaiConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            monitor_endpoint: DEFAULT_MONITOR_ENDPOINT.to_string(),
            control_endpoint: DEFAULT_CONTROL_ENDPOINT.to_string(),
            retries: 4,
            timeout: Duration::from_secs(20),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            breaker_failure_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
            debug: false,
            verbose: false,
            sdk_version: SDK_VERSION.to_string(),
        }
    }

    /// Reads `OLAKAI_*` variables. Only `OLAKAI_API_KEY` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OLAKAI_API_KEY")
            .map_err(|_| ConfigError::Missing("OLAKAI_API_KEY"))?;
        let mut config = Self::new(SecretString::new(api_key));

        if let Some(endpoint) = env_var("OLAKAI_MONITOR_ENDPOINT") {
            config.monitor_endpoint = endpoint;
        }
        if let Some(endpoint) = env_var("OLAKAI_CONTROL_ENDPOINT") {
            config.control_endpoint = endpoint;
        }
        if let Some(retries) = env_var("OLAKAI_RETRIES") {
            config.retries = parse_env("OLAKAI_RETRIES", &retries)?;
        }
        if let Some(timeout) = env_var("OLAKAI_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_env("OLAKAI_TIMEOUT_MS", &timeout)?);
        }
        if let Some(debug) = env_var("OLAKAI_DEBUG") {
            config.debug = parse_flag(&debug);
        }
        if let Some(verbose) = env_var("OLAKAI_VERBOSE") {
            config.verbose = parse_flag(&verbose);
        }
        Ok(config)
    }

    pub fn with_monitor_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.monitor_endpoint = endpoint.into();
        self
    }

    pub fn with_control_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.control_endpoint = endpoint.into();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.breaker_failure_threshold = failure_threshold;
        self.breaker_cooldown = cooldown;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        for endpoint in [&self.monitor_endpoint, &self.control_endpoint] {
            Url::parse(endpoint).map_err(|err| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: err.to_string(),
            })?;
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be non-zero".to_string()));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "breaker_failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
