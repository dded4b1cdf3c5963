//! Configuration types for settlement and the service facade.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, RevshareError, constants};

/// Optimistic-concurrency retry policy for settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Commit attempts before giving up with a contention error.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each conflict.
    pub backoff_base_ms: u64,
    /// Ceiling for the doubling delay.
    pub backoff_max_ms: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_SETTLEMENT_MAX_ATTEMPTS,
            backoff_base_ms: constants::DEFAULT_SETTLEMENT_BACKOFF_BASE_MS,
            backoff_max_ms: constants::DEFAULT_SETTLEMENT_BACKOFF_MAX_MS,
        }
    }
}

impl SettlementConfig {
    /// # Errors
    /// Returns [`RevshareError::Configuration`] if no attempt is allowed or
    /// the base delay exceeds the cap.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(RevshareError::Configuration(
                "settlement max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(RevshareError::Configuration(format!(
                "settlement backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let shift = failed_attempt.saturating_sub(1).min(16);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << shift)
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Service facade configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Shared secret used to verify payment event signatures.
    pub webhook_secret: Option<String>,
    /// Origin for checkout redirect URLs when the request carries none.
    pub default_origin: String,
    /// Currency recorded when an event omits it.
    pub currency: String,
    pub settlement: SettlementConfig,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            default_origin: constants::DEFAULT_ORIGIN.to_string(),
            currency: constants::DEFAULT_CURRENCY.to_string(),
            settlement: SettlementConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServiceConfig {
    /// Environment variable holding the webhook secret.
    pub const ENV_WEBHOOK_SECRET: &'static str = "REVSHARE_WEBHOOK_SECRET";
    /// Environment variable overriding the default origin.
    pub const ENV_DEFAULT_ORIGIN: &'static str = "REVSHARE_DEFAULT_ORIGIN";
    /// Environment variable selecting `text` or `json` logs.
    pub const ENV_LOG_FORMAT: &'static str = "REVSHARE_LOG_FORMAT";

    /// Parse a JSON config document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns [`RevshareError::Serialization`] for malformed JSON and
    /// [`RevshareError::Configuration`] if the settlement policy is invalid.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.settlement.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `REVSHARE_*` environment variables.
    ///
    /// # Errors
    /// Returns [`RevshareError::Configuration`] for an unknown log format.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServiceConfig::from_env`] with an injectable variable lookup.
    ///
    /// # Errors
    /// Returns [`RevshareError::Configuration`] for an unknown log format.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(secret) = lookup(Self::ENV_WEBHOOK_SECRET).filter(|s| !s.is_empty()) {
            config.webhook_secret = Some(secret);
        }
        if let Some(origin) = lookup(Self::ENV_DEFAULT_ORIGIN).filter(|s| !s.is_empty()) {
            config.default_origin = origin;
        }
        if let Some(format) = lookup(Self::ENV_LOG_FORMAT) {
            config.log_format = match format.to_ascii_lowercase().as_str() {
                "" | "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(RevshareError::Configuration(format!(
                        "unknown log format {other:?} (expected text or json)"
                    )));
                }
            };
        }
        Ok(config)
    }

    /// The webhook secret, or a configuration error if none was set.
    ///
    /// # Errors
    /// Returns [`RevshareError::Configuration`] when no secret is configured.
    pub fn require_webhook_secret(&self) -> Result<&str> {
        self.webhook_secret
            .as_deref()
            .ok_or_else(|| RevshareError::Configuration("webhook secret not configured".into()))
    }
}
