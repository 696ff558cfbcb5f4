//! Runtime configuration.
//!
//! Values come from environment variables; every setting has a default except
//! the vault key. Parsing goes through a lookup function so tests can supply a
//! map instead of touching the process environment.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use cardissue_vault::VaultKey;
use cardissue_vault::pan::{DEFAULT_PAN_LEN, MIN_BIN_LEN};

use crate::outbox::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required but not set")]
    Missing { key: &'static str },

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Outbox dispatcher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub retry: RetryPolicy,
    pub retention_days: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1_000),
            batch_size: 100,
            retry: RetryPolicy::default(),
            retention_days: 7,
        }
    }
}

impl DispatcherConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

/// Card issuance settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceConfig {
    /// Base BIN, also used for unrecognized product codes.
    pub visa_bin: String,
    pub mastercard_bin: String,
    pub validity_years: u32,
    /// Minimum credit score accepted by the integration-event intake.
    pub min_credit_score: i32,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            visa_bin: "516233".to_string(),
            mastercard_bin: "453912".to_string(),
            validity_years: 3,
            min_credit_score: 600,
        }
    }
}

impl IssuanceConfig {
    /// BIN for a product code. Unknown codes fall back to the base (visa) BIN.
    pub fn bin_for(&self, product_code: &str) -> &str {
        match product_code {
            "VISA_GOLD" | "VISA_PLATINUM" => &self.visa_bin,
            "MASTERCARD_GOLD" | "MASTERCARD_PLATINUM" => &self.mastercard_bin,
            _ => &self.visa_bin,
        }
    }
}

/// Vault key source. `Debug` never prints the key.
#[derive(Clone, Default)]
pub struct VaultConfig {
    key_base64: Option<String>,
}

impl VaultConfig {
    pub fn with_key_base64(key: impl Into<String>) -> Self {
        Self {
            key_base64: Some(key.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key_base64.is_some()
    }

    /// Decode the configured key.
    pub fn key(&self) -> Result<VaultKey, ConfigError> {
        let encoded = self
            .key_base64
            .as_deref()
            .ok_or(ConfigError::Missing { key: TOKEN_VAULT_KEY })?;
        VaultKey::from_base64(encoded).map_err(|e| ConfigError::Invalid {
            key: TOKEN_VAULT_KEY,
            reason: e.to_string(),
        })
    }
}

impl core::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("key", &self.key_base64.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub issuance: IssuanceConfig,
    pub vault: VaultConfig,
}

const OUTBOX_POLL_INTERVAL_MS: &str = "OUTBOX_POLL_INTERVAL_MS";
const OUTBOX_BATCH_SIZE: &str = "OUTBOX_BATCH_SIZE";
const OUTBOX_RETRY_INITIAL_DELAY_MS: &str = "OUTBOX_RETRY_INITIAL_DELAY_MS";
const OUTBOX_RETRY_MAX_DELAY_MS: &str = "OUTBOX_RETRY_MAX_DELAY_MS";
const OUTBOX_RETRY_MAX_ATTEMPTS: &str = "OUTBOX_RETRY_MAX_ATTEMPTS";
const OUTBOX_RETRY_BACKOFF_FACTOR: &str = "OUTBOX_RETRY_BACKOFF_FACTOR";
const OUTBOX_RETENTION_DAYS: &str = "OUTBOX_RETENTION_DAYS";
const ISSUANCE_VISA_BIN: &str = "ISSUANCE_VISA_BIN";
const ISSUANCE_MASTERCARD_BIN: &str = "ISSUANCE_MASTERCARD_BIN";
const ISSUANCE_VALIDITY_YEARS: &str = "ISSUANCE_VALIDITY_YEARS";
const ISSUANCE_MIN_CREDIT_SCORE: &str = "ISSUANCE_MIN_CREDIT_SCORE";
const TOKEN_VAULT_KEY: &str = "TOKEN_VAULT_KEY";

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration from a fixed map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dispatcher = DispatcherConfig {
            poll_interval: Duration::from_millis(parse_or(
                &get,
                OUTBOX_POLL_INTERVAL_MS,
                defaults.dispatcher.poll_interval.as_millis() as u64,
            )?),
            batch_size: positive(
                OUTBOX_BATCH_SIZE,
                parse_or(&get, OUTBOX_BATCH_SIZE, defaults.dispatcher.batch_size)?,
            )?,
            retry: RetryPolicy {
                max_attempts: positive(
                    OUTBOX_RETRY_MAX_ATTEMPTS,
                    parse_or(&get, OUTBOX_RETRY_MAX_ATTEMPTS, defaults.dispatcher.retry.max_attempts)?,
                )?,
                initial_delay: Duration::from_millis(parse_or(
                    &get,
                    OUTBOX_RETRY_INITIAL_DELAY_MS,
                    defaults.dispatcher.retry.initial_delay.as_millis() as u64,
                )?),
                max_delay: Duration::from_millis(parse_or(
                    &get,
                    OUTBOX_RETRY_MAX_DELAY_MS,
                    defaults.dispatcher.retry.max_delay.as_millis() as u64,
                )?),
                backoff_factor: parse_or(
                    &get,
                    OUTBOX_RETRY_BACKOFF_FACTOR,
                    defaults.dispatcher.retry.backoff_factor,
                )?,
            },
            retention_days: parse_or(&get, OUTBOX_RETENTION_DAYS, defaults.dispatcher.retention_days)?,
        };

        if !dispatcher.retry.backoff_factor.is_finite() || dispatcher.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: OUTBOX_RETRY_BACKOFF_FACTOR,
                reason: "must be a number >= 1.0".to_string(),
            });
        }
        if dispatcher.retry.max_delay < dispatcher.retry.initial_delay {
            return Err(ConfigError::Invalid {
                key: OUTBOX_RETRY_MAX_DELAY_MS,
                reason: "must not be below the initial delay".to_string(),
            });
        }

        let issuance = IssuanceConfig {
            visa_bin: bin(ISSUANCE_VISA_BIN, get(ISSUANCE_VISA_BIN), defaults.issuance.visa_bin)?,
            mastercard_bin: bin(
                ISSUANCE_MASTERCARD_BIN,
                get(ISSUANCE_MASTERCARD_BIN),
                defaults.issuance.mastercard_bin,
            )?,
            validity_years: positive(
                ISSUANCE_VALIDITY_YEARS,
                parse_or(&get, ISSUANCE_VALIDITY_YEARS, defaults.issuance.validity_years)?,
            )?,
            min_credit_score: parse_or(
                &get,
                ISSUANCE_MIN_CREDIT_SCORE,
                defaults.issuance.min_credit_score,
            )?,
        };

        let vault = VaultConfig {
            key_base64: get(TOKEN_VAULT_KEY),
        };

        Ok(Self {
            dispatcher,
            issuance,
            vault,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{raw:?}: {e}"),
        }),
    }
}

fn positive<T: PartialOrd + Default>(key: &'static str, value: T) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        })
    }
}

fn bin(key: &'static str, raw: Option<String>, default: String) -> Result<String, ConfigError> {
    let value = raw.unwrap_or(default);
    if value.len() < MIN_BIN_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be at least {MIN_BIN_LEN} digits"),
        });
    }
    if value.len() >= DEFAULT_PAN_LEN {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be shorter than the {DEFAULT_PAN_LEN}-digit PAN"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = AppConfig::from_map(&HashMap::new()).unwrap();

        assert_eq!(cfg.dispatcher, DispatcherConfig::default());
        assert_eq!(cfg.issuance, IssuanceConfig::default());
        assert_eq!(cfg.dispatcher.retention(), chrono::Duration::days(7));
        assert!(!cfg.vault.is_configured());
        assert_eq!(cfg.vault.key().unwrap_err(), ConfigError::Missing { key: TOKEN_VAULT_KEY });
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = AppConfig::from_map(&vars(&[
            (OUTBOX_POLL_INTERVAL_MS, "250"),
            (OUTBOX_BATCH_SIZE, "10"),
            (OUTBOX_RETRY_MAX_ATTEMPTS, "3"),
            (OUTBOX_RETRY_BACKOFF_FACTOR, "1.5"),
            (OUTBOX_RETENTION_DAYS, "30"),
            (ISSUANCE_MASTERCARD_BIN, "222100"),
            (ISSUANCE_MIN_CREDIT_SCORE, "700"),
            (TOKEN_VAULT_KEY, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
        ]))
        .unwrap();

        assert_eq!(cfg.dispatcher.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.dispatcher.batch_size, 10);
        assert_eq!(cfg.dispatcher.retry.max_attempts, 3);
        assert_eq!(cfg.dispatcher.retry.backoff_factor, 1.5);
        assert_eq!(cfg.dispatcher.retention_days, 30);
        assert_eq!(cfg.issuance.bin_for("MASTERCARD_GOLD"), "222100");
        assert_eq!(cfg.issuance.min_credit_score, 700);
        assert!(cfg.vault.key().is_ok());
    }

    #[test]
    fn malformed_values_name_the_key() {
        let err = AppConfig::from_map(&vars(&[(OUTBOX_BATCH_SIZE, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: OUTBOX_BATCH_SIZE, .. }));

        let err = AppConfig::from_map(&vars(&[(OUTBOX_BATCH_SIZE, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: OUTBOX_BATCH_SIZE, .. }));

        let err = AppConfig::from_map(&vars(&[(ISSUANCE_VISA_BIN, "4111")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ISSUANCE_VISA_BIN, .. }));

        let err = AppConfig::from_map(&vars(&[(ISSUANCE_VISA_BIN, "5162331234567890")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ISSUANCE_VISA_BIN, .. }));

        let cfg = AppConfig::from_map(&vars(&[(ISSUANCE_MASTERCARD_BIN, "453912345678901")])).unwrap();
        assert_eq!(cfg.issuance.mastercard_bin.len(), 15);

        let err = AppConfig::from_map(&vars(&[(OUTBOX_RETRY_BACKOFF_FACTOR, "0.5")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: OUTBOX_RETRY_BACKOFF_FACTOR, .. }));

        let cfg = AppConfig::from_map(&vars(&[(TOKEN_VAULT_KEY, "c2hvcnQ=")])).unwrap();
        assert!(matches!(cfg.vault.key(), Err(ConfigError::Invalid { key: TOKEN_VAULT_KEY, .. })));
    }

    #[test]
    fn product_codes_map_to_bins() {
        let cfg = IssuanceConfig::default();
        assert_eq!(cfg.bin_for("VISA_GOLD"), "516233");
        assert_eq!(cfg.bin_for("VISA_PLATINUM"), "516233");
        assert_eq!(cfg.bin_for("MASTERCARD_PLATINUM"), "453912");
        assert_eq!(cfg.bin_for("UNKNOWN"), "516233");
    }

    #[test]
    fn vault_config_debug_hides_key() {
        let cfg = VaultConfig::with_key_base64("c2VjcmV0");
        assert!(!format!("{cfg:?}").contains("c2VjcmV0"));
    }
}
