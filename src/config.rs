use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::api::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::lock::EDIT_LOCK_BUFFER_SECS;

pub const ENV_API_URL: &str = "SIGNAL_DESK_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "SIGNAL_DESK_TIMEOUT_SECS";
pub const ENV_POLL_SECS: &str = "SIGNAL_DESK_POLL_SECS";
pub const ENV_WORKING_DIR: &str = "SIGNAL_DESK_WORKING_DIR";
pub const ENV_DEMO: &str = "SIGNAL_DESK_DEMO";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}")]
    Parse { key: &'static str, value: String },
    #[error("invalid api url {0:?}")]
    Url(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeskConfig {
    pub api_url: String,
    #[serde(with = "secs")]
    pub timeout: Duration,
    /// Bot and trading-status refresh.
    #[serde(with = "secs")]
    pub status_poll: Duration,
    /// Lock re-evaluation tick.
    #[serde(with = "secs")]
    pub lock_tick: Duration,
    pub edit_lock_buffer_secs: i64,
    /// Directory the bot manager starts scripts from.
    pub working_dir: Option<String>,
    /// Serve sample data only; never touch the network.
    pub demo: bool,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            status_poll: Duration::from_secs(30),
            lock_tick: Duration::from_secs(1),
            edit_lock_buffer_secs: EDIT_LOCK_BUFFER_SECS,
            working_dir: None,
            demo: false,
        }
    }
}

impl DeskConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for the `SIGNAL_DESK_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            cfg.api_url = url.trim().to_string();
        }
        if let Some(v) = get(ENV_TIMEOUT_SECS) {
            cfg.timeout = Duration::from_secs(parse_num(ENV_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(ENV_POLL_SECS) {
            cfg.status_poll = Duration::from_secs(parse_num(ENV_POLL_SECS, &v)?);
        }
        if let Some(dir) = get(ENV_WORKING_DIR) {
            cfg.working_dir = Some(dir);
        }
        if let Some(v) = get(ENV_DEMO) {
            cfg.demo = parse_flag(ENV_DEMO, &v)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_url).map_err(|_| ConfigError::Url(self.api_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Url(self.api_url.clone()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Zero("timeout"));
        }
        if self.status_poll.is_zero() {
            return Err(ConfigError::Zero("status poll interval"));
        }
        if self.lock_tick.is_zero() {
            return Err(ConfigError::Zero("lock tick"));
        }
        Ok(())
    }
}

fn parse_num(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse {
            key,
            value: value.to_string(),
        }),
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_backend() {
        let cfg = DeskConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.api_url, "http://localhost:8000");
        assert_eq!(cfg.timeout, Duration::from_secs(10));
        assert_eq!(cfg.status_poll, Duration::from_secs(30));
        assert_eq!(cfg.edit_lock_buffer_secs, 10);
        assert!(!cfg.demo);
    }

    #[test]
    fn env_overrides() {
        let cfg = DeskConfig::from_lookup(lookup(&[
            (ENV_API_URL, "https://desk.example.com"),
            (ENV_POLL_SECS, "5"),
            (ENV_DEMO, "yes"),
            (ENV_WORKING_DIR, "/srv/bots"),
        ]))
        .unwrap();
        assert_eq!(cfg.api_url, "https://desk.example.com");
        assert_eq!(cfg.status_poll, Duration::from_secs(5));
        assert!(cfg.demo);
        assert_eq!(cfg.working_dir.as_deref(), Some("/srv/bots"));
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert_eq!(
            DeskConfig::from_lookup(lookup(&[(ENV_POLL_SECS, "0")])),
            Err(ConfigError::Zero("status poll interval"))
        );
        assert!(matches!(
            DeskConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "ten")])),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            DeskConfig::from_lookup(lookup(&[(ENV_API_URL, "ftp://x")])),
            Err(ConfigError::Url(_))
        ));
    }
}
