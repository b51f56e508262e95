use crate::errors::{ClientError, ClientResult};
use std::time::Duration;
use taskdeck_core::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:taskdeck.sqlite3?mode=rwc";
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(4);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LIVE_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the collection API; also the reachability probe target.
    pub api_url: String,
    /// Live update endpoint. `None` disables the push channel.
    pub ws_url: Option<String>,
    pub database_url: String,
    pub page_size: usize,
    pub probe_interval: Duration,
    pub request_timeout: Duration,
    pub live_reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: Some(DEFAULT_WS_URL.to_string()),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            live_reconnect_delay: DEFAULT_LIVE_RECONNECT_DELAY,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TASKDECK_*` environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("TASKDECK_API_URL") {
            config.api_url = url;
        }
        if let Some(url) = lookup("TASKDECK_WS_URL") {
            config.ws_url = (!url.is_empty()).then_some(url);
        }
        if let Some(url) = lookup("TASKDECK_DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(raw) = lookup("TASKDECK_PAGE_SIZE") {
            config.page_size = parse_number("TASKDECK_PAGE_SIZE", &raw)? as usize;
            if config.page_size == 0 {
                return Err(ClientError::Config(
                    "TASKDECK_PAGE_SIZE must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(raw) = lookup("TASKDECK_PROBE_INTERVAL_MS") {
            config.probe_interval =
                Duration::from_millis(parse_number("TASKDECK_PROBE_INTERVAL_MS", &raw)?);
        }
        if let Some(raw) = lookup("TASKDECK_REQUEST_TIMEOUT_MS") {
            config.request_timeout =
                Duration::from_millis(parse_number("TASKDECK_REQUEST_TIMEOUT_MS", &raw)?);
        }

        Ok(config)
    }
}

fn parse_number(key: &str, raw: &str) -> ClientResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ClientError::Config(format!("{} = {:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.page_size, 7);
        assert_eq!(config.probe_interval, Duration::from_secs(4));
        assert_eq!(config.ws_url.as_deref(), Some(DEFAULT_WS_URL));
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TASKDECK_API_URL", "https://tasks.example.com/api"),
            ("TASKDECK_WS_URL", ""),
            ("TASKDECK_PAGE_SIZE", "20"),
            ("TASKDECK_PROBE_INTERVAL_MS", "1500"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://tasks.example.com/api");
        assert_eq!(config.ws_url, None);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.probe_interval, Duration::from_millis(1500));
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("TASKDECK_PAGE_SIZE", "seven")]))
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let err =
            ClientConfig::from_lookup(lookup(&[("TASKDECK_PAGE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
