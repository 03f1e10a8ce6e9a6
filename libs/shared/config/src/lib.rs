use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_REALTIME_URL: &str = "ws://localhost:8080/ws/websocket";
const DEFAULT_TOPIC_PREFIX: &str = "/topic/queue-updates/";
const DEFAULT_TOKEN_PATH: &str = ".queue-token";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_base_url: String,
    pub realtime_url: String,
    pub topic_prefix: String,
    pub token_path: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub reconnect_initial_backoff: Duration,
    pub reconnect_max_backoff: Duration,
    pub reconnect_max_attempts: Option<u32>,
    pub completion_pending_timeout: Duration,
    pub token_poll_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            backend_base_url: env::var("QUEUE_BACKEND_URL")
                .unwrap_or_else(|_| {
                    warn!("QUEUE_BACKEND_URL not set, using default");
                    DEFAULT_BACKEND_URL.to_string()
                }),
            realtime_url: env::var("QUEUE_REALTIME_URL")
                .unwrap_or_else(|_| {
                    warn!("QUEUE_REALTIME_URL not set, using default");
                    DEFAULT_REALTIME_URL.to_string()
                }),
            topic_prefix: env::var("QUEUE_TOPIC_PREFIX")
                .unwrap_or_else(|_| DEFAULT_TOPIC_PREFIX.to_string()),
            token_path: env::var("QUEUE_TOKEN_PATH")
                .unwrap_or_else(|_| DEFAULT_TOKEN_PATH.to_string()),
            request_timeout: Duration::from_secs(parse_var("QUEUE_REQUEST_TIMEOUT_SECS", 15)),
            connect_timeout: Duration::from_secs(parse_var("QUEUE_CONNECT_TIMEOUT_SECS", 10)),
            reconnect_initial_backoff: Duration::from_millis(parse_var("QUEUE_RECONNECT_INITIAL_MS", 1_000)),
            reconnect_max_backoff: Duration::from_millis(parse_var("QUEUE_RECONNECT_MAX_MS", 10_000)),
            reconnect_max_attempts: parse_optional_var("QUEUE_RECONNECT_MAX_ATTEMPTS"),
            completion_pending_timeout: Duration::from_secs(parse_var("QUEUE_COMPLETION_PENDING_SECS", 15)),
            token_poll_interval: Duration::from_millis(parse_var("QUEUE_TOKEN_POLL_MS", 1_000)),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - backend or realtime URL is empty");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.backend_base_url.is_empty() && !self.realtime_url.is_empty()
    }

    /// Destination of the queue channel for one doctor.
    pub fn topic_for(&self, channel_id: &str) -> String {
        format!("{}{}", self.topic_prefix, channel_id)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_base_url: DEFAULT_BACKEND_URL.to_string(),
            realtime_url: DEFAULT_REALTIME_URL.to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            reconnect_initial_backoff: Duration::from_millis(1_000),
            reconnect_max_backoff: Duration::from_millis(10_000),
            reconnect_max_attempts: None,
            completion_pending_timeout: Duration::from_secs(15),
            token_poll_interval: Duration::from_millis(1_000),
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_optional_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has invalid value '{}', ignoring", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_configured() {
        let config = AppConfig::default();
        assert!(config.is_configured());
        assert_eq!(config.reconnect_max_attempts, None);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_topic_for_channel() {
        let config = AppConfig::default();
        assert_eq!(config.topic_for("42"), "/topic/queue-updates/42");
    }

    #[test]
    fn test_empty_urls_are_not_configured() {
        let config = AppConfig {
            realtime_url: String::new(),
            ..AppConfig::default()
        };
        assert!(!config.is_configured());
    }
}
