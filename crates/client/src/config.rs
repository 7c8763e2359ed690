//! Client configuration

use std::env;
use std::time::Duration;

use url::Url;

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Transport
    pub ws_url: String,
    pub stomp_host: String,
    pub disconnect_grace: Duration,

    // Ephemeral signals
    pub typing_decay: Duration,
    pub notification_decay: Duration,

    // Feature flags
    pub enable_alert_feed: bool,
}

pub const DEFAULT_WS_URL: &str = "ws://localhost/ws";
pub const DEFAULT_TYPING_DECAY_MS: u64 = 2000;
pub const DEFAULT_NOTIFICATION_DECAY_MS: u64 = 6000;
pub const DEFAULT_DISCONNECT_GRACE_MS: u64 = 1000;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url =
            env::var("SUPPORTLINK_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
        let ws_url = parse_ws_url(&raw_url)?;
        let stomp_host = env::var("SUPPORTLINK_STOMP_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| ws_url.host_str().unwrap_or("localhost").to_string());

        Ok(Self {
            ws_url: ws_url.to_string(),
            stomp_host,
            disconnect_grace: duration_ms("DISCONNECT_GRACE_MS", DEFAULT_DISCONNECT_GRACE_MS)?,
            typing_decay: duration_ms("TYPING_DECAY_MS", DEFAULT_TYPING_DECAY_MS)?,
            notification_decay: duration_ms(
                "NOTIFICATION_DECAY_MS",
                DEFAULT_NOTIFICATION_DECAY_MS,
            )?,
            enable_alert_feed: env::var("ENABLE_ALERT_FEED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            stomp_host: "localhost".to_string(),
            disconnect_grace: Duration::from_millis(DEFAULT_DISCONNECT_GRACE_MS),
            typing_decay: Duration::from_millis(DEFAULT_TYPING_DECAY_MS),
            notification_decay: Duration::from_millis(DEFAULT_NOTIFICATION_DECAY_MS),
            enable_alert_feed: true,
        }
    }
}

fn parse_ws_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        _ => Err(ConfigError::InvalidUrl(raw.to_string())),
    }
}

fn duration_ms(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let ms = match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDuration(var))?,
        Err(_) => default,
    };
    if ms == 0 {
        return Err(ConfigError::InvalidDuration(var));
    }
    Ok(Duration::from_millis(ms))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid WebSocket URL (expected ws:// or wss://): {0}")]
    InvalidUrl(String),
    #[error("Invalid duration in {0}: expected a positive number of milliseconds")]
    InvalidDuration(&'static str),
}
