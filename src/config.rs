use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use tracing::warn;

use crate::constants;

/// Station configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the spreadsheet-backed tag service
    pub api_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Bounded wait for every upstream call
    pub http_timeout: Duration,
    /// Soft TTL for the tag cache; `None` disables expiry
    pub cache_ttl: Option<Duration>,
    pub cors_origins: String,
    /// Timezone used for operator-facing timestamps
    pub display_tz: Tz,
    pub nfc_read_timeout: Duration,
    /// Whether the UI offers the Deregister action
    pub offer_deregister: bool,
    /// Close the register panel after a successful save instead of staying on the row
    pub close_after_save: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("TAGS_API_URL")
            .with_context(|| "Missing environment variable: TAGS_API_URL")?;

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| constants::DEFAULT_SERVER_HOST.to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| constants::DEFAULT_SERVER_PORT.to_string())
            .parse::<u16>()
            .unwrap_or(constants::DEFAULT_SERVER_PORT);

        let http_timeout = Duration::from_secs(
            env::var("TAGS_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(constants::DEFAULT_HTTP_TIMEOUT_SECS),
        );

        // Absent or zero means the cache never goes stale on its own.
        let cache_ttl = env::var("TAGS_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let cors_origins = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

        let display_tz = match env::var("TAGS_DISPLAY_TZ") {
            Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!("⚠️  Unknown TAGS_DISPLAY_TZ '{name}', falling back to UTC");
                Tz::UTC
            }),
            Err(_) => Tz::UTC,
        };

        let nfc_read_timeout = Duration::from_secs(
            env::var("TAGS_NFC_READ_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(constants::DEFAULT_NFC_READ_TIMEOUT_SECS),
        );

        let offer_deregister = env::var("TAGS_OFFER_DEREGISTER")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let close_after_save = env::var("TAGS_CLOSE_AFTER_SAVE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        Ok(Self {
            api_url,
            server_host,
            server_port,
            http_timeout,
            cache_ttl,
            cors_origins,
            display_tz,
            nfc_read_timeout,
            offer_deregister,
            close_after_save,
        })
    }
}
