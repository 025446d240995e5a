//! Runtime configuration
//!
//! Required settings come from the environment and are validated once at
//! startup via [`Config::from_env`]; a missing or malformed value is a fatal
//! startup error. Tunables that never change at runtime live in the const
//! sub-modules below.

use std::collections::HashSet;
use std::env;

use anyhow::{Context, Result};
use url::Url;

/// Log file path for the combined (terminal + file) logger
pub const LOG_FILE_PATH: &str = "ecotrack-bot.log";

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the EcoTrack API, e.g. `https://app.ecotrack.dz`
    pub ecotrack_base_url: Url,
    /// Bearer token for the EcoTrack API
    pub ecotrack_api_key: String,
    /// Port for the lookup API + web form static server
    pub port: u16,
    /// Public URL of the web form, shown as a Telegram Web App button.
    /// When unset the /start keyboard is omitted.
    pub web_app_url: Option<Url>,
    /// Telegram user ids allowed to interact with the bot.
    /// Empty set means unrestricted access.
    pub allowed_user_ids: HashSet<u64>,
}

impl Config {
    /// Reads and validates configuration from the environment.
    ///
    /// # Errors
    /// Returns an error naming the offending variable when a required value
    /// is missing or cannot be parsed. The caller is expected to abort.
    pub fn from_env() -> Result<Self> {
        // teloxide reads the token itself, but we want the failure at
        // startup rather than on the first API call.
        env::var("TELOXIDE_TOKEN").context("TELOXIDE_TOKEN is required")?;

        let ecotrack_base_url = env::var("ECOTRACK_BASE_URL")
            .context("ECOTRACK_BASE_URL is required")
            .and_then(|raw| Url::parse(&raw).context("ECOTRACK_BASE_URL must be a valid URL"))?;

        let ecotrack_api_key = env::var("ECOTRACK_API_KEY").context("ECOTRACK_API_KEY is required")?;
        if ecotrack_api_key.len() < 10 {
            anyhow::bail!("ECOTRACK_API_KEY looks truncated (shorter than 10 characters)");
        }

        let port = match env::var("PORT") {
            Ok(raw) => raw.parse::<u16>().context("PORT must be a number between 1 and 65535")?,
            Err(_) => 3000,
        };

        let web_app_url = match env::var("WEB_APP_URL") {
            Ok(raw) => Some(Url::parse(&raw).context("WEB_APP_URL must be a valid URL")?),
            Err(_) => None,
        };

        let allowed_user_ids = parse_allowed_ids(env::var("ALLOWED_USER_IDS").ok().as_deref());

        Ok(Self {
            ecotrack_base_url,
            ecotrack_api_key,
            port,
            web_app_url,
            allowed_user_ids,
        })
    }

    /// Logs a short configuration summary at startup (secrets truncated).
    pub fn log_summary(&self) {
        log::info!("EcoTrack base URL: {}", self.ecotrack_base_url);
        log::info!(
            "EcoTrack API key: {}...",
            &self.ecotrack_api_key[..5.min(self.ecotrack_api_key.len())]
        );
        log::info!("Web server port: {}", self.port);
        match &self.web_app_url {
            Some(url) => log::info!("Web App URL: {}", url),
            None => log::info!("Web App URL: not configured"),
        }
        if self.allowed_user_ids.is_empty() {
            log::warn!("Bot access is not restricted. ALLOWED_USER_IDS is not set.");
        } else {
            log::info!("Bot access is restricted to {} user(s).", self.allowed_user_ids.len());
        }
    }
}

/// Parses the comma-separated `ALLOWED_USER_IDS` value, skipping blanks and
/// garbage entries.
fn parse_allowed_ids(raw: Option<&str>) -> HashSet<u64> {
    raw.unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

/// Cache TTL configuration
pub mod cache {
    use std::time::Duration;

    /// TTL for the wilaya and commune reference lists (in seconds)
    pub const LOOKUP_TTL_SECS: u64 = 3600;

    /// TTL for per-tracking status snapshots (in seconds)
    pub const TRACKING_TTL_SECS: u64 = 30;

    /// Lookup cache TTL duration
    pub fn lookup_ttl() -> Duration {
        Duration::from_secs(LOOKUP_TTL_SECS)
    }

    /// Tracking snapshot TTL duration
    pub fn tracking_ttl() -> Duration {
        Duration::from_secs(TRACKING_TTL_SECS)
    }
}

/// Network configuration
pub mod network {
    use std::time::Duration;

    /// Request timeout for EcoTrack API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 10;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Chat-surface limits
pub mod ui {
    /// Wilayas shown per inline-keyboard page
    pub const WILAYA_PAGE_SIZE: usize = 10;

    /// Communes shown as inline buttons after wilaya selection
    pub const COMMUNE_BUTTON_LIMIT: usize = 10;

    /// Maximum rendered length of one reply block. Telegram caps messages at
    /// 4096 chars; we stay below to leave room for separators.
    pub const MAX_MESSAGE_CHARS: usize = 3500;

    /// Maximum length of a tracking note accepted by /update
    pub const MAX_NOTE_CHARS: usize = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_allowed_ids() {
        let ids = parse_allowed_ids(Some("123, 456,,abc, 789"));
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&123));
        assert!(ids.contains(&456));
        assert!(ids.contains(&789));
    }

    #[test]
    fn test_parse_allowed_ids_empty() {
        assert!(parse_allowed_ids(None).is_empty());
        assert!(parse_allowed_ids(Some("")).is_empty());
        assert!(parse_allowed_ids(Some(" , ")).is_empty());
    }
}
