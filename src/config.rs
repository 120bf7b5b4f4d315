// src/config.rs

// 🌍 Standard library
use std::str::FromStr;
use std::time::Duration;

// 📦 External crates
use thiserror::Error;
use url::Url;

const DEFAULT_APP_ID: &str = "1089";
const DEFAULT_HOST: &str = "red.derivws.com";
const DEFAULT_LANGUAGE: &str = "EN";
const DEFAULT_BRAND: &str = "deriv";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TICK_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid venue URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Venue connection settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueConfig {
    pub app_id: String,
    pub host: String,
    pub language: String,
    pub brand: String,
    pub request_timeout: Duration,
    /// How long the demo binary streams ticks before unsubscribing.
    pub tick_seconds: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            host: DEFAULT_HOST.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            brand: DEFAULT_BRAND.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            tick_seconds: DEFAULT_TICK_SECONDS,
        }
    }
}

impl VenueConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: String| lookup(key).unwrap_or(default);

        let request_timeout_secs = parse_or(
            "DERIV_REQUEST_TIMEOUT_SECS",
            lookup("DERIV_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DERIV_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            app_id: text("DERIV_APP_ID", defaults.app_id),
            host: text("DERIV_WS_HOST", defaults.host),
            language: text("DERIV_LANGUAGE", defaults.language),
            brand: text("DERIV_BRAND", defaults.brand),
            request_timeout: Duration::from_secs(request_timeout_secs),
            tick_seconds: parse_or(
                "DERIV_TICK_SECONDS",
                lookup("DERIV_TICK_SECONDS"),
                DEFAULT_TICK_SECONDS,
            )?,
        })
    }

    /// `wss://<host>/websockets/v3?app_id=..&l=..&brand=..`
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&format!("wss://{}/websockets/v3", self.host))?;
        url.query_pairs_mut()
            .append_pair("app_id", &self.app_id)
            .append_pair("l", &self.language)
            .append_pair("brand", &self.brand);
        Ok(url)
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
