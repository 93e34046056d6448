use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const API_BASE_URL_VAR: &str = "LMS_API_BASE_URL";
pub const API_TOKEN_VAR: &str = "LMS_API_TOKEN";
pub const CACHE_DB_URL_VAR: &str = "LMS_CACHE_DB_URL";
pub const POLL_INTERVAL_VAR: &str = "LMS_POLL_INTERVAL_SECS";
pub const HTTP_TIMEOUT_VAR: &str = "LMS_HTTP_TIMEOUT_SECS";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_CACHE_DB_URL: &str = "sqlite://lms-cache.sqlite3";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the LMS API and the local cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub api_token: Option<String>,
    pub cache_db_url: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl ClientConfig {
    /// Read settings from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base = read(API_BASE_URL_VAR).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Ok(Self {
            api_base_url: parse_base_url(API_BASE_URL_VAR, &base)?,
            api_token: read(API_TOKEN_VAR),
            cache_db_url: read(CACHE_DB_URL_VAR)
                .unwrap_or_else(|| DEFAULT_CACHE_DB_URL.to_string()),
            poll_interval: read(POLL_INTERVAL_VAR)
                .map(|raw| parse_secs(POLL_INTERVAL_VAR, &raw))
                .transpose()?
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            http_timeout: read(HTTP_TIMEOUT_VAR)
                .map(|raw| parse_secs(HTTP_TIMEOUT_VAR, &raw))
                .transpose()?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        })
    }

    /// Replace the API base URL, e.g. from a command-line flag.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `raw` does not parse.
    pub fn with_api_base_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_base_url = parse_base_url(API_BASE_URL_VAR, raw)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_cache_db_url(mut self, db: impl Into<String>) -> Self {
        self.cache_db_url = db.into();
        self
    }

    /// Use the token saved with the last sign-in when none is configured.
    ///
    /// An explicitly configured token always wins; a blank saved token is
    /// ignored.
    #[must_use]
    pub fn with_saved_token(mut self, saved: Option<&str>) -> Self {
        if self.api_token.is_none() {
            self.api_token = saved
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
        }
        self
    }
}

/// Parse and normalize a base URL so joined paths keep its last segment.
fn parse_base_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_secs(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8080/api/v1/");
        assert_eq!(config.cache_db_url, DEFAULT_CACHE_DB_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn reads_overrides_and_ignores_blank_token() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_BASE_URL_VAR, "https://lms.example.com/api/v1"),
            (API_TOKEN_VAR, "   "),
            (POLL_INTERVAL_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://lms.example.com/api/v1/");
        assert!(config.api_token.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn saved_token_fills_in_only_when_unconfigured() {
        let unset = ClientConfig::from_lookup(lookup(&[])).unwrap();
        let restored = unset.clone().with_saved_token(Some("saved-token"));
        assert_eq!(restored.api_token.as_deref(), Some("saved-token"));
        assert!(unset.clone().with_saved_token(Some("  ")).api_token.is_none());
        assert!(unset.with_saved_token(None).api_token.is_none());

        let configured = ClientConfig::from_lookup(lookup(&[(API_TOKEN_VAR, "env-token")]))
            .unwrap()
            .with_saved_token(Some("saved-token"));
        assert_eq!(configured.api_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = ClientConfig::from_lookup(lookup(&[(API_BASE_URL_VAR, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = ClientConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_VAR, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }
}
