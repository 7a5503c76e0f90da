use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Project URL of the hosted backend (DOCDESK_SERVICE_URL)
    pub service_url: Option<Url>,
    /// Public API key sent with every request (DOCDESK_ANON_KEY)
    pub anon_key: Option<String>,
    /// Where sign-up verification emails send the user (DOCDESK_EMAIL_REDIRECT_URL)
    pub email_redirect_url: Option<String>,
    /// Per-request timeout (DOCDESK_REQUEST_TIMEOUT_SECS, default: 30)
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            anon_key: None,
            email_redirect_url: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables, reading `.env` first
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let service_url = non_empty("DOCDESK_SERVICE_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { value: raw, source })
            })
            .transpose()?;

        let request_timeout = match non_empty("DOCDESK_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                if secs == 0 {
                    return Err(ConfigError::InvalidTimeout(raw));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(ServiceConfig {
            service_url,
            anon_key: non_empty("DOCDESK_ANON_KEY"),
            email_redirect_url: non_empty("DOCDESK_EMAIL_REDIRECT_URL"),
            request_timeout,
        })
    }

    /// Check if the hosted backend is configured
    pub fn is_remote_configured(&self) -> bool {
        self.service_url.is_some() && self.anon_key.is_some()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid DOCDESK_SERVICE_URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid DOCDESK_REQUEST_TIMEOUT_SECS '{0}': expected a positive number of seconds")]
    InvalidTimeout(String),
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert!(!config.is_remote_configured());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn full_environment_is_remote() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("DOCDESK_SERVICE_URL", "https://abc.example.co"),
            ("DOCDESK_ANON_KEY", " anon-key "),
            ("DOCDESK_EMAIL_REDIRECT_URL", "https://app.example.com/auth/callback"),
            ("DOCDESK_REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert!(config.is_remote_configured());
        assert_eq!(config.anon_key.as_deref(), Some("anon-key"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("DOCDESK_SERVICE_URL", "https://abc.example.co"),
            ("DOCDESK_ANON_KEY", "   "),
        ]))
        .unwrap();
        assert!(!config.is_remote_configured());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("DOCDESK_SERVICE_URL", "not a url")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("DOCDESK_REQUEST_TIMEOUT_SECS", "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("DOCDESK_REQUEST_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
