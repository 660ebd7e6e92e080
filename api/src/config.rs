//! Exporter configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use shared::beats::{BeatOptions, DEFAULT_COUNT_INTERVAL, DEFAULT_DISTRIBUTION_INTERVAL};
use shared::config::{Target, TargetError};
use shared::executor::DEFAULT_QUERY_TIMEOUT;
use shared::github::DEFAULT_GITHUB_URL;
use shared::pagination::DEFAULT_MAX_PAGES;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9123;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but its value cannot be used.
    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The repository owner or name is invalid.
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Exporter configuration.
///
/// Configuration values can be set via environment variables:
/// - `RHYTHM_OWNER`: Repository owner (required)
/// - `RHYTHM_REPO`: Repository name (required)
/// - `GITHUB_TOKEN`: GitHub API token (required)
/// - `RHYTHM_GITHUB_URL`: GraphQL endpoint (default: `https://api.github.com/graphql`)
/// - `RHYTHM_HOST`: The host address to bind to (default: "127.0.0.1")
/// - `RHYTHM_PORT`: The port to listen on (default: 9123)
/// - `RHYTHM_QUERY_TIMEOUT_SECS`: Deadline for one query (default: 10)
/// - `RHYTHM_COUNT_INTERVAL_SECS`: Interval of count beats (default: 300)
/// - `RHYTHM_DISTRIBUTION_INTERVAL_SECS`: Interval of age and lifecycle beats (default: 3600)
/// - `RHYTHM_MAX_PAGES`: Maximum pages per paginated fetch (default: 1000)
#[derive(Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// The observed repository.
    pub target: Target,
    /// GraphQL endpoint.
    pub github_url: String,
    /// API token.
    pub github_token: String,
    /// Deadline for a single query.
    pub query_timeout: Duration,
    /// Interval of count beats.
    pub count_interval: Duration,
    /// Interval of age and lifecycle beats.
    pub distribution_interval: Duration,
    /// Maximum pages per paginated fetch.
    pub max_pages: usize,
}

impl Config {
    /// Creates a configuration for `target` with default settings.
    #[must_use]
    pub fn new(target: Target, github_token: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            target,
            github_url: DEFAULT_GITHUB_URL.to_string(),
            github_token: github_token.into(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            count_interval: DEFAULT_COUNT_INTERVAL,
            distribution_interval: DEFAULT_DISTRIBUTION_INTERVAL,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a numeric variable
    /// cannot be parsed, an interval or timeout is zero, or the target is
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let target = Target::new(required("RHYTHM_OWNER")?, required("RHYTHM_REPO")?);
        target.validate_target()?;

        let mut config = Self::new(target, required("GITHUB_TOKEN")?);

        if let Some(url) = lookup("RHYTHM_GITHUB_URL") {
            config.github_url = url;
        }
        if let Some(host) = lookup("RHYTHM_HOST") {
            config.host = host;
        }
        if let Some(port) = parse::<u16, _>(&lookup, "RHYTHM_PORT")? {
            config.port = port;
        }
        if let Some(timeout) = seconds(&lookup, "RHYTHM_QUERY_TIMEOUT_SECS")? {
            config.query_timeout = timeout;
        }
        if let Some(interval) = seconds(&lookup, "RHYTHM_COUNT_INTERVAL_SECS")? {
            config.count_interval = interval;
        }
        if let Some(interval) = seconds(&lookup, "RHYTHM_DISTRIBUTION_INTERVAL_SECS")? {
            config.distribution_interval = interval;
        }
        if let Some(max_pages) = parse::<usize, _>(&lookup, "RHYTHM_MAX_PAGES")? {
            if max_pages == 0 {
                return Err(ConfigError::Invalid {
                    name: "RHYTHM_MAX_PAGES",
                    value: max_pages.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_pages = max_pages;
        }

        Ok(config)
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "RHYTHM_HOST",
            value: addr,
            reason: e.to_string(),
        })
    }

    /// Beat tuning derived from this configuration.
    #[must_use]
    pub fn beat_options(&self) -> BeatOptions {
        BeatOptions {
            count_interval: self.count_interval,
            distribution_interval: self.distribution_interval,
            max_pages: self.max_pages,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("target", &self.target)
            .field("github_url", &self.github_url)
            .field("github_token", &"<redacted>")
            .field("query_timeout", &self.query_timeout)
            .field("count_interval", &self.count_interval)
            .field("distribution_interval", &self.distribution_interval)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn seconds<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse::<u64, _>(lookup, name)? {
        Some(0) => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        }),
        other => Ok(other.map(Duration::from_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("RHYTHM_OWNER", "grafana"),
            ("RHYTHM_REPO", "loki"),
            ("GITHUB_TOKEN", "ghp_secret"),
        ]
    }

    #[test]
    fn test_config_default_values() {
        let config = assert_ok!(Config::from_lookup(lookup(&required())));

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9123);
        assert_eq!(config.target, Target::new("grafana", "loki"));
        assert_eq!(config.github_url, "https://api.github.com/graphql");
        assert_eq!(config.query_timeout, Duration::from_secs(10));
        assert_eq!(config.count_interval, Duration::from_secs(300));
        assert_eq!(config.distribution_interval, Duration::from_secs(3600));
        assert_eq!(config.max_pages, 1000);
    }

    #[test]
    fn test_config_overrides() {
        let mut vars = required();
        vars.extend([
            ("RHYTHM_HOST", "0.0.0.0"),
            ("RHYTHM_PORT", "9999"),
            ("RHYTHM_GITHUB_URL", "http://localhost:8080/graphql"),
            ("RHYTHM_QUERY_TIMEOUT_SECS", "3"),
            ("RHYTHM_COUNT_INTERVAL_SECS", "60"),
            ("RHYTHM_DISTRIBUTION_INTERVAL_SECS", "600"),
            ("RHYTHM_MAX_PAGES", "20"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9999");
        assert_eq!(config.github_url, "http://localhost:8080/graphql");
        assert_eq!(config.query_timeout, Duration::from_secs(3));

        let options = config.beat_options();
        assert_eq!(options.count_interval, Duration::from_secs(60));
        assert_eq!(options.distribution_interval, Duration::from_secs(600));
        assert_eq!(options.max_pages, 20);
    }

    #[test]
    fn test_config_missing_required() {
        for missing in ["RHYTHM_OWNER", "RHYTHM_REPO", "GITHUB_TOKEN"] {
            let vars: Vec<_> = required()
                .into_iter()
                .filter(|(name, _)| *name != missing)
                .collect();

            let result = Config::from_lookup(lookup(&vars));
            assert!(
                matches!(result, Err(ConfigError::Missing(name)) if name == missing),
                "{missing}"
            );
        }
    }

    #[test]
    fn test_config_blank_required_is_missing() {
        let mut vars = required();
        vars[0] = ("RHYTHM_OWNER", "  ");

        let result = Config::from_lookup(lookup(&vars));
        assert!(matches!(result, Err(ConfigError::Missing("RHYTHM_OWNER"))));
    }

    #[test]
    fn test_config_invalid_port() {
        let mut vars = required();
        vars.push(("RHYTHM_PORT", "not-a-port"));

        let err = assert_err!(Config::from_lookup(lookup(&vars)));
        assert!(matches!(err, ConfigError::Invalid { name: "RHYTHM_PORT", .. }));
        assert!(err.to_string().contains("not-a-port"));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let mut vars = required();
        vars.push(("RHYTHM_COUNT_INTERVAL_SECS", "0"));

        let result = Config::from_lookup(lookup(&vars));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "RHYTHM_COUNT_INTERVAL_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_config_rejects_zero_max_pages() {
        let mut vars = required();
        vars.push(("RHYTHM_MAX_PAGES", "0"));

        let result = Config::from_lookup(lookup(&vars));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "RHYTHM_MAX_PAGES",
                ..
            })
        ));
    }

    #[test]
    fn test_config_invalid_host() {
        let mut config = Config::new(Target::new("grafana", "loki"), "token");
        config.host = "not a host".to_string();
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = Config::from_lookup(lookup(&required())).unwrap();
        let debug = format!("{config:?}");

        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("<redacted>"));
    }
}
