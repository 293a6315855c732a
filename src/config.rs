//! Configuration types.

use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::error::ConfigError;
use crate::model::JobState;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Path of the push endpoint on the backend.
pub const WEBSOCKET_PATH: &str = "/websocket";

/// Dashboard client configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL of the REST API (e.g. `http://host:8080`).
    pub api_url: String,
    /// WebSocket push endpoint.
    pub ws_url: String,
    /// Fallback full-refresh period.
    pub refresh_interval: Duration,
    /// Delay before reconnecting after the socket closes.
    pub reconnect_delay: Duration,
    /// Delay before the first connection attempt.
    pub initial_connect_delay: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Only fetch jobs in these states. Empty fetches everything.
    pub job_states: Vec<JobState>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: format!("ws://localhost:8080{WEBSOCKET_PATH}"),
            refresh_interval: Duration::from_secs(180), // 3 minutes
            reconnect_delay: Duration::from_secs(15),
            initial_connect_delay: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            job_states: Vec::new(),
        }
    }
}

impl DashboardConfig {
    /// Build a config for `api_url`, deriving the socket URL from it.
    pub fn for_api_url(api_url: &str) -> Result<Self, ConfigError> {
        let ws_url = derive_ws_url(api_url)?;
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            ws_url,
            ..Self::default()
        })
    }

    /// Load configuration from `JOBDASH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `JOBDASH_*` keys resolved through `lookup`.
    ///
    /// Unparsable or zero durations fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("JOBDASH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let mut config = Self::for_api_url(&api_url)?;

        if let Some(ws_url) = lookup("JOBDASH_WS_URL") {
            config.ws_url = ws_url;
        }

        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|raw| parse_secs(key, &raw))
                .unwrap_or(default)
        };
        config.refresh_interval = secs("JOBDASH_REFRESH_INTERVAL_SECS", config.refresh_interval);
        config.reconnect_delay = secs("JOBDASH_RECONNECT_DELAY_SECS", config.reconnect_delay);
        config.initial_connect_delay = secs(
            "JOBDASH_INITIAL_CONNECT_DELAY_SECS",
            config.initial_connect_delay,
        );
        config.http_timeout = secs("JOBDASH_HTTP_TIMEOUT_SECS", config.http_timeout);

        if let Some(states) = lookup("JOBDASH_JOB_STATES") {
            config.job_states = parse_states(&states)?;
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            warn!(key, "Zero duration not allowed, using default");
            None
        }
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warn!(key, value = raw, error = %e, "Unparsable duration, using default");
            None
        }
    }
}

/// Parse a comma- or pipe-separated list of job states.
pub fn parse_states(raw: &str) -> Result<Vec<JobState>, ConfigError> {
    raw.split([',', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<JobState>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "JOBDASH_JOB_STATES".into(),
                    message,
                })
        })
        .collect()
}

/// `http://host:port/...` becomes `ws://host:port/websocket`, `https` becomes `wss`.
pub fn derive_ws_url(api_url: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "JOBDASH_API_URL".into(),
        message,
    };

    let url = Url::parse(api_url).map_err(|e| invalid(format!("{api_url}: {e}")))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    let host = url
        .host_str()
        .ok_or_else(|| invalid(format!("{api_url} has no host")))?;

    Ok(match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}{WEBSOCKET_PATH}"),
        None => format!("{scheme}://{host}{WEBSOCKET_PATH}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_timers() {
        let config = DashboardConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(180));
        assert_eq!(config.reconnect_delay, Duration::from_secs(15));
        assert_eq!(config.initial_connect_delay, Duration::from_secs(5));
        assert!(config.job_states.is_empty());
    }

    #[test]
    fn ws_url_follows_api_scheme() {
        assert_eq!(
            derive_ws_url("http://scheduler:9000").unwrap(),
            "ws://scheduler:9000/websocket"
        );
        assert_eq!(
            derive_ws_url("https://jobs.example.com/api").unwrap(),
            "wss://jobs.example.com/websocket"
        );
    }

    #[test]
    fn ws_url_rejects_bad_input() {
        assert!(derive_ws_url("not a url").is_err());
        assert!(derive_ws_url("ftp://host").is_err());
    }

    #[test]
    fn for_api_url_trims_trailing_slash() {
        let config = DashboardConfig::for_api_url("http://127.0.0.1:4000/").unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:4000");
        assert_eq!(config.ws_url, "ws://127.0.0.1:4000/websocket");
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn env_overrides_apply() {
        let config = DashboardConfig::from_lookup(lookup(&[
            ("JOBDASH_API_URL", "https://sched.internal:8443"),
            ("JOBDASH_REFRESH_INTERVAL_SECS", "60"),
            ("JOBDASH_RECONNECT_DELAY_SECS", " 3 "),
            ("JOBDASH_INITIAL_CONNECT_DELAY_SECS", "1"),
            ("JOBDASH_HTTP_TIMEOUT_SECS", "10"),
            ("JOBDASH_JOB_STATES", "running|paused"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://sched.internal:8443");
        assert_eq!(config.ws_url, "wss://sched.internal:8443/websocket");
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.initial_connect_delay, Duration::from_secs(1));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.job_states, vec![JobState::Running, JobState::Paused]);
    }

    #[test]
    fn explicit_ws_url_wins() {
        let config = DashboardConfig::from_lookup(lookup(&[(
            "JOBDASH_WS_URL",
            "ws://push.internal/websocket",
        )]))
        .unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ws_url, "ws://push.internal/websocket");
    }

    #[test]
    fn bad_or_zero_durations_fall_back_to_defaults() {
        let defaults = DashboardConfig::default();
        let config = DashboardConfig::from_lookup(lookup(&[
            ("JOBDASH_REFRESH_INTERVAL_SECS", "0"),
            ("JOBDASH_RECONNECT_DELAY_SECS", "soon"),
            ("JOBDASH_INITIAL_CONNECT_DELAY_SECS", "-5"),
            ("JOBDASH_HTTP_TIMEOUT_SECS", ""),
        ]))
        .unwrap();

        assert_eq!(config.refresh_interval, defaults.refresh_interval);
        assert_eq!(config.reconnect_delay, defaults.reconnect_delay);
        assert_eq!(config.initial_connect_delay, defaults.initial_connect_delay);
        assert_eq!(config.http_timeout, defaults.http_timeout);
    }

    #[test]
    fn invalid_env_values_are_errors() {
        assert!(DashboardConfig::from_lookup(lookup(&[("JOBDASH_API_URL", "nope")])).is_err());
        assert!(DashboardConfig::from_lookup(lookup(&[("JOBDASH_JOB_STATES", "DONE")])).is_err());
    }

    #[test]
    fn parses_state_filter() {
        let states = parse_states("RUNNING|paused, QUEUED").unwrap();
        assert_eq!(
            states,
            vec![JobState::Running, JobState::Paused, JobState::Queued]
        );
        assert!(parse_states("RUNNING,BOGUS").is_err());
        assert!(parse_states("").unwrap().is_empty());
    }
}
