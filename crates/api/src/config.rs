use avatar_core::config::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:7860";
/// Generations routinely take tens of minutes on a single GPU.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 7200;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for the worker container.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `7860`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `7200`).
    pub request_timeout_secs: u64,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            json_logs: false,
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `7860`                  |
    /// | `CORS_ORIGINS`         | `http://localhost:7860` |
    /// | `REQUEST_TIMEOUT_SECS` | `7200`                  |
    /// | `LOG_FORMAT`           | `text` (`json` to switch)|
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("HOST") {
            config.host = v.trim().to_string();
        }
        if let Some(v) = get("PORT") {
            config.port = v.trim().parse().map_err(|_| ConfigError {
                key: "PORT",
                expected: "a valid port number",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("CORS_ORIGINS") {
            config.cors_origins = split_origins(&v);
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v.trim().parse().map_err(|_| ConfigError {
                key: "REQUEST_TIMEOUT_SECS",
                expected: "a whole number of seconds",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.json_logs = v.trim().eq_ignore_ascii_case("json");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7860);
        assert_eq!(config.request_timeout_secs, 7200);
        assert_eq!(config.cors_origins, vec!["http://localhost:7860"]);
        assert!(!config.json_logs);
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = ServerConfig::from_lookup(lookup(&[(
            "CORS_ORIGINS",
            "http://a.test, http://b.test ,,",
        )]))
        .expect("config");
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn json_log_format() {
        let config =
            ServerConfig::from_lookup(lookup(&[("LOG_FORMAT", "JSON")])).expect("config");
        assert!(config.json_logs);
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = ServerConfig::from_lookup(lookup(&[("PORT", "99999")]));
        assert_matches!(result, Err(ConfigError { key: "PORT", .. }));
    }
}
