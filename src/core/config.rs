/// Server Configuration
///
/// All settings come from environment variables, read once at startup.
/// Every variable has a default, so an empty environment gives a working
/// local server.
///
/// Environment Variables:
/// - SERVER_NAME: Name reported by initialize (default: "host-bridge-mcp")
/// - SERVER_VERSION: Version reported by initialize (default: crate version)
/// - HOST: Bind address (default: "127.0.0.1")
/// - PORT: Port number (default: 9100)
/// - WORKER_THREADS: HTTP worker threads (default: CPU count, max 16)
/// - TASK_TIMEOUT_SECS: How long a caller waits for the host thread (default: 30)
/// - HOST_POLL_INTERVAL_MS: Host loop wake-up interval when idle (default: 50)
/// - MAX_BODY_BYTES: Largest accepted request body (default: 4 MiB)
/// - LOG_FORMAT: "text" or "json" (default: "text")
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::ConfigError;

/// Log output format, selected by LOG_FORMAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines (default)
    Text,
    /// One JSON object per event
    Json,
}

/// Settings for the listener, the bridge and the host loop.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name as reported in MCP initialize responses
    pub name: String,
    /// Server version string as reported in MCP initialize responses
    pub version: String,
    /// Bind address (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// Port number to listen on
    pub port: u16,
    /// HTTP worker threads, between 1 and 16
    pub workers: usize,
    /// How long a caller waits for a host-bound handler
    pub task_timeout: Duration,
    /// Longest the host loop sleeps without being woken
    pub poll_interval: Duration,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "host-bridge-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: "127.0.0.1".to_string(),
            port: 9100,
            workers: default_workers(),
            task_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            max_body_bytes: 4 * 1024 * 1024,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        let workers: usize = parse_or(&lookup, "WORKER_THREADS", defaults.workers)?;

        Ok(Self {
            name: lookup("SERVER_NAME").unwrap_or(defaults.name),
            version: lookup("SERVER_VERSION").unwrap_or(defaults.version),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            workers: workers.clamp(1, 16),
            task_timeout: Duration::from_secs(parse_or(&lookup, "TASK_TIMEOUT_SECS", 30)?),
            poll_interval: Duration::from_millis(parse_or(&lookup, "HOST_POLL_INTERVAL_MS", 50)?),
            max_body_bytes: parse_or(&lookup, "MAX_BODY_BYTES", defaults.max_body_bytes)?,
            log_format,
        })
    }

    /// `host:port` for `HttpServer::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Defaults to CPU count but capped at 16 to avoid excessive context switching
fn default_workers() -> usize {
    num_cpus::get().clamp(1, 16)
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
