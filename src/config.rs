//! Connection settings supplied by the host process

use crate::constants::*;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Reconnect delay parameters for the event supervisor.
///
/// Delay for attempt `n` (1-based) is `initial * multiplier^(n-1)`, capped
/// at `max`. A multiplier of `1.0` gives a fixed delay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_BACKOFF_INITIAL_MS,
            max_ms: DEFAULT_BACKOFF_MAX_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl BackoffConfig {
    /// Same delay before every attempt
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            initial_ms: ms,
            max_ms: ms,
            multiplier: 1.0,
        }
    }
}

/// Everything needed to reach one FreeSWITCH ESL listener.
///
/// Deserializable from any serde format; every field has a default so a
/// partial document (just `host` and `password`, say) is enough.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EslConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Bound on TCP connect plus the auth handshake
    pub connect_timeout_ms: u64,
    /// Default deadline for one `api` reply
    pub command_timeout_ms: u64,
    /// Largest frame (header block plus body) accepted before tearing the connection down
    pub max_frame_size: usize,
    /// Event names the supervised event channel subscribes to
    pub events: Vec<String>,
    pub backoff: BackoffConfig,
}

impl Default for EslConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_ESL_PORT,
            password: DEFAULT_ESL_PASSWORD.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            max_frame_size: MAX_FRAME_SIZE,
            events: DEFAULT_CALL_EVENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl EslConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

// Hand-written so the shared secret never reaches a log line
impl fmt::Debug for EslConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EslConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .field("max_frame_size", &self.max_frame_size)
            .field("events", &self.events)
            .field("backoff", &self.backoff)
            .finish()
    }
}
