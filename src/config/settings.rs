use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the client.
///
/// Includes settings for the session, the reconnection policy and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub session: SessionSettings,
    pub reconnect: ReconnectSettings,
    pub logging: LoggingSettings,
}

/// Timeouts applied to a single session.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub connect_timeout_ms: u64,
    pub subscribe_timeout_ms: u64,
}

impl SessionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }
}

/// Reconnection policy used after transport loss.
///
/// `max_attempts = 0` disables reconnection.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ReconnectSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub session: Option<PartialSessionSettings>,
    pub reconnect: Option<PartialReconnectSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSessionSettings {
    pub connect_timeout_ms: Option<u64>,
    pub subscribe_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialReconnectSettings {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let session = self.session.unwrap_or_default();
        let reconnect = self.reconnect.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            session: SessionSettings {
                connect_timeout_ms: session
                    .connect_timeout_ms
                    .unwrap_or(defaults.session.connect_timeout_ms),
                subscribe_timeout_ms: session
                    .subscribe_timeout_ms
                    .unwrap_or(defaults.session.subscribe_timeout_ms),
            },
            reconnect: ReconnectSettings {
                max_attempts: reconnect
                    .max_attempts
                    .unwrap_or(defaults.reconnect.max_attempts),
                initial_backoff_ms: reconnect
                    .initial_backoff_ms
                    .unwrap_or(defaults.reconnect.initial_backoff_ms),
                max_backoff_ms: reconnect
                    .max_backoff_ms
                    .unwrap_or(defaults.reconnect.max_backoff_ms),
                multiplier: reconnect
                    .multiplier
                    .unwrap_or(defaults.reconnect.multiplier),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            session: SessionSettings {
                connect_timeout_ms: 5_000,
                subscribe_timeout_ms: 10_000,
            },
            reconnect: ReconnectSettings {
                max_attempts: 3,
                initial_backoff_ms: 3_000,
                max_backoff_ms: 30_000,
                multiplier: 2.0,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
