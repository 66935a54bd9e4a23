use std::fmt;

use crate::utils::error::ConnectionError;

const SCHEME_PREFIXES: [&str; 2] = ["ws://", "tcp://"];

/// Everything needed to open a session: where the broker is and who we are.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionProperties {
    host: String,
    vpn: String,
    username: String,
    password: Option<String>,
}

impl SessionProperties {
    /// `host` is `host:port`, optionally prefixed with `ws://` or `tcp://`.
    pub fn new(host: impl Into<String>, vpn: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            vpn: vpn.into(),
            username: username.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn vpn(&self) -> &str {
        &self.vpn
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Splits the endpoint into host and port.
    pub fn endpoint(&self) -> Result<(String, u16), ConnectionError> {
        let invalid = |reason: &str| ConnectionError::InvalidEndpoint {
            endpoint: self.host.clone(),
            reason: reason.to_string(),
        };

        let trimmed = SCHEME_PREFIXES
            .iter()
            .find_map(|prefix| self.host.strip_prefix(*prefix))
            .unwrap_or(self.host.as_str())
            .trim_end_matches('/');

        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok((host.to_string(), port))
    }

    /// WebSocket URL of the broker.
    pub fn url(&self) -> Result<String, ConnectionError> {
        let (host, port) = self.endpoint()?;
        Ok(format!("ws://{host}:{port}/"))
    }
}

impl fmt::Debug for SessionProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionProperties")
            .field("host", &self.host)
            .field("vpn", &self.vpn)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
