//! Client sessions
//!
//! A [`Session`] is a cheap handle onto a background driver task. Every
//! operation is marshaled to that task, which owns the connection, the
//! subscription registry and the user callbacks. Callbacks therefore never
//! run concurrently with each other or with subscription bookkeeping.

mod command;
mod driver;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::connection::SessionProperties;
use crate::dispatch::{HandlerError, InboundMessage, MessageHandler, NoopHandler};
use crate::events::{EventObserver, NoopObserver, SessionEvent, SessionState};
use crate::subscription::{Subscription, TopicPattern, validate_topic};
use crate::transport::websocket;
use crate::utils::error::{ConnectionError, PublishError, SubscribeError};
use command::Command;
use driver::Driver;

/// The message handler and event observer a session reports to.
pub struct SessionCallbacks {
    handler: Box<dyn MessageHandler>,
    observer: Box<dyn EventObserver>,
}

impl Default for SessionCallbacks {
    fn default() -> Self {
        Self {
            handler: Box::new(NoopHandler),
            observer: Box::new(NoopObserver),
        }
    }
}

impl SessionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_observer(mut self, observer: impl EventObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Closure form of [`with_handler`](Self::with_handler).
    pub fn on_message<F>(self, f: F) -> Self
    where
        F: FnMut(&InboundMessage) -> Result<(), HandlerError> + Send + 'static,
    {
        self.with_handler(f)
    }

    /// Closure form of [`with_observer`](Self::with_observer).
    pub fn on_event<F>(self, f: F) -> Self
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        self.with_observer(f)
    }
}

/// A live connection to a broker.
///
/// Dropping the handle disconnects the session in the background; call
/// [`disconnect`](Session::disconnect) to wait for it instead.
pub struct Session {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    driver: Option<JoinHandle<()>>,
    subscribe_timeout: Duration,
}

impl Session {
    /// Connects and logs in, bounded by the configured connect timeout.
    ///
    /// On success the session is `Connected` and the observer receives
    /// `SessionEvent::Connected` before anything else.
    pub async fn connect(
        props: SessionProperties,
        callbacks: SessionCallbacks,
        settings: &Settings,
    ) -> Result<Self, ConnectionError> {
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let endpoint = props.host().to_string();
        info!(%endpoint, vpn = props.vpn(), username = props.username(), "connecting session");

        let stream = websocket::open(&props, settings.session.connect_timeout()).await?;
        state_tx.send_replace(SessionState::Connected);

        let (commands, rx) = mpsc::unbounded_channel();
        let driver = Driver::new(props, settings, stream, rx, state_tx, callbacks);
        let handle = tokio::spawn(driver.run());
        info!(%endpoint, "session connected");

        Ok(Self {
            endpoint,
            commands,
            state: state_rx,
            driver: Some(handle),
            subscribe_timeout: settings.session.subscribe_timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Subscribes to `pattern`.
    ///
    /// With `wait_for_confirm`, blocks until the broker confirms or the
    /// subscribe timeout elapses. A timeout leaves the session connected and
    /// the subscription recorded as unconfirmed. Without it, returns as soon
    /// as the request is on the wire with the subscription still pending.
    pub async fn subscribe(
        &self,
        pattern: &str,
        wait_for_confirm: bool,
    ) -> Result<Subscription, SubscribeError> {
        let pattern = parse_pattern(pattern)?;
        self.ensure_connected()?;

        let correlation_id = Uuid::new_v4().to_string();
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            pattern,
            correlation_id: correlation_id.clone(),
            wait_for_confirm,
            reply,
        })?;
        self.await_confirm(rx, correlation_id, wait_for_confirm)
            .await
    }

    /// Removes the subscription for `pattern` once the broker acknowledges it.
    pub async fn unsubscribe(
        &self,
        pattern: &str,
        wait_for_confirm: bool,
    ) -> Result<(), SubscribeError> {
        let pattern = parse_pattern(pattern)?;
        self.ensure_connected()?;

        let correlation_id = Uuid::new_v4().to_string();
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unsubscribe {
            pattern,
            correlation_id: correlation_id.clone(),
            wait_for_confirm,
            reply,
        })?;
        self.await_confirm(rx, correlation_id, wait_for_confirm)
            .await
    }

    /// Publishes `payload` to a concrete topic.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<String>,
    ) -> Result<(), PublishError> {
        validate_topic(topic).map_err(|source| PublishError::InvalidTopic {
            topic: topic.to_string(),
            source,
        })?;
        match self.state() {
            SessionState::Connected => {}
            SessionState::Disconnected => return Err(PublishError::SessionClosed),
            _ => return Err(PublishError::NotConnected),
        }

        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                topic: topic.to_string(),
                payload: payload.into(),
                reply,
            })
            .map_err(|_| PublishError::SessionClosed)?;
        rx.await.unwrap_or(Err(PublishError::SessionClosed))
    }

    /// The current subscriptions, ordered by pattern.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Snapshot { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Closes the connection and waits for the driver to finish.
    ///
    /// Outstanding confirmations fail with `SubscribeError::SessionClosed`
    /// and the observer receives `SessionEvent::Disconnected`.
    pub async fn disconnect(mut self) {
        let _ = self.commands.send(Command::Disconnect);
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                error!(endpoint = %self.endpoint, error = %e, "session driver failed");
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), SubscribeError> {
        match self.state() {
            SessionState::Connected => Ok(()),
            SessionState::Disconnected => Err(SubscribeError::SessionClosed),
            SessionState::Connecting | SessionState::Reconnecting => {
                Err(SubscribeError::NotConnected)
            }
        }
    }

    fn send(&self, cmd: Command) -> Result<(), SubscribeError> {
        self.commands
            .send(cmd)
            .map_err(|_| SubscribeError::SessionClosed)
    }

    async fn await_confirm<T>(
        &self,
        rx: oneshot::Receiver<Result<T, SubscribeError>>,
        correlation_id: String,
        wait_for_confirm: bool,
    ) -> Result<T, SubscribeError> {
        if !wait_for_confirm {
            return rx.await.unwrap_or(Err(SubscribeError::SessionClosed));
        }

        match timeout(self.subscribe_timeout, rx).await {
            Ok(result) => result.unwrap_or(Err(SubscribeError::SessionClosed)),
            Err(_) => {
                warn!(%correlation_id, timeout = ?self.subscribe_timeout, "no confirmation from broker");
                let _ = self.commands.send(Command::ConfirmExpired { correlation_id });
                Err(SubscribeError::Timeout(self.subscribe_timeout))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.driver.is_some() {
            let _ = self.commands.send(Command::Disconnect);
        }
    }
}

fn parse_pattern(pattern: &str) -> Result<TopicPattern, SubscribeError> {
    TopicPattern::parse(pattern).map_err(|source| SubscribeError::MalformedPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod test_broker;
