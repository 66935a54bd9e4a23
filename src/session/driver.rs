//! Session driver
//!
//! One driver task runs per session. It owns the WebSocket stream, the
//! subscription registry and the callbacks, and it is the only place where
//! any of them are touched:
//! - commands from the `Session` handle arrive over an unbounded channel
//! - inbound frames are decoded and handed to the dispatcher
//! - on transport loss the registry is cleared and the driver reconnects
//!   with bounded backoff; it never resubscribes on its own
//!
//! Handler and observer callbacks run inline on this task, so a slow
//! callback delays everything else for the session.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use super::SessionCallbacks;
use super::command::{Command, PendingConfirm};
use crate::config::Settings;
use crate::connection::{Backoff, SessionProperties};
use crate::dispatch::{self, InboundMessage, MessageHandler};
use crate::events::{EventNotifier, SessionEvent, SessionState};
use crate::subscription::SubscriptionRegistry;
use crate::transport::websocket::{self, Inbound, WsStream};
use crate::transport::{ClientFrame, ServerFrame};
use crate::utils::error::{ConnectionError, PublishError, SubscribeError};

/// Why the connected loop stopped.
enum Exit {
    Shutdown,
    TransportLost(String),
}

pub(crate) struct Driver {
    props: SessionProperties,
    connect_timeout: Duration,
    backoff: Backoff,
    stream: WsStream,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SessionState>,
    registry: SubscriptionRegistry,
    pending: HashMap<String, PendingConfirm>,
    handler: Box<dyn MessageHandler>,
    notifier: EventNotifier,
}

impl Driver {
    pub(crate) fn new(
        props: SessionProperties,
        settings: &Settings,
        stream: WsStream,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<SessionState>,
        callbacks: SessionCallbacks,
    ) -> Self {
        Self {
            props,
            connect_timeout: settings.session.connect_timeout(),
            backoff: Backoff::from_settings(&settings.reconnect),
            stream,
            commands,
            state,
            registry: SubscriptionRegistry::new(),
            pending: HashMap::new(),
            handler: callbacks.handler,
            notifier: EventNotifier::new(callbacks.observer),
        }
    }

    pub(crate) async fn run(mut self) {
        self.notifier.notify(SessionEvent::Connected);

        loop {
            match self.serve().await {
                Exit::Shutdown => {
                    self.shutdown().await;
                    return;
                }
                Exit::TransportLost(reason) => {
                    warn!(endpoint = self.props.host(), %reason, "transport lost");
                    if !self.reconnect().await {
                        return;
                    }
                }
            }
        }
    }

    /// Serves commands and inbound frames while connected.
    async fn serve(&mut self) -> Exit {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else {
                        return Exit::Shutdown;
                    };
                    if let Some(exit) = self.handle_command(cmd).await {
                        return exit;
                    }
                }
                msg = self.stream.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if let Some(exit) = self.handle_inbound(msg) {
                                return exit;
                            }
                        }
                        Some(Err(e)) => return Exit::TransportLost(e.to_string()),
                        None => return Exit::TransportLost("stream ended".to_string()),
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) -> Option<Exit> {
        match cmd {
            Command::Subscribe {
                pattern,
                correlation_id,
                wait_for_confirm,
                reply,
            } => {
                let raw = pattern.as_str().to_string();
                let subscription = self.registry.insert_pending(pattern);
                let frame = ClientFrame::Subscribe {
                    topic: raw.clone(),
                    correlation_id: correlation_id.clone(),
                };
                if let Err(e) = websocket::send_frame(&mut self.stream, &frame).await {
                    let _ = reply.send(Err(SubscribeError::NotConnected));
                    return Some(Exit::TransportLost(e.to_string()));
                }
                debug!(pattern = %raw, %correlation_id, "subscribe sent");

                let reply = if wait_for_confirm {
                    Some(reply)
                } else {
                    let _ = reply.send(Ok(subscription));
                    None
                };
                self.pending
                    .insert(correlation_id, PendingConfirm::Subscribe { pattern: raw, reply });
                None
            }
            Command::Unsubscribe {
                pattern,
                correlation_id,
                wait_for_confirm,
                reply,
            } => {
                let raw = pattern.as_str().to_string();
                let frame = ClientFrame::Unsubscribe {
                    topic: raw.clone(),
                    correlation_id: correlation_id.clone(),
                };
                if let Err(e) = websocket::send_frame(&mut self.stream, &frame).await {
                    let _ = reply.send(Err(SubscribeError::NotConnected));
                    return Some(Exit::TransportLost(e.to_string()));
                }
                debug!(pattern = %raw, %correlation_id, "unsubscribe sent");

                let reply = if wait_for_confirm {
                    Some(reply)
                } else {
                    let _ = reply.send(Ok(()));
                    None
                };
                self.pending
                    .insert(correlation_id, PendingConfirm::Unsubscribe { pattern: raw, reply });
                None
            }
            Command::ConfirmExpired { correlation_id } => {
                // Stays pending so a late answer from the broker still applies.
                if let Some(pending) = self.pending.get_mut(&correlation_id) {
                    warn!(pattern = pending.pattern(), %correlation_id, "confirmation wait expired");
                    pending.detach();
                    if let PendingConfirm::Subscribe { pattern, .. } = pending {
                        self.registry.mark_unconfirmed(pattern);
                    }
                }
                None
            }
            Command::Publish {
                topic,
                payload,
                reply,
            } => {
                let frame = ClientFrame::Publish {
                    topic,
                    payload,
                    message_id: Uuid::new_v4().to_string(),
                };
                match websocket::send_frame(&mut self.stream, &frame).await {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                        None
                    }
                    Err(e) => {
                        let _ = reply.send(Err(PublishError::NotConnected));
                        Some(Exit::TransportLost(e.to_string()))
                    }
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
                None
            }
            Command::Disconnect => Some(Exit::Shutdown),
        }
    }

    fn handle_inbound(&mut self, msg: WsMessage) -> Option<Exit> {
        match websocket::decode(msg) {
            Ok(Inbound::Frame(frame)) => {
                self.handle_frame(frame);
                None
            }
            Ok(Inbound::Ignored) => None,
            Ok(Inbound::Closed) => Some(Exit::TransportLost("closed by broker".to_string())),
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                None
            }
        }
    }

    fn handle_frame(&mut self, frame: ServerFrame) {
        match frame {
            ServerFrame::Message {
                topic,
                payload,
                timestamp,
                message_id,
            } => {
                let message = InboundMessage::new(topic, payload.into_bytes(), message_id, timestamp);
                dispatch::deliver(&self.registry, self.handler.as_mut(), &message);
            }
            ServerFrame::Ok { correlation_id } => self.confirm(&correlation_id),
            ServerFrame::Error {
                message,
                correlation_id: Some(correlation_id),
            } => self.reject(&correlation_id, message),
            ServerFrame::Error {
                message,
                correlation_id: None,
            } => warn!(%message, "broker reported an error"),
            ServerFrame::Authenticated {} => debug!("ignoring repeated authenticated frame"),
        }
    }

    fn confirm(&mut self, correlation_id: &str) {
        let Some(pending) = self.pending.remove(correlation_id) else {
            debug!(%correlation_id, "confirmation for unknown request");
            return;
        };

        match pending {
            PendingConfirm::Subscribe { pattern, reply } => {
                let result = match self.registry.confirm(&pattern) {
                    Some(subscription) => {
                        info!(%pattern, "subscription confirmed");
                        Ok(subscription)
                    }
                    None => Err(SubscribeError::Rejected {
                        pattern,
                        reason: "subscription removed before confirmation".to_string(),
                    }),
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            PendingConfirm::Unsubscribe { pattern, reply } => {
                self.registry.remove(&pattern);
                info!(%pattern, "unsubscribe confirmed");
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(()));
                }
            }
        }
    }

    fn reject(&mut self, correlation_id: &str, reason: String) {
        let Some(pending) = self.pending.remove(correlation_id) else {
            warn!(%correlation_id, %reason, "broker rejected an unknown request");
            return;
        };

        warn!(pattern = pending.pattern(), %reason, "broker rejected request");
        if let PendingConfirm::Subscribe { pattern, .. } = &pending {
            self.registry.remove(pattern);
        }
        let pattern = pending.pattern().to_string();
        pending.fail(SubscribeError::Rejected { pattern, reason });
    }

    /// Fails every outstanding confirmation and drops all subscriptions.
    fn release(&mut self, err: SubscribeError) {
        for (_, pending) in self.pending.drain() {
            pending.fail(err.clone());
        }
        let released = self.registry.clear();
        if released > 0 {
            debug!(count = released, "released subscriptions");
        }
    }

    async fn shutdown(&mut self) {
        self.commands.close();
        let _ = timeout(self.connect_timeout, websocket::close(&mut self.stream)).await;
        self.release(SubscribeError::SessionClosed);
        self.state.send_replace(SessionState::Disconnected);
        self.notifier.notify(SessionEvent::Disconnected);
        info!(endpoint = self.props.host(), "session disconnected");
    }

    /// Returns `true` once a new connection is up, `false` if the session is over.
    async fn reconnect(&mut self) -> bool {
        self.release(SubscribeError::NotConnected);
        self.state.send_replace(SessionState::Reconnecting);

        while let Some(delay) = self.backoff.next_delay() {
            let attempt = self.backoff.attempt();
            self.notifier
                .notify(SessionEvent::ReconnectAttempt { attempt, delay });

            if !self.idle(delay).await {
                self.go_offline();
                return false;
            }

            info!(
                endpoint = self.props.host(),
                attempt,
                max_attempts = self.backoff.max_attempts(),
                "reconnecting"
            );
            let Some(dialed) = self.dial().await else {
                self.go_offline();
                return false;
            };
            match dialed {
                Ok(stream) => {
                    self.stream = stream;
                    self.backoff.reset();
                    self.state.send_replace(SessionState::Connected);
                    self.notifier.notify(SessionEvent::Connected);
                    info!(endpoint = self.props.host(), attempt, "reconnected");
                    return true;
                }
                Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
            }
        }

        let attempts = self.backoff.attempt();
        error!(endpoint = self.props.host(), attempts, "giving up on reconnection");
        self.notifier
            .notify(SessionEvent::ReconnectFailed { attempts });
        self.go_offline();
        false
    }

    /// Waits `delay` while answering commands. Returns `false` if a disconnect was requested.
    async fn idle(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Disconnect) => return false,
                    Some(cmd) => self.reject_offline(cmd),
                },
            }
        }
    }

    /// Opens a new connection while answering commands. Returns `None` if a
    /// disconnect was requested; the dial in flight is dropped.
    async fn dial(&mut self) -> Option<Result<WsStream, ConnectionError>> {
        let props = self.props.clone();
        let open = websocket::open(&props, self.connect_timeout);
        tokio::pin!(open);

        loop {
            tokio::select! {
                dialed = &mut open => return Some(dialed),
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Disconnect) => return None,
                    Some(cmd) => self.reject_offline(cmd),
                },
            }
        }
    }

    fn reject_offline(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe { reply, .. } => {
                let _ = reply.send(Err(SubscribeError::NotConnected));
            }
            Command::Unsubscribe { reply, .. } => {
                let _ = reply.send(Err(SubscribeError::NotConnected));
            }
            Command::Publish { reply, .. } => {
                let _ = reply.send(Err(PublishError::NotConnected));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
            Command::ConfirmExpired { .. } | Command::Disconnect => {}
        }
    }

    fn go_offline(&mut self) {
        self.commands.close();
        self.state.send_replace(SessionState::Disconnected);
        self.notifier.notify(SessionEvent::Disconnected);
        info!(endpoint = self.props.host(), "session disconnected");
    }
}
