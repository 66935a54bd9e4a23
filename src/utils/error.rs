//! The `error` module defines the error types returned by `popsub-client`.
//!
//! Connection and subscription errors are returned to the caller of the
//! corresponding `Session` operation. `DispatchError` never leaves the
//! dispatch loop; it only exists so handler failures can be logged with a
//! consistent shape.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while establishing a session with a broker.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("broker at {endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("authentication rejected by broker: {reason}")]
    AuthRejected { reason: String },

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error during login: {0}")]
    Protocol(String),
}

/// Reasons a topic pattern or topic name is rejected before it reaches the broker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("topic is empty")]
    Empty,

    #[error("level {index} is empty")]
    EmptyLevel { index: usize },

    #[error("wildcard '{wildcard}' is misplaced in level {index}")]
    MisplacedWildcard { wildcard: char, index: usize },

    #[error("wildcards are not allowed in a published topic")]
    WildcardInTopic,
}

/// Errors returned by subscribe and unsubscribe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("no confirmation from broker within {0:?}")]
    Timeout(Duration),

    #[error("malformed topic pattern '{pattern}': {source}")]
    MalformedPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("session is not connected")]
    NotConnected,

    #[error("broker rejected '{pattern}': {reason}")]
    Rejected { pattern: String, reason: String },

    #[error("session has been closed")]
    SessionClosed,
}

/// Errors returned by publish.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("invalid topic '{topic}': {source}")]
    InvalidTopic {
        topic: String,
        #[source]
        source: PatternError,
    },

    #[error("session is not connected")]
    NotConnected,

    #[error("session has been closed")]
    SessionClosed,
}

/// A failed handler invocation. Logged by the dispatch loop and swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("handler failed for topic '{topic}': {reason}")]
    HandlerFailed { topic: String, reason: String },

    #[error("handler panicked for topic '{topic}': {reason}")]
    HandlerPanicked { topic: String, reason: String },
}

/// Failures of the underlying WebSocket transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
