//! # PopSub Client
//!
//! `popsub-client` is a minimal publish/subscribe client core. It keeps one
//! logical session to a broker over WebSockets, tracks topic subscriptions
//! and dispatches inbound messages to an application handler from a single
//! background task.
//!
//! ## Core Modules
//!
//! - `session`: The `Session` handle and the driver task behind it (dispatch loop, reconnection).
//! - `connection`: Session properties and the reconnect backoff policy.
//! - `subscription`: Topic patterns and the subscription registry.
//! - `dispatch`: Message handlers and routing of inbound messages.
//! - `events`: Session states, lifecycle events and observers.
//! - `transport`: JSON frames and the WebSocket connection to the broker.
//! - `cli`: The command line subscriber behind the `popsub-client` binary.
//! - `config`: Layered settings (defaults, file, environment).
//! - `utils`: Error types and logging setup.

pub mod cli;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod events;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod utils;

pub use config::Settings;
pub use connection::SessionProperties;
pub use dispatch::{HandlerError, InboundMessage, MessageHandler};
pub use events::{EventObserver, SessionEvent, SessionState};
pub use session::{Session, SessionCallbacks};
pub use subscription::{Confirmation, Subscription, TopicPattern};
pub use utils::error::{ConnectionError, DispatchError, PublishError, SubscribeError};
