//! Message dispatch
//!
//! The session driver hands every inbound message to [`deliver`], which
//! checks it against the subscription registry and runs the application
//! handler. Handler errors and panics are turned into `DispatchError`s,
//! logged, and swallowed so the driver keeps running.

pub mod message;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, error, trace};

use crate::subscription::SubscriptionRegistry;
use crate::utils::error::DispatchError;

pub use message::InboundMessage;

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives messages for a session.
pub trait MessageHandler: Send {
    fn on_message(&mut self, message: &InboundMessage) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&InboundMessage) -> Result<(), HandlerError> + Send,
{
    fn on_message(&mut self, message: &InboundMessage) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Handler used when the application does not register one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl MessageHandler for NoopHandler {
    fn on_message(&mut self, _message: &InboundMessage) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Unmatched,
    Failed(DispatchError),
}

/// Routes `message` to `handler` if any subscription matches its topic.
///
/// The handler runs at most once per message, however many patterns match.
pub fn deliver(
    registry: &SubscriptionRegistry,
    handler: &mut dyn MessageHandler,
    message: &InboundMessage,
) -> Delivery {
    if !registry.matches(message.topic()) {
        debug!(topic = message.topic(), "no subscription matches, dropping message");
        return Delivery::Unmatched;
    }

    trace!(topic = message.topic(), id = message.message_id(), "dispatching message");
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_message(message)));

    let failure = match outcome {
        Ok(Ok(())) => return Delivery::Delivered,
        Ok(Err(e)) => DispatchError::HandlerFailed {
            topic: message.topic().to_string(),
            reason: e.to_string(),
        },
        Err(panic) => DispatchError::HandlerPanicked {
            topic: message.topic().to_string(),
            reason: panic_reason(panic.as_ref()),
        },
    };
    error!(error = %failure, "message handler failed");
    Delivery::Failed(failure)
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
