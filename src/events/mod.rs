//! Session lifecycle events.
//!
//! The session driver reports state transitions to a single observer. The
//! observer runs on the driver task, so it is never invoked concurrently with
//! itself and must not block.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use tracing::{debug, error};

use crate::dispatch::panic_reason;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// A state transition reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session is up. Reported for the initial connect and after every
    /// successful reconnect; subscriptions must be re-issued by the application.
    Connected,
    /// The session is down for good, either by request or after reconnection gave up.
    Disconnected,
    /// About to dial again after `delay`.
    ReconnectAttempt { attempt: u32, delay: Duration },
    /// Every reconnect attempt failed.
    ReconnectFailed { attempts: u32 },
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Connected => write!(f, "connected"),
            SessionEvent::Disconnected => write!(f, "disconnected"),
            SessionEvent::ReconnectAttempt { attempt, delay } => {
                write!(f, "reconnect attempt {attempt} in {delay:?}")
            }
            SessionEvent::ReconnectFailed { attempts } => {
                write!(f, "reconnect failed after {attempts} attempts")
            }
        }
    }
}

/// Receives session events.
///
/// Observers run on the driver task and have no session handle. To react to
/// `Connected` (for example to resubscribe after a reconnect), forward the
/// event over a channel to the task that owns the `Session`.
pub trait EventObserver: Send {
    fn on_event(&mut self, event: &SessionEvent);
}

impl<F> EventObserver for F
where
    F: FnMut(&SessionEvent) + Send,
{
    fn on_event(&mut self, event: &SessionEvent) {
        self(event)
    }
}

/// Observer used when the application does not register one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EventObserver for NoopObserver {
    fn on_event(&mut self, _event: &SessionEvent) {}
}

/// Delivers events to the registered observer, shielding the caller from panics.
pub struct EventNotifier {
    observer: Box<dyn EventObserver>,
}

impl EventNotifier {
    pub fn new(observer: Box<dyn EventObserver>) -> Self {
        Self { observer }
    }

    pub fn notify(&mut self, event: SessionEvent) {
        debug!(%event, "session event");
        let observer = &mut self.observer;
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
            error!(%event, reason = %panic_reason(panic.as_ref()), "event observer panicked");
        }
    }
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
