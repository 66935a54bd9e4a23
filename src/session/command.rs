use tokio::sync::oneshot;

use crate::subscription::{Subscription, TopicPattern};
use crate::utils::error::{PublishError, SubscribeError};

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Requests marshaled from a `Session` handle to its driver task.
#[derive(Debug)]
pub(crate) enum Command {
    Subscribe {
        pattern: TopicPattern,
        correlation_id: String,
        wait_for_confirm: bool,
        reply: Reply<Result<Subscription, SubscribeError>>,
    },
    Unsubscribe {
        pattern: TopicPattern,
        correlation_id: String,
        wait_for_confirm: bool,
        reply: Reply<Result<(), SubscribeError>>,
    },
    /// The caller stopped waiting for `correlation_id`.
    ConfirmExpired { correlation_id: String },
    Publish {
        topic: String,
        payload: String,
        reply: Reply<Result<(), PublishError>>,
    },
    Snapshot { reply: Reply<Vec<Subscription>> },
    Disconnect,
}

/// A subscribe/unsubscribe waiting for the broker's answer.
#[derive(Debug)]
pub(crate) enum PendingConfirm {
    Subscribe {
        pattern: String,
        reply: Option<Reply<Result<Subscription, SubscribeError>>>,
    },
    Unsubscribe {
        pattern: String,
        reply: Option<Reply<Result<(), SubscribeError>>>,
    },
}

impl PendingConfirm {
    pub(crate) fn pattern(&self) -> &str {
        match self {
            PendingConfirm::Subscribe { pattern, .. } | PendingConfirm::Unsubscribe { pattern, .. } => {
                pattern
            }
        }
    }

    /// Drops the waiting caller; the confirmation itself is still tracked.
    pub(crate) fn detach(&mut self) {
        match self {
            PendingConfirm::Subscribe { reply, .. } => *reply = None,
            PendingConfirm::Unsubscribe { reply, .. } => *reply = None,
        }
    }

    /// Answers the waiting caller, if any, with `err`.
    pub(crate) fn fail(self, err: SubscribeError) {
        match self {
            PendingConfirm::Subscribe { reply: Some(reply), .. } => {
                let _ = reply.send(Err(err));
            }
            PendingConfirm::Unsubscribe { reply: Some(reply), .. } => {
                let _ = reply.send(Err(err));
            }
            _ => {}
        }
    }
}
