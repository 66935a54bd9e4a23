//! Subscription registry
//!
//! Tracks the patterns a session is subscribed to and whether the broker has
//! confirmed each of them. The registry is owned by the session driver and
//! is never shared; callers get snapshots.

use std::collections::HashMap;

use crate::subscription::topic::TopicPattern;

/// Broker confirmation state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Sent, no answer yet.
    Pending,
    /// Acknowledged by the broker.
    Confirmed,
    /// The confirmation wait timed out; the broker may still be delivering.
    Unconfirmed,
}

/// A topic subscription as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pattern: TopicPattern,
    confirmation: Confirmation,
}

impl Subscription {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn confirmation(&self) -> Confirmation {
        self.confirmation
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation == Confirmation::Confirmed
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers `pattern` as pending. A pattern that is already confirmed stays confirmed.
    pub fn insert_pending(&mut self, pattern: TopicPattern) -> Subscription {
        let entry = self
            .entries
            .entry(pattern.as_str().to_string())
            .or_insert_with(|| Subscription {
                pattern,
                confirmation: Confirmation::Pending,
            });
        if entry.confirmation == Confirmation::Unconfirmed {
            entry.confirmation = Confirmation::Pending;
        }
        entry.clone()
    }

    pub fn confirm(&mut self, pattern: &str) -> Option<Subscription> {
        self.set_confirmation(pattern, Confirmation::Confirmed)
    }

    pub fn mark_unconfirmed(&mut self, pattern: &str) -> Option<Subscription> {
        let entry = self.entries.get_mut(pattern)?;
        if entry.confirmation == Confirmation::Pending {
            entry.confirmation = Confirmation::Unconfirmed;
        }
        Some(entry.clone())
    }

    fn set_confirmation(&mut self, pattern: &str, confirmation: Confirmation) -> Option<Subscription> {
        let entry = self.entries.get_mut(pattern)?;
        entry.confirmation = confirmation;
        Some(entry.clone())
    }

    pub fn remove(&mut self, pattern: &str) -> Option<Subscription> {
        self.entries.remove(pattern)
    }

    /// Drops every subscription and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn get(&self, pattern: &str) -> Option<&Subscription> {
        self.entries.get(pattern)
    }

    /// True if any registered pattern matches `topic`.
    pub fn matches(&self, topic: &str) -> bool {
        if self.entries.contains_key(topic) {
            return true;
        }
        self.entries
            .values()
            .any(|sub| !sub.pattern.is_exact() && sub.pattern.matches(topic))
    }

    /// All subscriptions, sorted by pattern.
    pub fn snapshot(&self) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self.entries.values().cloned().collect();
        subs.sort_by(|a, b| a.pattern().cmp(b.pattern()));
        subs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
