//! The `subscription` module keeps track of what a session is subscribed to.
//!
//! `topic` validates topic names and wildcard patterns and matches topics
//! against them. `registry` holds the per-session subscription table with the
//! broker confirmation state of each entry.

pub mod registry;
pub mod topic;

pub use registry::{Confirmation, Subscription, SubscriptionRegistry};
pub use topic::{TopicPattern, validate_topic};
