//! Wire frames exchanged with the broker.
//!
//! Every frame is a JSON text message tagged by `type`.

use serde::{Deserialize, Serialize};

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "login")]
    Login {
        vpn: String,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    #[serde(rename = "subscribe")]
    Subscribe { topic: String, correlation_id: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String, correlation_id: String },
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        message_id: String,
    },
}

/// Frames sent by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "authenticated")]
    Authenticated {},
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correlation_id: Option<String>,
    },
    #[serde(rename = "ok")]
    Ok { correlation_id: String },
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        message_id: String,
    },
}
