use super::message::{ClientFrame, ServerFrame};
use super::websocket::{Inbound, decode};
use crate::utils::error::TransportError;
use serde_json::json;
use tungstenite::protocol::Message as WsMessage;

#[test]
fn test_login_frame_shape() {
    let frame = ClientFrame::Login {
        vpn: "default".to_string(),
        username: "user".to_string(),
        password: None,
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        value,
        json!({ "type": "login", "vpn": "default", "username": "user" })
    );
}

#[test]
fn test_subscribe_frame_shape() {
    let frame = ClientFrame::Subscribe {
        topic: "test/topic".to_string(),
        correlation_id: "c-1".to_string(),
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(
        value,
        json!({ "type": "subscribe", "topic": "test/topic", "correlation_id": "c-1" })
    );
}

#[test]
fn test_error_frame_without_correlation() {
    let text = json!({ "type": "error", "message": "invalid credentials" }).to_string();
    let frame: ServerFrame = serde_json::from_str(&text).unwrap();
    assert_eq!(
        frame,
        ServerFrame::Error {
            message: "invalid credentials".to_string(),
            correlation_id: None,
        }
    );
}

#[test]
fn test_decode_message_frame() {
    let text = json!({
        "type": "message",
        "topic": "test/topic",
        "payload": "hello",
        "timestamp": 1_725_000_000_000i64,
        "message_id": "m-1"
    })
    .to_string();

    match decode(WsMessage::text(text)).unwrap() {
        Inbound::Frame(ServerFrame::Message { topic, payload, .. }) => {
            assert_eq!(topic, "test/topic");
            assert_eq!(payload, "hello");
        }
        other => panic!("Expected a message frame, got {other:?}"),
    }
}

#[test]
fn test_decode_control_and_close() {
    assert_eq!(
        decode(WsMessage::Ping(Default::default())).unwrap(),
        Inbound::Ignored
    );
    assert_eq!(decode(WsMessage::Close(None)).unwrap(), Inbound::Closed);
}

#[test]
fn test_decode_rejects_unknown_frame() {
    let text = json!({ "type": "bogus" }).to_string();
    assert!(matches!(
        decode(WsMessage::text(text)),
        Err(TransportError::Codec(_))
    ));
}
