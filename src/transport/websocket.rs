//! WebSocket transport
//!
//! Opens the connection to the broker and performs the login handshake.
//! Responsibilities:
//! - Dial `ws://host:port/` and upgrade to WebSocket
//! - Send `login` and wait for `authenticated` or `error`
//! - Serialize/deserialize JSON frames for the session driver
//!
//! The whole handshake is bounded by a single connect timeout.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use tungstenite::protocol::Message as WsMessage;

use crate::connection::SessionProperties;
use crate::transport::message::{ClientFrame, ServerFrame};
use crate::utils::error::{ConnectionError, TransportError};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A decoded WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Frame(ServerFrame),
    /// Control or binary traffic the client does not act on.
    Ignored,
    Closed,
}

/// Connects to the broker described by `props` and logs in.
pub async fn open(
    props: &SessionProperties,
    connect_timeout: Duration,
) -> Result<WsStream, ConnectionError> {
    let url = props.url()?;
    timeout(connect_timeout, handshake(&url, props))
        .await
        .map_err(|_| ConnectionError::Timeout(connect_timeout))?
}

async fn handshake(url: &str, props: &SessionProperties) -> Result<WsStream, ConnectionError> {
    let unreachable = |reason: String| ConnectionError::Unreachable {
        endpoint: props.host().to_string(),
        reason,
    };

    debug!(%url, "connecting to broker");
    let (mut stream, _response) = connect_async(url)
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    let login = ClientFrame::Login {
        vpn: props.vpn().to_string(),
        username: props.username().to_string(),
        password: props.password().map(str::to_string),
    };
    send_frame(&mut stream, &login)
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    loop {
        let Some(msg) = stream.next().await else {
            return Err(unreachable("connection closed during login".to_string()));
        };
        let msg = msg.map_err(|e| unreachable(e.to_string()))?;

        match decode(msg) {
            Ok(Inbound::Frame(ServerFrame::Authenticated {})) => {
                debug!(%url, vpn = props.vpn(), "logged in");
                return Ok(stream);
            }
            Ok(Inbound::Frame(ServerFrame::Error { message, .. })) => {
                return Err(ConnectionError::AuthRejected { reason: message });
            }
            Ok(Inbound::Frame(other)) => {
                return Err(ConnectionError::Protocol(format!(
                    "unexpected frame during login: {other:?}"
                )));
            }
            Ok(Inbound::Ignored) => continue,
            Ok(Inbound::Closed) => {
                return Err(unreachable("connection closed during login".to_string()));
            }
            Err(e) => return Err(ConnectionError::Protocol(e.to_string())),
        }
    }
}

/// Serializes `frame` and writes it as a text message.
pub async fn send_frame(stream: &mut WsStream, frame: &ClientFrame) -> Result<(), TransportError> {
    let text = serde_json::to_string(frame)?;
    trace!(frame = %text, "sending frame");
    stream.send(WsMessage::text(text)).await?;
    Ok(())
}

/// Interprets one WebSocket message.
pub fn decode(msg: WsMessage) -> Result<Inbound, TransportError> {
    match msg {
        WsMessage::Text(text) => {
            let frame = serde_json::from_str::<ServerFrame>(text.as_str())?;
            Ok(Inbound::Frame(frame))
        }
        WsMessage::Close(_) => Ok(Inbound::Closed),
        _ => Ok(Inbound::Ignored),
    }
}

/// Sends a close frame. Errors are ignored: the peer may already be gone.
pub async fn close(stream: &mut WsStream) {
    if let Err(e) = stream.close(None).await {
        trace!(error = %e, "close handshake failed");
    }
}
