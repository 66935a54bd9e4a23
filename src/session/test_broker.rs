//! In-process WebSocket broker used by the session tests.
//!
//! Speaks the client's JSON protocol on `127.0.0.1:0`. Logins from the
//! username `rejected` are refused, subscribe confirmations can be
//! withheld and released later, new connections can be left hanging before
//! the WebSocket upgrade, and connections can be dropped on demand to
//! exercise reconnection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tungstenite::protocol::Message as WsMessage;

use crate::subscription::TopicPattern;
use crate::transport::{ClientFrame, ServerFrame};

pub(crate) const REJECTED_USER: &str = "rejected";

struct Peer {
    tx: mpsc::UnboundedSender<WsMessage>,
    patterns: Vec<TopicPattern>,
    kill: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct Shared {
    withhold_confirms: AtomicBool,
    withheld: Mutex<Vec<(mpsc::UnboundedSender<WsMessage>, String)>>,
    stall_handshakes: AtomicBool,
    stalled: AtomicU64,
    next_id: AtomicU64,
    peers: Mutex<HashMap<u64, Peer>>,
    published: Mutex<Vec<(String, String)>>,
    logins: AtomicU64,
}

impl Shared {
    fn fan_out(&self, topic: &str, payload: &str) {
        let frame = ServerFrame::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            message_id: uuid::Uuid::new_v4().to_string(),
        };
        let text = serde_json::to_string(&frame).unwrap();

        let peers = self.peers.lock().unwrap();
        for peer in peers.values() {
            if peer.patterns.iter().any(|p| p.matches(topic)) {
                let _ = peer.tx.send(WsMessage::text(text.clone()));
            }
        }
    }
}

pub(crate) struct TestBroker {
    addr: SocketAddr,
    shared: Arc<Shared>,
    accept: JoinHandle<()>,
}

impl TestBroker {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());

        let accept_shared = shared.clone();
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_peer(stream, accept_shared.clone()));
            }
        });

        Self {
            addr,
            shared,
            accept,
        }
    }

    pub(crate) fn host(&self) -> String {
        self.addr.to_string()
    }

    pub(crate) fn withhold_confirms(&self, withhold: bool) {
        self.shared
            .withhold_confirms
            .store(withhold, Ordering::SeqCst);
    }

    /// Sends every confirmation withheld so far and stops withholding.
    pub(crate) fn release_confirms(&self) {
        self.withhold_confirms(false);
        for (tx, correlation_id) in self.shared.withheld.lock().unwrap().drain(..) {
            let frame = ServerFrame::Ok { correlation_id };
            let _ = tx.send(WsMessage::text(serde_json::to_string(&frame).unwrap()));
        }
    }

    /// New connections are accepted but never upgraded to WebSocket.
    pub(crate) fn stall_handshakes(&self, stall: bool) {
        self.shared.stall_handshakes.store(stall, Ordering::SeqCst);
    }

    /// Connections left hanging by [`stall_handshakes`](Self::stall_handshakes).
    pub(crate) fn stalled(&self) -> u64 {
        self.shared.stalled.load(Ordering::SeqCst)
    }

    /// Delivers a message to every peer with a matching subscription.
    pub(crate) fn publish(&self, topic: &str, payload: &str) {
        self.shared.fan_out(topic, payload);
    }

    /// Sends a raw text frame to every connected peer.
    pub(crate) fn send_raw(&self, text: &str) {
        let peers = self.shared.peers.lock().unwrap();
        for peer in peers.values() {
            let _ = peer.tx.send(WsMessage::text(text.to_string()));
        }
    }

    /// `(topic, payload)` of every publish received from clients.
    pub(crate) fn published(&self) -> Vec<(String, String)> {
        self.shared.published.lock().unwrap().clone()
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.shared.peers.lock().unwrap().len()
    }

    pub(crate) fn logins(&self) -> u64 {
        self.shared.logins.load(Ordering::SeqCst)
    }

    /// Patterns the broker holds for all peers, sorted.
    pub(crate) fn subscriptions(&self) -> Vec<String> {
        let peers = self.shared.peers.lock().unwrap();
        let mut patterns: Vec<String> = peers
            .values()
            .flat_map(|p| p.patterns.iter().map(|t| t.as_str().to_string()))
            .collect();
        patterns.sort();
        patterns
    }

    /// Abruptly closes every open connection. New connections are still accepted.
    pub(crate) fn drop_connections(&self) {
        let mut peers = self.shared.peers.lock().unwrap();
        for (_, mut peer) in peers.drain() {
            if let Some(kill) = peer.kill.take() {
                let _ = kill.send(());
            }
        }
    }

    /// Stops accepting and closes every open connection.
    pub(crate) fn shutdown(&self) {
        self.accept.abort();
        self.drop_connections();
    }

    pub(crate) async fn wait_for_peers(&self, count: usize) {
        for _ in 0..200 {
            if self.peer_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} peers, have {}", self.peer_count());
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve_peer(stream: TcpStream, shared: Arc<Shared>) {
    if shared.stall_handshakes.load(Ordering::SeqCst) {
        shared.stalled.fetch_add(1, Ordering::SeqCst);
        // Keeps the socket open without ever answering.
        std::future::pending::<()>().await;
        drop(stream);
        return;
    }

    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    let login = match source.next().await {
        Some(Ok(WsMessage::Text(text))) => serde_json::from_str::<ClientFrame>(text.as_str()).ok(),
        _ => None,
    };
    let Some(ClientFrame::Login { username, .. }) = login else {
        return;
    };
    shared.logins.fetch_add(1, Ordering::SeqCst);

    if username == REJECTED_USER {
        let frame = ServerFrame::Error {
            message: "invalid credentials".to_string(),
            correlation_id: None,
        };
        let _ = sink
            .send(WsMessage::text(serde_json::to_string(&frame).unwrap()))
            .await;
        let _ = sink.close().await;
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let (kill_tx, mut kill_rx) = oneshot::channel();
    let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
    shared.peers.lock().unwrap().insert(
        id,
        Peer {
            tx: tx.clone(),
            patterns: Vec::new(),
            kill: Some(kill_tx),
        },
    );

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let reply = |frame: ServerFrame| {
        let _ = tx.send(WsMessage::text(serde_json::to_string(&frame).unwrap()));
    };
    reply(ServerFrame::Authenticated {});

    loop {
        let msg = tokio::select! {
            _ = &mut kill_rx => break,
            msg = source.next() => msg,
        };
        let text = match msg {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => continue,
        };

        match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(ClientFrame::Subscribe {
                topic,
                correlation_id,
            }) => {
                let pattern = match TopicPattern::parse(&topic) {
                    Ok(pattern) => pattern,
                    Err(e) => {
                        reply(ServerFrame::Error {
                            message: e.to_string(),
                            correlation_id: Some(correlation_id),
                        });
                        continue;
                    }
                };
                if let Some(peer) = shared.peers.lock().unwrap().get_mut(&id) {
                    peer.patterns.retain(|p| p.as_str() != topic);
                    peer.patterns.push(pattern);
                }
                if shared.withhold_confirms.load(Ordering::SeqCst) {
                    shared
                        .withheld
                        .lock()
                        .unwrap()
                        .push((tx.clone(), correlation_id));
                } else {
                    reply(ServerFrame::Ok { correlation_id });
                }
            }
            Ok(ClientFrame::Unsubscribe {
                topic,
                correlation_id,
            }) => {
                if let Some(peer) = shared.peers.lock().unwrap().get_mut(&id) {
                    peer.patterns.retain(|p| p.as_str() != topic);
                }
                reply(ServerFrame::Ok { correlation_id });
            }
            Ok(ClientFrame::Publish { topic, payload, .. }) => {
                shared
                    .published
                    .lock()
                    .unwrap()
                    .push((topic.clone(), payload.clone()));
                shared.fan_out(&topic, &payload);
            }
            Ok(ClientFrame::Login { .. }) | Err(_) => {
                reply(ServerFrame::Error {
                    message: "unexpected frame".to_string(),
                    correlation_id: None,
                });
            }
        }
    }

    shared.peers.lock().unwrap().remove(&id);
    writer.abort();
}
