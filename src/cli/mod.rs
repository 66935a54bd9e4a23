//! Command line subscriber
//!
//! Connects to a broker, subscribes to one topic, prints the first message
//! it receives, then unsubscribes and disconnects.
//!
//! A session never resubscribes on its own. The observer forwards events to
//! [`run`] over a channel, and every `Connected` after the first re-issues
//! the subscription on the new connection.

use clap::Parser;
use clap::error::ErrorKind;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::connection::SessionProperties;
use crate::dispatch::InboundMessage;
use crate::events::SessionEvent;
use crate::session::{Session, SessionCallbacks};

pub const USAGE: &str = "Usage: popsub-client <host:port> <vpn> <username> <topic> [--password <password>] [--log-level <level>]";

/// Exit status for missing or invalid arguments.
pub const USAGE_EXIT: i32 = -1;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "popsub-client", about = "Subscribe to a topic and print the first message")]
pub struct Cli {
    /// Broker endpoint as host:port
    pub host: String,
    /// Virtual domain (VPN) to log into
    pub vpn: String,
    pub username: String,
    /// Topic pattern to subscribe to
    pub topic: String,
    #[arg(long)]
    pub password: Option<String>,
    /// Overrides the configured log level
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Exit status for an argument error, or `None` when clap should print
/// help or version output itself.
pub fn usage_exit_code(err: &clap::Error) -> Option<i32> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => None,
        _ => Some(USAGE_EXIT),
    }
}

/// Runs the subscriber and returns the process exit status: `0` after one
/// message, `1` on connect or subscribe failure, interruption, or a session
/// that ends before a message arrives.
pub async fn run(cli: Cli, settings: &Settings) -> i32 {
    let (done_tx, mut done_rx) = oneshot::channel();
    let mut done = Some(done_tx);
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let callbacks = SessionCallbacks::new()
        .on_message(move |msg: &InboundMessage| {
            // Only the first message counts.
            if let Some(done) = done.take() {
                println!("{}: {}", msg.topic(), String::from_utf8_lossy(msg.payload()));
                let _ = done.send(());
            }
            Ok(())
        })
        .on_event(move |event: &SessionEvent| {
            info!(%event, "session event");
            let _ = events_tx.send(event.clone());
        });

    let mut props = SessionProperties::new(cli.host, cli.vpn, cli.username);
    if let Some(password) = cli.password {
        props = props.with_password(password);
    }

    let session = match Session::connect(props, callbacks, settings).await {
        Ok(session) => session,
        Err(e) => {
            error!("Connection failed: {}", e);
            return 1;
        }
    };

    if let Err(e) = session.subscribe(&cli.topic, true).await {
        error!("Subscribe to {} failed: {}", cli.topic, e);
        session.disconnect().await;
        return 1;
    }
    info!(topic = %cli.topic, "waiting for a message");

    let mut connects = 0u32;
    loop {
        tokio::select! {
            received = &mut done_rx => {
                if received.is_err() {
                    error!("Session ended before a message arrived");
                    return 1;
                }
                break;
            }
            Some(event) = events.recv() => {
                if event == SessionEvent::Connected {
                    connects += 1;
                    if connects > 1 {
                        resubscribe(&session, &cli.topic).await;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting.");
                session.disconnect().await;
                return 1;
            }
        }
    }

    if let Err(e) = session.unsubscribe(&cli.topic, true).await {
        warn!("Unsubscribe from {} failed: {}", cli.topic, e);
    }
    session.disconnect().await;
    0
}

async fn resubscribe(session: &Session, topic: &str) {
    match session.subscribe(topic, true).await {
        Ok(_) => info!(%topic, "resubscribed after reconnect"),
        // The next `Connected` retries.
        Err(e) => warn!(%topic, error = %e, "resubscribe failed"),
    }
}
