//! Push channel client.
//!
//! Connects to the backend's `/websocket` endpoint, decodes every text frame
//! into a [`PushEvent`] and republishes it on the [`EventBus`]. Disconnects
//! are retried forever on a fixed delay until the cancellation token fires.
//! There is no heartbeat; a silently dead connection is only noticed when
//! the TCP stream errors. The periodic full refresh covers that gap.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::{PushEvent, parse_message};
use super::reconnect::{ReconnectConfig, Reconnector};
use crate::bus::EventBus;
use crate::error::SocketError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a connection ended.
#[derive(Debug, PartialEq, Eq)]
enum Closed {
    /// Server closed or the stream errored.
    Remote,
    /// Shutdown requested.
    Cancelled,
}

pub struct PushClient {
    url: String,
    bus: Arc<EventBus>,
    reconnect: ReconnectConfig,
}

impl PushClient {
    /// Fails with [`SocketError::Unsupported`] unless `url` is `ws://` or `wss://`.
    pub fn new(
        url: impl Into<String>,
        bus: Arc<EventBus>,
        reconnect: ReconnectConfig,
    ) -> Result<Self, SocketError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SocketError::Unsupported(url));
        }
        Ok(Self {
            url,
            bus,
            reconnect,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Connect, pump, reconnect. Returns only once `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut machine = Reconnector::new(self.reconnect.clone());
        let mut delay = machine.start();

        loop {
            if let Some(delay) = delay.take() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            machine.on_timer_fired();

            debug!(url = %self.url, "Connecting to push channel");
            let attempt = tokio::select! {
                _ = cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match attempt {
                Ok((socket, _response)) => {
                    machine.on_open();
                    info!(url = %self.url, "Push channel connected");
                    if self.pump(socket, &cancel).await == Closed::Cancelled {
                        break;
                    }
                }
                Err(e) => {
                    let err = SocketError::Connect {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Push channel connect failed");
                }
            }

            delay = machine.on_close();
            warn!(
                retry_in_secs = delay.map(|d| d.as_secs_f64()),
                reconnects = machine.reconnects_scheduled(),
                "Push channel closed"
            );
        }

        info!(url = %self.url, "Push channel stopped");
    }

    async fn pump(&self, mut socket: Socket, cancel: &CancellationToken) -> Closed {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = socket.close(None).await;
                    return Closed::Cancelled;
                }
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_text(&self.bus, &text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return Closed::Remote;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Closed::Remote,
                    Some(Err(e)) => {
                        let err = SocketError::Protocol(e.to_string());
                        warn!(error = %err, "Push channel error");
                        return Closed::Remote;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Decode a text frame and publish it. Malformed frames are logged and
/// dropped. Returns whether an event was published.
pub fn dispatch_text(bus: &EventBus, text: &str) -> bool {
    match parse_message(text) {
        Ok(event) => {
            debug!(action = event.action(), "Push event received");
            publish(bus, event);
            true
        }
        Err(e) => {
            warn!(error = %e, "Dropping push message");
            false
        }
    }
}

fn publish(bus: &EventBus, event: PushEvent) {
    let receivers = bus.publish(event);
    if receivers == 0 {
        debug!("Push event had no subscribers");
    }
}
