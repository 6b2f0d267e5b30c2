//! Relay link: a bidirectional envelope channel to the relay.
//!
//! [`connect`] dials the relay over WebSocket and bridges the socket to a
//! pair of in-process channels. The inbound channel closes when the socket
//! does, which is how endpoints observe disconnection.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use fc_protocol::{envelope, Envelope, MAX_MESSAGE_SIZE};

pub type RelaySender = mpsc::UnboundedSender<Envelope>;
pub type RelayReceiver = mpsc::UnboundedReceiver<Envelope>;

/// One endpoint's connection to the relay.
#[derive(Debug)]
pub struct RelayLink {
    tx: RelaySender,
    rx: RelayReceiver,
}

impl RelayLink {
    /// Build a link from raw channels (in-process relays and tests).
    pub fn from_channels(tx: RelaySender, rx: RelayReceiver) -> Self {
        Self { tx, rx }
    }

    /// Queue a payload for the relay. Returns `false` once the link is gone.
    pub fn send(&self, payload: envelope::Payload) -> bool {
        self.tx.send(Envelope::new(payload)).is_ok()
    }

    /// Next event from the relay, or `None` after disconnection.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn into_parts(self) -> (RelaySender, RelayReceiver) {
        (self.tx, self.rx)
    }
}

/// Connect to a relay WebSocket endpoint.
pub async fn connect(url: &str) -> anyhow::Result<RelayLink> {
    let (ws_stream, _) = connect_async(url).await?;
    tracing::info!(%url, "WebSocket connected to relay");

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Envelope>();

    // ── Writer task (drains out channel → WS) ────────────────

    tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            let buf = envelope.to_bytes();
            if ws_write.send(Message::Binary(buf)).await.is_err() {
                break;
            }
        }
        let _ = ws_write.close().await;
    });

    // ── Reader task (WS → in channel) ────────────────────────

    tokio::spawn(async move {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if data.len() > MAX_MESSAGE_SIZE {
                        tracing::warn!(bytes = data.len(), "Dropping oversized relay message");
                        continue;
                    }
                    match Envelope::from_bytes(&data) {
                        Ok(envelope) => {
                            if in_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Failed to decode relay protobuf: {}", e),
                    }
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!("Relay read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        tracing::info!("Relay connection closed");
    });

    Ok(RelayLink::from_channels(out_tx, in_rx))
}
