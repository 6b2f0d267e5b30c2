//! In-memory relay hub.
//!
//! Holds the canonical chat log and the set of connected peers. Chat
//! mutations are applied and fanned out while the log lock is held, so every
//! peer observes the same total order and a joining peer's snapshot is never
//! missing or duplicating an entry. Frames are forwarded to everyone except
//! their sender and never stored.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use fc_protocol::{
    envelope, ChatDelete, ChatEdit, ChatEntry, Envelope, InitialMessages, MutationRejected,
};

/// Channel sender capable of pushing envelopes to a connected peer.
pub type PeerSender = mpsc::UnboundedSender<Envelope>;

#[derive(Debug, Default)]
struct ChatLog {
    /// Ordered by id; appends always carry the largest id so far.
    entries: Vec<ChatEntry>,
    last_id: u64,
}

impl ChatLog {
    fn position(&self, id: u64) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |e| e.id).ok()
    }
}

/// Shared relay state.
#[derive(Debug, Default)]
pub struct Hub {
    log: Mutex<ChatLog>,
    /// peer_id → outbound channel
    peers: DashMap<Uuid, PeerSender>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_log(&self) -> MutexGuard<'_, ChatLog> {
        // A panic while holding the lock cannot leave the log half-written:
        // every mutation is a single Vec operation.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ─── Peer lifecycle ──────────────────────────────────────

    /// Register a peer and send it the `initial_messages` snapshot.
    pub fn join(&self, peer_id: Uuid, tx: PeerSender) {
        let log = self.lock_log();
        let snapshot = Envelope::new(envelope::Payload::InitialMessages(InitialMessages {
            entries: log.entries.clone(),
        }));
        if tx.send(snapshot).is_err() {
            tracing::warn!(%peer_id, "Peer closed before receiving snapshot");
            return;
        }
        self.peers.insert(peer_id, tx);
        tracing::info!(
            %peer_id,
            entries = log.entries.len(),
            peers = self.peers.len(),
            "Peer joined"
        );
    }

    /// Remove a peer (on disconnect).
    pub fn leave(&self, peer_id: &Uuid) {
        if self.peers.remove(peer_id).is_some() {
            tracing::info!(%peer_id, peers = self.peers.len(), "Peer left");
        }
    }

    /// Drop a peer's outbound channel; its connection observes a disconnect.
    pub fn disconnect(&self, peer_id: &Uuid) {
        self.leave(peer_id);
    }

    /// Attach an in-process peer.
    ///
    /// Returns the peer id, the sender the peer emits on, and the receiver the
    /// relay delivers to. Dropping the returned sender detaches the peer.
    pub fn attach(
        self: &Arc<Self>,
    ) -> (
        Uuid,
        mpsc::UnboundedSender<Envelope>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        let peer_id = Uuid::new_v4();
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (from_peer_tx, mut from_peer_rx) = mpsc::unbounded_channel::<Envelope>();

        self.join(peer_id, to_peer_tx);

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = from_peer_rx.recv().await {
                hub.handle(peer_id, envelope);
            }
            hub.leave(&peer_id);
        });

        (peer_id, from_peer_tx, to_peer_rx)
    }

    // ─── Dispatch ────────────────────────────────────────────

    /// Apply one envelope received from `from`.
    pub fn handle(&self, from: Uuid, envelope: Envelope) {
        match envelope.payload {
            Some(envelope::Payload::Chat(entry)) => self.append(from, entry),
            Some(envelope::Payload::Edit(edit)) => self.edit(from, edit),
            Some(envelope::Payload::Delete(delete)) => self.delete(from, delete),
            Some(envelope::Payload::Video(ref frame)) => {
                let delivered = self.broadcast_except(&from, &envelope);
                if frame.sequence % 25 == 0 {
                    tracing::debug!(
                        peer_id = %from,
                        seq = frame.sequence,
                        bytes = frame.data.len(),
                        delivered,
                        "Video frame relay"
                    );
                }
            }
            Some(ref other) => {
                tracing::debug!(peer_id = %from, kind = other.kind(), "Ignoring relay-only event from peer");
            }
            None => {
                tracing::warn!(peer_id = %from, "Peer sent envelope with no payload");
            }
        }
    }

    fn append(&self, from: Uuid, entry: ChatEntry) {
        if entry.text().trim().is_empty() {
            tracing::debug!(peer_id = %from, "Dropping empty chat entry");
            return;
        }

        let mut log = self.lock_log();
        log.last_id += 1;
        let stored = ChatEntry {
            id: log.last_id,
            message: entry.message,
        };
        log.entries.push(stored.clone());
        tracing::debug!(peer_id = %from, id = stored.id, "Chat entry appended");

        self.broadcast(&Envelope::new(envelope::Payload::Chat(stored)));
    }

    fn edit(&self, from: Uuid, edit: ChatEdit) {
        let mut log = self.lock_log();
        let Some(pos) = log.position(edit.id) else {
            drop(log);
            self.reject(from, edit.id, "entry no longer exists");
            return;
        };
        if fc_protocol::split_entry(&edit.message).1.trim().is_empty() {
            drop(log);
            self.reject(from, edit.id, "empty text");
            return;
        }

        log.entries[pos].message = edit.message.clone();
        tracing::debug!(peer_id = %from, id = edit.id, "Chat entry edited");

        self.broadcast(&Envelope::new(envelope::Payload::Edit(edit)));
    }

    fn delete(&self, from: Uuid, delete: ChatDelete) {
        let mut log = self.lock_log();
        let Some(pos) = log.position(delete.id) else {
            drop(log);
            self.reject(from, delete.id, "entry no longer exists");
            return;
        };

        log.entries.remove(pos);
        tracing::debug!(peer_id = %from, id = delete.id, "Chat entry deleted");

        self.broadcast(&Envelope::new(envelope::Payload::Delete(delete)));
    }

    fn reject(&self, to: Uuid, id: u64, reason: &str) {
        tracing::info!(peer_id = %to, id, reason, "Mutation rejected");
        let rejected = Envelope::new(envelope::Payload::Rejected(MutationRejected {
            id,
            reason: reason.to_string(),
        }));
        if let Some(tx) = self.peers.get(&to) {
            let _ = tx.send(rejected);
        }
    }

    // ─── Fan-out ─────────────────────────────────────────────

    /// Send to every peer. Returns the number of peers reached.
    fn broadcast(&self, envelope: &Envelope) -> usize {
        self.fan_out(envelope, None)
    }

    /// Send to every peer except `skip`.
    fn broadcast_except(&self, skip: &Uuid, envelope: &Envelope) -> usize {
        self.fan_out(envelope, Some(skip))
    }

    fn fan_out(&self, envelope: &Envelope, skip: Option<&Uuid>) -> usize {
        let mut dead = Vec::new();
        let mut delivered = 0;
        for peer in self.peers.iter() {
            if Some(peer.key()) == skip {
                continue;
            }
            if peer.value().send(envelope.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*peer.key());
            }
        }
        for id in dead {
            self.leave(&id);
        }
        delivered
    }

    // ─── Introspection ───────────────────────────────────────

    pub fn snapshot(&self) -> Vec<ChatEntry> {
        self.lock_log().entries.clone()
    }

    pub fn entry(&self, id: u64) -> Option<ChatEntry> {
        let log = self.lock_log();
        log.position(id).map(|pos| log.entries[pos].clone())
    }

    pub fn entry_count(&self) -> usize {
        self.lock_log().entries.len()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
