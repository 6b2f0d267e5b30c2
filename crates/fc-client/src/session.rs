//! Chat session: a display name bound to one relay connection.
//!
//! A session exists from connect to disconnect. It owns the local replica
//! and the link; once the relay goes away the replica is cleared and every
//! further intent fails with [`SessionError::NotConnected`].

use fc_protocol::{envelope, ChatEntry, Envelope};

use crate::connection::{self, RelayLink};
use crate::sync::{Applied, ListSynchronizer, SyncError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("display name is empty")]
    EmptyDisplayName,

    #[error("session is not connected")]
    NotConnected,

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("connection failed: {0}")]
    Connect(#[source] anyhow::Error),
}

pub struct Session {
    sync: ListSynchronizer,
    link: Option<RelayLink>,
}

impl Session {
    /// Bind `display_name` to an established link.
    pub fn join(display_name: &str, link: RelayLink) -> Result<Self, SessionError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyDisplayName);
        }
        tracing::info!(display_name = %name, "Chat session started");
        Ok(Self {
            sync: ListSynchronizer::new(name),
            link: Some(link),
        })
    }

    /// Validate the name, then dial the relay.
    pub async fn connect(url: &str, display_name: &str) -> Result<Self, SessionError> {
        if display_name.trim().is_empty() {
            return Err(SessionError::EmptyDisplayName);
        }
        let link = connection::connect(url)
            .await
            .map_err(SessionError::Connect)?;
        Self::join(display_name, link)
    }

    pub fn display_name(&self) -> &str {
        self.sync.display_name()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        self.sync.entries()
    }

    pub fn rendered(&self) -> Vec<&str> {
        self.sync.rendered()
    }

    pub fn append(&mut self, text: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let payload = self.sync.append(text)?;
        self.emit(payload)
    }

    pub fn edit(&mut self, index: usize, text: &str) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let payload = self.sync.edit(index, text)?;
        self.emit(payload)
    }

    pub fn delete(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_connected()?;
        let payload = self.sync.delete(index)?;
        self.emit(payload)
    }

    /// Text of our entry at `index`, to pre-fill an edit prompt.
    pub fn draft_for_edit(&self, index: usize) -> Result<&str, SessionError> {
        self.ensure_connected()?;
        Ok(self.sync.draft_for_edit(index)?)
    }

    /// Wait for the next relay event and apply it.
    ///
    /// Returns `None` once disconnected; the replica is cleared at that point.
    /// Cancel-safe.
    pub async fn next_update(&mut self) -> Option<Applied> {
        let link = self.link.as_mut()?;
        match link.recv().await {
            Some(envelope) => Some(self.apply(envelope)),
            None => {
                tracing::info!(display_name = %self.sync.display_name(), "Relay connection lost");
                self.teardown();
                None
            }
        }
    }

    /// Leave the relay and discard local state.
    pub fn disconnect(&mut self) {
        if self.link.is_some() {
            tracing::info!(display_name = %self.sync.display_name(), "Chat session ended");
        }
        self.teardown();
    }

    fn apply(&mut self, envelope: Envelope) -> Applied {
        let Some(payload) = envelope.payload else {
            return Applied::Ignored;
        };
        let applied = self.sync.apply_remote(payload);
        match &applied {
            Applied::Rejected { id, reason } => {
                tracing::warn!(id, %reason, "Relay rejected mutation");
            }
            Applied::Snapshot { len } => {
                tracing::debug!(entries = len, "Received list snapshot");
            }
            _ => {}
        }
        applied
    }

    fn emit(&mut self, payload: envelope::Payload) -> Result<(), SessionError> {
        let sent = self.link.as_ref().is_some_and(|link| link.send(payload));
        if !sent {
            self.teardown();
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        match &self.link {
            Some(_) => Ok(()),
            None => Err(SessionError::NotConnected),
        }
    }

    fn teardown(&mut self) {
        self.link = None;
        self.sync.clear();
    }
}
