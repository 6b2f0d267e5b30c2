//! List synchronizer: one endpoint's replica of the shared chat list.
//!
//! Local intents (append, edit, delete) are validated here and turned into
//! relay payloads; nothing is applied locally until the relay echoes the
//! event back. Every replica therefore applies one event stream in relay
//! order. Entries are addressed on the wire by their relay-issued id, and by
//! position only at this API's edge.

use fc_protocol::{envelope, ChatDelete, ChatEdit, ChatEntry};

/// A local intent that was refused before anything was emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("message text is empty")]
    EmptyText,

    #[error("no entry at position {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("entry {index} belongs to '{author}'")]
    NotOwner { index: usize, author: String },
}

/// Effect of one relay event on the local replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The list was replaced by an `initial_messages` snapshot.
    Snapshot { len: usize },
    Appended { index: usize },
    Edited { index: usize },
    Deleted { index: usize },
    /// The event addressed an entry this replica does not hold; dropped.
    Stale { id: u64 },
    /// The relay refused one of our mutations; nothing changed.
    Rejected { id: u64, reason: String },
    /// Not a chat event.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ListSynchronizer {
    display_name: String,
    /// Ordered by id, which is also relay order.
    entries: Vec<ChatEntry>,
}

impl ListSynchronizer {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries rendered as `"author: text"`, in list order.
    pub fn rendered(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |e| e.id).ok()
    }

    // ─── Local intents ───────────────────────────────────────

    /// Build the `chat` event for a new entry.
    pub fn append(&self, text: &str) -> Result<envelope::Payload, SyncError> {
        if text.trim().is_empty() {
            return Err(SyncError::EmptyText);
        }
        Ok(envelope::Payload::Chat(ChatEntry::draft(
            &self.display_name,
            text,
        )))
    }

    /// Build the `edit` event replacing the text of our entry at `index`.
    pub fn edit(&self, index: usize, text: &str) -> Result<envelope::Payload, SyncError> {
        let entry = self.owned_entry(index)?;
        if text.trim().is_empty() {
            return Err(SyncError::EmptyText);
        }
        Ok(envelope::Payload::Edit(ChatEdit {
            id: entry.id,
            message: fc_protocol::format_entry(&self.display_name, text),
        }))
    }

    /// Build the `delete` event for our entry at `index`.
    pub fn delete(&self, index: usize) -> Result<envelope::Payload, SyncError> {
        let entry = self.owned_entry(index)?;
        Ok(envelope::Payload::Delete(ChatDelete { id: entry.id }))
    }

    /// Current text of our entry at `index`, for pre-filling an edit.
    pub fn draft_for_edit(&self, index: usize) -> Result<&str, SyncError> {
        self.owned_entry(index).map(ChatEntry::text)
    }

    fn owned_entry(&self, index: usize) -> Result<&ChatEntry, SyncError> {
        let entry = self.entries.get(index).ok_or(SyncError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })?;
        if !entry.is_authored_by(&self.display_name) {
            return Err(SyncError::NotOwner {
                index,
                author: entry.author().to_string(),
            });
        }
        Ok(entry)
    }

    // ─── Remote events ───────────────────────────────────────

    /// Replace the replica wholesale.
    pub fn snapshot(&mut self, mut entries: Vec<ChatEntry>) -> Applied {
        entries.sort_by_key(|e| e.id);
        self.entries = entries;
        Applied::Snapshot {
            len: self.entries.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Apply one event delivered by the relay.
    pub fn apply_remote(&mut self, payload: envelope::Payload) -> Applied {
        match payload {
            envelope::Payload::InitialMessages(init) => self.snapshot(init.entries),
            envelope::Payload::Chat(entry) => {
                if entry.id == 0 {
                    tracing::debug!("Dropping chat entry without a relay id");
                    return Applied::Ignored;
                }
                match self.entries.binary_search_by_key(&entry.id, |e| e.id) {
                    Ok(_) => Applied::Stale { id: entry.id },
                    Err(index) => {
                        self.entries.insert(index, entry);
                        Applied::Appended { index }
                    }
                }
            }
            envelope::Payload::Edit(edit) => match self.position_of(edit.id) {
                Some(index) => {
                    self.entries[index].message = edit.message;
                    Applied::Edited { index }
                }
                None => {
                    tracing::trace!(id = edit.id, "Edit for unknown entry dropped");
                    Applied::Stale { id: edit.id }
                }
            },
            envelope::Payload::Delete(delete) => match self.position_of(delete.id) {
                Some(index) => {
                    self.entries.remove(index);
                    Applied::Deleted { index }
                }
                None => {
                    tracing::trace!(id = delete.id, "Delete for unknown entry dropped");
                    Applied::Stale { id: delete.id }
                }
            },
            envelope::Payload::Rejected(rejected) => Applied::Rejected {
                id: rejected.id,
                reason: rejected.reason,
            },
            envelope::Payload::Video(_) => Applied::Ignored,
        }
    }
}
