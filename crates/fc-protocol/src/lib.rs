//! # fc-protocol
//!
//! Shared protocol types for FrameChat: the relay envelope, chat entry
//! formatting and capture presets.

pub mod entry;
pub mod preset;
pub mod proto;

pub use entry::{format_entry, split_entry, AUTHOR_SEPARATOR};
pub use preset::{CompressionLevel, Resolution, ResolutionPreset, SourceKind};
pub use proto::*;

use prost::Message as ProstMessage;

/// Protocol version; bump on breaking wire changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum message size (10 MB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Fixed sampling cadence of the frame producer (25 samples per second).
pub const DEFAULT_CADENCE_MS: u64 = 40;

impl Envelope {
    /// Wrap a payload with a fresh id and the current timestamp.
    pub fn new(payload: envelope::Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sent_at_ms: chrono::Utc::now().timestamp_millis(),
            payload: Some(payload),
        }
    }

    /// Event name of the payload, as used in logs.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            Some(payload) => payload.kind(),
            None => "empty",
        }
    }

    /// Encode to a standalone protobuf buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode a buffer received from the transport.
    pub fn from_bytes(data: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(data)
    }
}

impl envelope::Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitialMessages(_) => "initial_messages",
            Self::Chat(_) => "chat",
            Self::Edit(_) => "edit",
            Self::Delete(_) => "delete",
            Self::Video(_) => "video",
            Self::Rejected(_) => "rejected",
        }
    }
}

impl From<envelope::Payload> for Envelope {
    fn from(payload: envelope::Payload) -> Self {
        Self::new(payload)
    }
}
