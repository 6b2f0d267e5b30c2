//! Wire messages exchanged between clients and the relay.
//!
//! Every WebSocket binary message carries exactly one [`Envelope`]. The
//! payload variant is the event name of the relay contract.

use bytes::Bytes;

/// Top-level frame on the relay channel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    /// Unique message id (UUID v4).
    #[prost(string, tag = "1")]
    pub id: String,
    /// Sender wall clock, milliseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub sent_at_ms: i64,
    #[prost(oneof = "envelope::Payload", tags = "10, 11, 12, 13, 14, 15")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    /// Event carried by an [`Envelope`](super::Envelope).
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// `initial_messages`: full snapshot, relay → client on connect.
        #[prost(message, tag = "10")]
        InitialMessages(super::InitialMessages),
        /// `chat`: append. Clients send `id = 0`; the relay fills it in.
        #[prost(message, tag = "11")]
        Chat(super::ChatEntry),
        /// `edit`: overwrite the entry with the given id.
        #[prost(message, tag = "12")]
        Edit(super::ChatEdit),
        /// `delete`: remove the entry with the given id.
        #[prost(message, tag = "13")]
        Delete(super::ChatDelete),
        /// `video`: replaces the consumer's latest frame.
        #[prost(message, tag = "14")]
        Video(super::VideoFrame),
        /// Relay → sender only: the addressed entry no longer exists.
        #[prost(message, tag = "15")]
        Rejected(super::MutationRejected),
    }
}

/// One chat entry, stored as the formatted `"author: text"` string.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ChatEntry {
    /// Relay-issued id. Zero until the relay has accepted the append.
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitialMessages {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<ChatEntry>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ChatEdit {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    /// Replacement entry, already formatted as `"author: text"`.
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ChatDelete {
    #[prost(uint64, tag = "1")]
    pub id: u64,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct MutationRejected {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(string, tag = "2")]
    pub reason: String,
}

/// One encoded still frame.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VideoFrame {
    /// JPEG bytes.
    #[prost(bytes = "bytes", tag = "1")]
    pub data: Bytes,
    #[prost(uint32, tag = "2")]
    pub width: u32,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    /// JPEG quality (1–100) the frame was encoded with.
    #[prost(uint32, tag = "4")]
    pub quality: u32,
    /// Per-capture-session sample counter.
    #[prost(uint32, tag = "5")]
    pub sequence: u32,
}
