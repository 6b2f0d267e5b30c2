//! # fc-client
//!
//! FrameChat endpoint library: the chat list synchronizer and session, the
//! relay connection, and the still-frame producer and consumer.

pub mod connection;
pub mod consumer;
pub mod device;
pub mod encoder;
pub mod export;
pub mod producer;
pub mod session;
pub mod sync;

pub use connection::{connect, RelayLink};
pub use consumer::{ConsumerView, FrameConsumer};
pub use device::{CaptureDevice, RawSource, TestPatternDevice};
pub use encoder::{Frame, FrameEncoder, RawImage};
pub use export::ScreenshotExporter;
pub use producer::{CaptureConfig, CaptureError, FrameProducer, ProducerState};
pub use session::{Session, SessionError};
pub use sync::{Applied, ListSynchronizer, SyncError};
