//! Frame consumer: holds the most recent frame received from the relay.
//!
//! Latest wins; nothing is queued. Once the relay disconnects the consumer
//! is finished and ignores anything delivered afterwards.

use tokio::sync::watch;

use fc_protocol::{envelope, Envelope};

use crate::connection::RelayLink;
use crate::encoder::Frame;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerView {
    /// Connected, no frame yet.
    Waiting,
    Showing(Frame),
    Disconnected,
}

pub struct FrameConsumer {
    view: watch::Sender<ConsumerView>,
}

impl Default for FrameConsumer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameConsumer {
    pub fn new() -> Self {
        let (view, _) = watch::channel(ConsumerView::Waiting);
        Self { view }
    }

    /// Replace the held frame. Returns `false` if already disconnected.
    pub fn deliver(&self, frame: Frame) -> bool {
        self.view.send_if_modified(|view| match view {
            ConsumerView::Disconnected => false,
            _ => {
                *view = ConsumerView::Showing(frame);
                true
            }
        })
    }

    /// Feed one relay event; non-video events are ignored.
    pub fn on_event(&self, envelope: Envelope) -> bool {
        match envelope.payload {
            Some(envelope::Payload::Video(video)) => self.deliver(video.into()),
            _ => false,
        }
    }

    pub fn mark_disconnected(&self) {
        self.view.send_if_modified(|view| {
            if *view == ConsumerView::Disconnected {
                return false;
            }
            *view = ConsumerView::Disconnected;
            true
        });
    }

    pub fn view(&self) -> ConsumerView {
        self.view.borrow().clone()
    }

    pub fn latest(&self) -> Option<Frame> {
        match &*self.view.borrow() {
            ConsumerView::Showing(frame) => Some(frame.clone()),
            _ => None,
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(*self.view.borrow(), ConsumerView::Disconnected)
    }

    /// Watch view changes (for rendering surfaces).
    pub fn subscribe(&self) -> watch::Receiver<ConsumerView> {
        self.view.subscribe()
    }

    /// Pump `link` until the relay goes away, then mark disconnected.
    pub async fn run(&self, mut link: RelayLink) {
        let mut received: u64 = 0;
        while let Some(envelope) = link.recv().await {
            if self.on_event(envelope) {
                received += 1;
                if received % 25 == 1 {
                    tracing::debug!(received, "Frame received");
                }
            }
        }
        tracing::info!(received, "Relay disconnected, frame consumer stopped");
        self.mark_disconnected();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn frame(sequence: u32) -> Frame {
        Frame {
            data: Bytes::from(vec![0xFF, 0xD8, sequence as u8]),
            width: 4,
            height: 3,
            quality: 70,
            sequence,
        }
    }

    #[test]
    fn test_latest_wins() {
        let consumer = FrameConsumer::new();
        assert_eq!(consumer.view(), ConsumerView::Waiting);
        assert!(consumer.latest().is_none());

        for k in 1..=3 {
            assert!(consumer.deliver(frame(k)));
            assert_eq!(consumer.latest(), Some(frame(k)));
        }
        assert_eq!(consumer.view(), ConsumerView::Showing(frame(3)));
    }

    #[test]
    fn test_disconnected_is_terminal() {
        let consumer = FrameConsumer::new();
        consumer.deliver(frame(1));
        consumer.mark_disconnected();

        assert!(!consumer.deliver(frame(2)));
        assert!(consumer.is_disconnected());
        assert!(consumer.latest().is_none());
    }

    #[test]
    fn test_non_video_events_ignored() {
        let consumer = FrameConsumer::new();
        let chat = Envelope::new(envelope::Payload::Chat(fc_protocol::ChatEntry::draft("a", "b")));
        assert!(!consumer.on_event(chat));
        assert_eq!(consumer.view(), ConsumerView::Waiting);

        let video = Envelope::new(envelope::Payload::Video(frame(7).to_video_payload()));
        assert!(consumer.on_event(video));
        assert_eq!(consumer.latest().map(|f| f.sequence), Some(7));
    }

    #[tokio::test]
    async fn test_run_until_disconnect() {
        let consumer = FrameConsumer::new();
        let mut changes = consumer.subscribe();
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        in_tx
            .send(Envelope::new(envelope::Payload::Video(frame(1).to_video_payload())))
            .unwrap();
        drop(in_tx);

        consumer.run(RelayLink::from_channels(out_tx, in_rx)).await;
        assert!(consumer.is_disconnected());
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), ConsumerView::Disconnected);
    }
}
