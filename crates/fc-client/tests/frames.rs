//! Stills flowing from a producer through the relay hub to consumers.

use std::sync::Arc;
use std::time::Duration;

use fc_client::{
    CaptureConfig, ConsumerView, FrameConsumer, FrameProducer, RelayLink, ScreenshotExporter,
    TestPatternDevice,
};
use fc_protocol::{CompressionLevel, Resolution, ResolutionPreset, SourceKind};
use fc_relay::Hub;
use tokio::sync::watch;

const STEP: Duration = Duration::from_secs(5);

fn spawn_consumer(hub: &Arc<Hub>) -> (uuid::Uuid, Arc<FrameConsumer>) {
    let (peer_id, tx, rx) = hub.attach();
    let consumer = Arc::new(FrameConsumer::new());
    let pump = consumer.clone();
    tokio::spawn(async move { pump.run(RelayLink::from_channels(tx, rx)).await });
    (peer_id, consumer)
}

async fn wait_for(
    changes: &mut watch::Receiver<ConsumerView>,
    accept: impl Fn(&ConsumerView) -> bool,
) -> ConsumerView {
    tokio::time::timeout(STEP, changes.wait_for(|view| accept(view)))
        .await
        .expect("timed out waiting for consumer view")
        .expect("consumer dropped")
        .clone()
}

#[tokio::test]
async fn test_frames_reach_consumer_but_not_sender() {
    let hub = Arc::new(Hub::new());
    let (_, consumer) = spawn_consumer(&hub);
    let mut changes = consumer.subscribe();

    let (_, tx, mut own_rx) = hub.attach();
    let config = CaptureConfig {
        compression: CompressionLevel::Medium,
        ..CaptureConfig::default()
    };
    let mut producer = FrameProducer::new(TestPatternDevice::default(), config, tx);
    producer.start().await.unwrap();

    let view = wait_for(&mut changes, |v| matches!(v, ConsumerView::Showing(_))).await;
    let ConsumerView::Showing(frame) = view else {
        unreachable!()
    };
    assert_eq!(frame.resolution(), Resolution::new(640, 480));
    assert_eq!(frame.compression(), Some(CompressionLevel::Medium));
    assert_eq!(frame.decode().unwrap().resolution(), Resolution::new(640, 480));

    producer.stop().await;

    // The sender only ever sees its own join snapshot.
    let mut kinds = Vec::new();
    while let Ok(envelope) = own_rx.try_recv() {
        kinds.push(envelope.kind());
    }
    assert_eq!(kinds, vec!["initial_messages"]);
}

#[tokio::test]
async fn test_consumer_follows_resolution_change() {
    let hub = Arc::new(Hub::new());
    let (_, consumer) = spawn_consumer(&hub);
    let mut changes = consumer.subscribe();

    let (_, tx, _own_rx) = hub.attach();
    let mut producer = FrameProducer::new(TestPatternDevice::default(), CaptureConfig::default(), tx);
    producer.start().await.unwrap();
    wait_for(&mut changes, |v| matches!(v, ConsumerView::Showing(_))).await;

    producer.set_resolution(ResolutionPreset::P720).await.unwrap();
    let view = wait_for(&mut changes, |v| {
        matches!(v, ConsumerView::Showing(f) if f.width == 1280)
    })
    .await;
    let ConsumerView::Showing(frame) = view else {
        unreachable!()
    };
    assert_eq!(frame.resolution(), Resolution::new(1280, 720));

    // Frames from the first run were all delivered before the restart's.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(consumer.latest().map(|f| f.width), Some(1280));

    producer.stop().await;
}

#[tokio::test]
async fn test_screen_share_and_snapshot_export() {
    let hub = Arc::new(Hub::new());
    let (_, tx, _own_rx) = hub.attach();
    let device = TestPatternDevice {
        screen: Resolution::new(320, 200),
    };
    let mut producer = FrameProducer::new(device, CaptureConfig::default(), tx);
    producer
        .start_with(SourceKind::Screen, ResolutionPreset::P1080)
        .await
        .unwrap();

    let still = producer.capture_single_frame().await.unwrap();
    assert_eq!(still.resolution(), Resolution::new(320, 200));
    assert!(still.to_data_url().starts_with("data:image/jpeg;base64,/9j/"));

    let dir = tempfile::tempdir().unwrap();
    let mut exporter = ScreenshotExporter::new(dir.path());
    let path = exporter.export(&still).unwrap();
    assert_eq!(path.file_name().unwrap(), "screenshot_0.jpg");
    assert_eq!(std::fs::read(&path).unwrap(), still.data.to_vec());

    producer.stop().await;
}

#[tokio::test]
async fn test_consumer_stops_on_disconnect() {
    let hub = Arc::new(Hub::new());
    let (peer_id, consumer) = spawn_consumer(&hub);
    let mut changes = consumer.subscribe();

    let (_, tx, _own_rx) = hub.attach();
    let mut producer = FrameProducer::new(TestPatternDevice::default(), CaptureConfig::default(), tx);
    producer.start().await.unwrap();
    wait_for(&mut changes, |v| matches!(v, ConsumerView::Showing(_))).await;

    hub.disconnect(&peer_id);
    wait_for(&mut changes, |v| *v == ConsumerView::Disconnected).await;
    assert!(consumer.latest().is_none());

    // Frames keep flowing to the hub, but this consumer is finished.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(consumer.view(), ConsumerView::Disconnected);

    producer.stop().await;
}
