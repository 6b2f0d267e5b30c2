//! Frame producer: samples a capture source on a fixed cadence and emits
//! JPEG stills as `video` events.
//!
//! One capture run at a time. A run is a spawned sampling task plus a
//! shutdown signal; stopping signals the task, waits for it to finish and
//! releases the source before returning, so two runs never overlap. A run
//! that ends on its own releases the source before the task exits.
//!
//! Sampling and JPEG encoding run on the blocking pool so a slow encode
//! never stalls the runtime workers.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use fc_common::config::CaptureSettings;
use fc_protocol::{
    envelope, CompressionLevel, Envelope, Resolution, ResolutionPreset, SourceKind,
    DEFAULT_CADENCE_MS,
};

use crate::connection::RelaySender;
use crate::device::{CaptureDevice, SourceGuard};
use crate::encoder::{Frame, FrameEncoder};

const MIN_CADENCE: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("could not acquire {kind} source: {reason}")]
    Acquire { kind: SourceKind, reason: String },

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("source has no frame available")]
    NoFrame,

    #[error("not capturing")]
    NotCapturing,

    #[error("failed to write screenshot: {0}")]
    Export(#[from] std::io::Error),
}

/// Parameters for the next capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub source: SourceKind,
    pub resolution: ResolutionPreset,
    pub compression: CompressionLevel,
    pub cadence: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            resolution: ResolutionPreset::default(),
            compression: CompressionLevel::default(),
            cadence: Duration::from_millis(DEFAULT_CADENCE_MS),
        }
    }
}

impl From<&CaptureSettings> for CaptureConfig {
    fn from(settings: &CaptureSettings) -> Self {
        Self {
            source: settings.source,
            resolution: settings.resolution,
            compression: settings.compression,
            cadence: Duration::from_millis(settings.cadence_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Idle,
    Capturing,
}

struct CaptureTask {
    handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    source: Arc<Mutex<SourceGuard>>,
    canvas: Resolution,
}

pub struct FrameProducer<D> {
    device: D,
    config: CaptureConfig,
    /// JPEG quality read by the sampling task on every tick.
    quality: Arc<AtomicU8>,
    tx: RelaySender,
    task: Option<CaptureTask>,
}

impl<D: CaptureDevice> FrameProducer<D> {
    pub fn new(device: D, mut config: CaptureConfig, tx: RelaySender) -> Self {
        // `tokio::time::interval` panics on a zero period.
        config.cadence = config.cadence.max(MIN_CADENCE);
        Self {
            device,
            quality: Arc::new(AtomicU8::new(config.compression.jpeg_quality())),
            config,
            tx,
            task: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> ProducerState {
        match &self.task {
            Some(task) if !task.handle.is_finished() => ProducerState::Capturing,
            _ => ProducerState::Idle,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.state() == ProducerState::Capturing
    }

    /// Canvas size of the current run.
    pub fn canvas(&self) -> Option<Resolution> {
        self.task.as_ref().map(|task| task.canvas)
    }

    /// Start capturing with the configured source and resolution.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_capturing() {
            tracing::debug!("Capture already running");
            return Ok(());
        }
        // Reap a run that ended on its own (e.g. the relay went away).
        self.stop().await;

        let requested = self.config.resolution.dimensions();
        let source = match self.device.acquire(self.config.source, requested).await {
            Ok(source) => SourceGuard::new(source),
            Err(e) => {
                tracing::warn!(source = %self.config.source, "Capture source unavailable: {}", e);
                return Err(e);
            }
        };
        let canvas = match self.config.source {
            SourceKind::Camera => requested,
            SourceKind::Screen => source.native_resolution(),
        };

        let source = Arc::new(Mutex::new(source));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(sampling_loop(
            source.clone(),
            canvas,
            self.quality.clone(),
            self.config.cadence,
            self.tx.clone(),
            shutdown_rx,
        ));

        tracing::info!(
            source = %self.config.source,
            %canvas,
            compression = %self.config.compression,
            cadence_ms = self.config.cadence.as_millis() as u64,
            "Capture started"
        );
        self.task = Some(CaptureTask {
            handle,
            shutdown_tx: Some(shutdown_tx),
            source,
            canvas,
        });
        Ok(())
    }

    /// Start with an explicit source and resolution. No-op while capturing.
    pub async fn start_with(
        &mut self,
        source: SourceKind,
        resolution: ResolutionPreset,
    ) -> Result<(), CaptureError> {
        if self.is_capturing() {
            tracing::debug!("Capture already running");
            return Ok(());
        }
        self.config.source = source;
        self.config.resolution = resolution;
        self.start().await
    }

    /// Stop the sampling task and release the source. Idempotent.
    pub async fn stop(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        if let Some(tx) = task.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = task.handle.await {
            if !e.is_cancelled() {
                tracing::warn!("Capture task failed: {}", e);
            }
        }
        task.source.lock().await.release();
        tracing::info!(canvas = %task.canvas, "Capture stopped");
    }

    /// Switch resolution. While capturing this restarts the run.
    pub async fn set_resolution(
        &mut self,
        resolution: ResolutionPreset,
    ) -> Result<(), CaptureError> {
        if resolution == self.config.resolution {
            return Ok(());
        }
        self.config.resolution = resolution;
        if !self.is_capturing() {
            return Ok(());
        }
        tracing::info!(%resolution, "Restarting capture for new resolution");
        self.stop().await;
        self.start().await
    }

    /// Switch compression; the next sample uses it.
    pub fn set_compression(&mut self, compression: CompressionLevel) {
        self.config.compression = compression;
        self.quality.store(compression.jpeg_quality(), Ordering::Relaxed);
        tracing::debug!(%compression, "Compression changed");
    }

    /// Encode the source's current sample without emitting it.
    pub async fn capture_single_frame(&self) -> Result<Frame, CaptureError> {
        let task = self.task.as_ref().ok_or(CaptureError::NotCapturing)?;
        let source = task.source.clone();
        let canvas = task.canvas;
        let quality = self.quality.load(Ordering::Relaxed);

        tokio::task::spawn_blocking(move || {
            let raw = source
                .blocking_lock()
                .current_frame()
                .ok_or(CaptureError::NoFrame)?;
            FrameEncoder::new(canvas).encode(&raw, quality)
        })
        .await
        .map_err(|e| CaptureError::Encode(format!("encode thread failed: {e}")))?
    }
}

impl<D> Drop for FrameProducer<D> {
    fn drop(&mut self) {
        if let Some(mut task) = self.task.take() {
            if let Some(tx) = task.shutdown_tx.take() {
                let _ = tx.send(());
            }
            task.handle.abort();
        }
    }
}

async fn sampling_loop(
    source: Arc<Mutex<SourceGuard>>,
    canvas: Resolution,
    quality: Arc<AtomicU8>,
    cadence: Duration,
    tx: RelaySender,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut encoder = FrameEncoder::new(canvas);
    let mut sent = 0u64;
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {}
        }

        let q = quality.load(Ordering::Relaxed);
        let sample = tokio::task::spawn_blocking({
            let source = source.clone();
            move || {
                let result = source
                    .blocking_lock()
                    .current_frame()
                    .map(|raw| encoder.encode(&raw, q));
                (encoder, result)
            }
        })
        .await;

        let frame = match sample {
            Ok((returned, result)) => {
                encoder = returned;
                match result {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        tracing::warn!("Dropping sample: {}", e);
                        continue;
                    }
                    None => continue,
                }
            }
            Err(e) => {
                tracing::error!("Sampling thread failed: {}", e);
                break;
            }
        };

        let envelope = Envelope::new(envelope::Payload::Video(frame.to_video_payload()));
        if tx.send(envelope).is_err() {
            tracing::info!("Relay link closed, ending capture");
            break;
        }
        sent += 1;
    }

    source.lock().await.release();
    tracing::debug!(frames = sent, "Sampling loop exited");
}
