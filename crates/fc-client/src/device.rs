//! Capture devices: where raw samples come from.
//!
//! A [`CaptureDevice`] grants a [`RawSource`] for a camera or the screen.
//! Sources are wrapped in a [`SourceGuard`] so the underlying tracks are
//! released exactly once, however the capture run ends.

use std::future::Future;

use fc_protocol::{Resolution, SourceKind};

use crate::encoder::RawImage;
use crate::producer::CaptureError;

/// A live media source.
pub trait RawSource: Send + 'static {
    /// Size of the samples this source produces.
    fn native_resolution(&self) -> Resolution;

    /// The source's current sample. `None` if it has nothing yet.
    fn current_frame(&mut self) -> Option<RawImage>;

    /// Stop the underlying tracks.
    fn release(&mut self);
}

pub trait CaptureDevice: Send + Sync + 'static {
    /// Ask for a source. `requested` is a hint; screens ignore it.
    fn acquire(
        &self,
        kind: SourceKind,
        requested: Resolution,
    ) -> impl Future<Output = Result<Box<dyn RawSource>, CaptureError>> + Send;
}

/// Owns a source and releases it on drop.
pub struct SourceGuard {
    inner: Box<dyn RawSource>,
    released: bool,
}

impl SourceGuard {
    pub fn new(inner: Box<dyn RawSource>) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    pub fn native_resolution(&self) -> Resolution {
        self.inner.native_resolution()
    }

    pub fn current_frame(&mut self) -> Option<RawImage> {
        if self.released {
            return None;
        }
        self.inner.current_frame()
    }

    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.release();
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Synthetic device producing a moving colour gradient.
///
/// Stands in for camera and screen hardware on headless hosts.
#[derive(Debug, Clone)]
pub struct TestPatternDevice {
    /// Size reported for `SourceKind::Screen`.
    pub screen: Resolution,
}

impl Default for TestPatternDevice {
    fn default() -> Self {
        Self {
            screen: Resolution::new(1280, 800),
        }
    }
}

impl CaptureDevice for TestPatternDevice {
    async fn acquire(
        &self,
        kind: SourceKind,
        requested: Resolution,
    ) -> Result<Box<dyn RawSource>, CaptureError> {
        let size = match kind {
            SourceKind::Camera => requested,
            SourceKind::Screen => self.screen,
        };
        if size.width == 0 || size.height == 0 {
            return Err(CaptureError::Acquire {
                kind,
                reason: format!("invalid size {size}"),
            });
        }
        tracing::info!(source = %kind, %size, "Test pattern source acquired");
        Ok(Box::new(TestPattern {
            size,
            tick: 0,
            released: false,
        }))
    }
}

struct TestPattern {
    size: Resolution,
    tick: u32,
    released: bool,
}

impl RawSource for TestPattern {
    fn native_resolution(&self) -> Resolution {
        self.size
    }

    fn current_frame(&mut self) -> Option<RawImage> {
        if self.released {
            return None;
        }
        let Resolution { width, height } = self.size;
        let shift = (self.tick % 64) * 4;
        self.tick = self.tick.wrapping_add(1);

        let mut rgb = Vec::with_capacity(self.size.pixel_count() * 3);
        for y in 0..height {
            for x in 0..width {
                rgb.push(((x * 255 / width.max(1)) + shift) as u8);
                rgb.push(((y * 255 / height.max(1)) + shift / 2) as u8);
                rgb.push(shift as u8);
            }
        }
        Some(RawImage { width, height, rgb })
    }

    fn release(&mut self) {
        self.released = true;
        tracing::info!(size = %self.size, "Test pattern source released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted(Arc<AtomicUsize>);

    impl RawSource for Counted {
        fn native_resolution(&self) -> Resolution {
            Resolution::new(1, 1)
        }

        fn current_frame(&mut self) -> Option<RawImage> {
            Some(RawImage::filled(1, 1, [0, 0, 0]))
        }

        fn release(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_guard_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut guard = SourceGuard::new(Box::new(Counted(releases.clone())));
        assert!(guard.current_frame().is_some());

        guard.release();
        assert!(guard.current_frame().is_none());
        drop(guard);
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        drop(SourceGuard::new(Box::new(Counted(releases.clone()))));
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pattern_sizes() {
        let device = TestPatternDevice {
            screen: Resolution::new(320, 200),
        };

        let mut camera = device
            .acquire(SourceKind::Camera, Resolution::new(64, 48))
            .await
            .unwrap();
        let frame = camera.current_frame().unwrap();
        assert_eq!(frame.resolution(), Resolution::new(64, 48));
        assert_eq!(frame.rgb.len(), 64 * 48 * 3);

        let screen = device
            .acquire(SourceKind::Screen, Resolution::new(64, 48))
            .await
            .unwrap();
        assert_eq!(screen.native_resolution(), Resolution::new(320, 200));

        let denied = device
            .acquire(SourceKind::Camera, Resolution::new(0, 0))
            .await;
        assert!(matches!(denied, Err(CaptureError::Acquire { .. })));
    }
}
