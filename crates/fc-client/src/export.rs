//! Screenshot export: writes stills as `screenshot_{n}.jpg`.

use std::path::{Path, PathBuf};

use crate::encoder::Frame;
use crate::producer::CaptureError;

pub struct ScreenshotExporter {
    dir: PathBuf,
    /// Number of screenshots written so far; the next file's index.
    count: u32,
}

impl ScreenshotExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            count: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Write `frame` and return the path it was written to.
    pub fn export(&mut self, frame: &Frame) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("screenshot_{}.jpg", self.count));
        std::fs::write(&path, &frame.data)?;
        self.count += 1;
        tracing::info!(path = %path.display(), bytes = frame.data.len(), "Screenshot saved");
        Ok(path)
    }
}
