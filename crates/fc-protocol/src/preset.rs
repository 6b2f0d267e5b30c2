//! Capture quality presets shared by the producer, the config layer and the CLI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a capture canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Named camera resolutions offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[default]
    #[serde(rename = "480p")]
    P480,
}

impl ResolutionPreset {
    pub const fn dimensions(self) -> Resolution {
        match self {
            Self::P1080 => Resolution::new(1920, 1080),
            Self::P720 => Resolution::new(1280, 720),
            Self::P480 => Resolution::new(640, 480),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
        }
    }

    /// Lenient lookup: anything unrecognised selects the default (480p).
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl fmt::Display for ResolutionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResolutionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1080p" => Ok(Self::P1080),
            "720p" => Ok(Self::P720),
            "480p" => Ok(Self::P480),
            other => Err(format!("unknown resolution preset '{other}' (1080p, 720p, 480p)")),
        }
    }
}

/// Encoder compression presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    #[default]
    High,
    Medium,
    Low,
}

impl CompressionLevel {
    /// Encoder quality factor in `0.0..=1.0`.
    pub const fn quality_factor(self) -> f32 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.7,
            Self::Low => 0.3,
        }
    }

    /// The factor expressed as a JPEG quality value (1–100).
    pub fn jpeg_quality(self) -> u8 {
        (self.quality_factor() * 100.0).round().clamp(1.0, 100.0) as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Inverse of [`jpeg_quality`](Self::jpeg_quality); unknown values map to `None`.
    pub fn from_jpeg_quality(quality: u8) -> Option<Self> {
        [Self::High, Self::Medium, Self::Low]
            .into_iter()
            .find(|level| level.jpeg_quality() == quality)
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown compression level '{other}' (high, medium, low)")),
        }
    }
}

/// Where raw frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Camera,
    Screen,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Camera => "camera",
            Self::Screen => "screen",
        })
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "camera" => Ok(Self::Camera),
            "screen" => Ok(Self::Screen),
            other => Err(format!("unknown source '{other}' (camera, screen)")),
        }
    }
}
