//! Still-frame encoding: raw RGB samples in, JPEG [`Frame`]s out.
//!
//! Each sample is drawn into a canvas-sized intermediate buffer (resizing if
//! the source does not match the canvas) and then JPEG-encoded at the
//! quality in force for that sample.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, ImageBuffer, ImageEncoder, ImageFormat, Rgb, RgbImage};

use fc_protocol::{CompressionLevel, Resolution, VideoFrame};

use crate::producer::CaptureError;

/// One uncompressed sample from a capture source, packed RGB8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl RawImage {
    /// A single-colour image.
    pub fn filled(width: u32, height: u32, pixel: [u8; 3]) -> Self {
        let rgb = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, rgb }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// An encoded still frame, as carried by a `video` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// JPEG bytes.
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub sequence: u32,
}

impl Frame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// `data:image/jpeg;base64,...` form of the frame.
    pub fn to_data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(&self.data))
    }

    pub fn to_video_payload(&self) -> VideoFrame {
        VideoFrame {
            data: self.data.clone(),
            width: self.width,
            height: self.height,
            quality: self.quality as u32,
            sequence: self.sequence,
        }
    }

    pub fn compression(&self) -> Option<CompressionLevel> {
        CompressionLevel::from_jpeg_quality(self.quality)
    }

    /// Decode back to RGB for display.
    pub fn decode(&self) -> Result<RawImage, CaptureError> {
        let image = image::load_from_memory_with_format(&self.data, ImageFormat::Jpeg)
            .map_err(|e| CaptureError::Encode(format!("JPEG decode failed: {e}")))?
            .to_rgb8();
        Ok(RawImage {
            width: image.width(),
            height: image.height(),
            rgb: image.into_raw(),
        })
    }
}

impl From<VideoFrame> for Frame {
    fn from(video: VideoFrame) -> Self {
        Self {
            data: video.data,
            width: video.width,
            height: video.height,
            quality: video.quality.min(100) as u8,
            sequence: video.sequence,
        }
    }
}

/// Canvas plus JPEG encoder for one capture run.
pub struct FrameEncoder {
    canvas: RgbImage,
    /// Number of frames encoded (for sequence numbers and logging)
    frame_count: u64,
}

impl FrameEncoder {
    pub fn new(canvas: Resolution) -> Self {
        Self {
            canvas: RgbImage::new(canvas.width, canvas.height),
            frame_count: 0,
        }
    }

    pub fn canvas(&self) -> Resolution {
        Resolution::new(self.canvas.width(), self.canvas.height())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Draw `raw` onto the canvas and encode it.
    pub fn encode(&mut self, raw: &RawImage, quality: u8) -> Result<Frame, CaptureError> {
        self.draw(raw)?;

        let (width, height) = self.canvas.dimensions();
        let mut jpeg_buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, quality.clamp(1, 100));
        encoder
            .write_image(self.canvas.as_raw(), width, height, ColorType::Rgb8.into())
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        let sequence = self.frame_count as u32;
        self.frame_count += 1;
        if self.frame_count % 25 == 1 {
            tracing::debug!(
                "Encoded frame #{} ({}x{}, q{}, {} bytes)",
                self.frame_count,
                width,
                height,
                quality,
                jpeg_buf.get_ref().len()
            );
        }

        Ok(Frame {
            data: Bytes::from(jpeg_buf.into_inner()),
            width,
            height,
            quality,
            sequence,
        })
    }

    fn draw(&mut self, raw: &RawImage) -> Result<(), CaptureError> {
        // `from_raw` accepts trailing bytes; the canvas copy needs an exact fit.
        let expected = raw.width as usize * raw.height as usize * 3;
        let source: ImageBuffer<Rgb<u8>, &[u8]> = (raw.rgb.len() == expected)
            .then(|| ImageBuffer::from_raw(raw.width, raw.height, raw.rgb.as_slice()))
            .flatten()
            .ok_or_else(|| {
                CaptureError::Encode(format!(
                    "raw sample is {} bytes, expected {} for {}x{}",
                    raw.rgb.len(),
                    expected,
                    raw.width,
                    raw.height
                ))
            })?;

        if source.dimensions() == self.canvas.dimensions() {
            self.canvas.copy_from_slice(source.as_raw());
        } else {
            let (width, height) = self.canvas.dimensions();
            self.canvas = imageops::resize(&source, width, height, FilterType::Triangle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_resizes_to_canvas() {
        let mut encoder = FrameEncoder::new(Resolution::new(64, 48));
        let raw = RawImage::filled(160, 120, [200, 40, 40]);

        let frame = encoder.encode(&raw, 70).unwrap();
        assert_eq!(frame.resolution(), Resolution::new(64, 48));
        assert_eq!(frame.quality, 70);
        assert_eq!(frame.sequence, 0);
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);

        let decoded = frame.decode().unwrap();
        assert_eq!((decoded.width, decoded.height), (64, 48));

        let next = encoder.encode(&raw, 70).unwrap();
        assert_eq!(next.sequence, 1);
        assert_eq!(encoder.frame_count(), 2);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        // Noisy content so quality actually matters.
        let rgb: Vec<u8> = (0..128u32 * 96 * 3)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let raw = RawImage {
            width: 128,
            height: 96,
            rgb,
        };
        let mut encoder = FrameEncoder::new(raw.resolution());

        let high = encoder.encode(&raw, CompressionLevel::High.jpeg_quality()).unwrap();
        let low = encoder.encode(&raw, CompressionLevel::Low.jpeg_quality()).unwrap();
        assert!(low.data.len() < high.data.len());
        assert_eq!(low.compression(), Some(CompressionLevel::Low));
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let mut encoder = FrameEncoder::new(Resolution::new(8, 8));
        let raw = RawImage {
            width: 8,
            height: 8,
            rgb: vec![0; 10],
        };
        assert!(matches!(
            encoder.encode(&raw, 70),
            Err(CaptureError::Encode(_))
        ));
    }

    #[test]
    fn test_oversized_buffer_is_an_error() {
        let mut encoder = FrameEncoder::new(Resolution::new(8, 8));
        let raw = RawImage {
            width: 8,
            height: 8,
            rgb: vec![0; 8 * 8 * 3 + 3],
        };
        assert!(matches!(
            encoder.encode(&raw, 70),
            Err(CaptureError::Encode(_))
        ));

        // The encoder is still usable afterwards.
        let ok = encoder.encode(&RawImage::filled(8, 8, [1, 2, 3]), 70).unwrap();
        assert_eq!(ok.sequence, 0);
    }

    #[test]
    fn test_data_url_and_payload() {
        let frame = Frame {
            data: Bytes::from_static(&[0xFF, 0xD8, 0xFF]),
            width: 2,
            height: 1,
            quality: 30,
            sequence: 4,
        };
        assert_eq!(frame.to_data_url(), "data:image/jpeg;base64,/9j/");

        let payload = frame.to_video_payload();
        assert_eq!(payload.quality, 30);
        assert_eq!(Frame::from(payload), frame);
    }
}
