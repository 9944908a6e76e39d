use image::{ImageReader, RgbImage};
use std::io::Cursor;

/// A camera frame with capture metadata.
///
/// The pixel data is always 8-bit RGB regardless of what the source
/// delivered; sources convert on the way in.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Unix millis at the moment the source produced the frame.
    pub captured_at_ms: i64,
    /// Per-source sequence number, starting at 0.
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Build a frame from raw interleaved rgb24 bytes.
    pub fn from_rgb24(
        width: u32,
        height: u32,
        data: Vec<u8>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        let got = data.len();
        let image = RgbImage::from_raw(width, height, data)
            .ok_or(FrameError::SizeMismatch { got, expected })?;
        Ok(Self::new(image, captured_at_ms, seq))
    }

    /// Decode an encoded image (JPEG, PNG, BMP...) into a frame.
    pub fn decode(encoded: &[u8], captured_at_ms: i64, seq: u64) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(encoded))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))?;
        Ok(Self::new(img.to_rgb8(), captured_at_ms, seq))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Human-readable capture time, e.g. "20260218T093000000Z".
    pub fn timestamp_label(&self) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now);
        dt.format("%Y%m%dT%H%M%S%3fZ").to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("raw frame has {got} bytes, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
    #[error("failed to decode image: {0}")]
    Decode(String),
}
