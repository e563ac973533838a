use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageError, RgbImage};

use crate::shared::constants::{DEFAULT_JPEG_QUALITY, STREAM_BOUNDARY};

/// `Content-Type` of the live stream response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Turns annotated frames into parts of a multipart-replace stream.
///
/// Each part is `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`.
#[derive(Clone, Copy, Debug)]
pub struct StreamEncoder {
    quality: u8,
}

impl StreamEncoder {
    /// `quality` is clamped to the JPEG range 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode_jpeg(&self, image: &RgbImage) -> Result<Vec<u8>, ImageError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        encoder.encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }

    /// JPEG-encodes `image` and wraps it in one stream part.
    pub fn encode_part(&self, image: &RgbImage) -> Result<Vec<u8>, ImageError> {
        let jpeg = self.encode_jpeg(image)?;
        Ok(frame_part(&jpeg))
    }
}

impl Default for StreamEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

/// Wraps already-encoded JPEG bytes in the part framing.
pub fn frame_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}
