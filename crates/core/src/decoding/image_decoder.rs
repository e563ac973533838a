use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image payload is empty")]
    Empty,
    #[error("expected a data URL of the form \"data:<mime>;base64,<payload>\"")]
    MissingDelimiter,
    #[error("unsupported data URL header {0:?}, expected \"data:<mime>;base64\"")]
    InvalidHeader(String),
    #[error("malformed base64 payload: {0}")]
    InvalidBase64(#[source] base64::DecodeError),
    #[error("not a decodable image: {0}")]
    InvalidImage(#[source] image::ImageError),
}

/// Raw image input as it arrives at the pipeline boundary.
#[derive(Debug)]
pub enum ImageInput<'a> {
    /// Encoded image container bytes (multipart upload).
    Bytes(&'a [u8]),
    /// `data:<mime>;base64,<payload>` string (JSON body).
    DataUrl(&'a str),
    /// Already-decoded camera frame.
    Frame(Frame),
}

/// Turns raw input into an RGB [`Frame`].
pub fn decode(input: ImageInput<'_>) -> Result<Frame, DecodeError> {
    match input {
        ImageInput::Bytes(bytes) => decode_bytes(bytes),
        ImageInput::DataUrl(url) => decode_data_url(url),
        ImageInput::Frame(frame) if frame.is_grayscale() => {
            let index = frame.index();
            Ok(Frame::from_image(frame.to_rgb_image().into(), index))
        }
        ImageInput::Frame(frame) => Ok(frame),
    }
}

pub fn decode_bytes(bytes: &[u8]) -> Result<Frame, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let image = image::load_from_memory(bytes).map_err(DecodeError::InvalidImage)?;
    Ok(Frame::from_image(image, 0))
}

pub fn decode_data_url(url: &str) -> Result<Frame, DecodeError> {
    let payload = split_data_url(url)?;
    let bytes = BASE64_STANDARD
        .decode(payload)
        .map_err(DecodeError::InvalidBase64)?;
    decode_bytes(&bytes)
}

/// Returns the base64 payload of a `data:<mime>;base64,<payload>` URL.
fn split_data_url(url: &str) -> Result<&str, DecodeError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DecodeError::Empty);
    }
    let (header, payload) = url.split_once(',').ok_or(DecodeError::MissingDelimiter)?;
    let is_base64_data = header
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
        && header.to_ascii_lowercase().ends_with(";base64");
    if !is_base64_data {
        return Err(DecodeError::InvalidHeader(header.to_string()));
    }
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(payload)
}
