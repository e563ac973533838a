use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Json;
use serde::Deserialize;

use moodlens_core::decoding::image_decoder::ImageInput;

use crate::error::ApiError;

/// Multipart part names that carry the upload.
const UPLOAD_FIELDS: [&str; 2] = ["file", "image"];

/// The image of a prediction request: a multipart upload or a JSON data URL.
///
/// A request with neither is rejected with 400.
#[derive(Debug)]
pub enum ImagePayload {
    Upload(Vec<u8>),
    DataUrl(String),
}

impl ImagePayload {
    pub fn as_input(&self) -> ImageInput<'_> {
        match self {
            Self::Upload(bytes) => ImageInput::Bytes(bytes),
            Self::DataUrl(url) => ImageInput::DataUrl(url),
        }
    }
}

#[derive(Deserialize)]
struct JsonImage {
    image: Option<String>,
}

impl<S> FromRequest<S> for ImagePayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?
            {
                let is_upload = field.name().is_some_and(|n| UPLOAD_FIELDS.contains(&n));
                if !is_upload {
                    continue;
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                if bytes.is_empty() {
                    return Err(ApiError::missing_image());
                }
                return Ok(Self::Upload(bytes.to_vec()));
            }
            return Err(ApiError::missing_image());
        }

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<JsonImage>::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            return match body.image {
                Some(url) if !url.trim().is_empty() => Ok(Self::DataUrl(url)),
                _ => Err(ApiError::missing_image()),
            };
        }

        Err(ApiError::missing_image())
    }
}
