use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use moodlens_core::pipeline::inference_error::InferenceError;

/// A failed request, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn missing_image() -> Self {
        Self::bad_request("no image provided")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        let status = match &err {
            InferenceError::Decode(_) => StatusCode::BAD_REQUEST,
            InferenceError::Normalization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            InferenceError::ModelUnavailable(_)
            | InferenceError::Detection(_)
            | InferenceError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Inference request failed: {err}");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodlens_core::classification::domain::emotion_classifier::ModelUnavailable;
    use moodlens_core::decoding::image_decoder::DecodeError;

    #[test]
    fn test_decode_error_is_bad_request() {
        let err = ApiError::from(InferenceError::Decode(DecodeError::MissingDelimiter));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unavailable_model_message_names_the_cause() {
        let err = ApiError::from(InferenceError::ModelUnavailable(ModelUnavailable {
            reason: "file missing".into(),
        }));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "emotion model is not loaded: file missing");
    }

    #[test]
    fn test_prediction_failure_message() {
        let err = ApiError::from(InferenceError::Prediction("boom".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "prediction failed: boom");
    }
}
