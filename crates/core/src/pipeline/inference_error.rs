use thiserror::Error;

use crate::classification::domain::emotion_classifier::{ModelUnavailable, PredictError};
use crate::decoding::image_decoder::DecodeError;
use crate::detection::domain::face_locator::LocateError;
use crate::normalization::region_normalizer::NormalizationError;

/// Request-level failure of the inference pipeline.
///
/// Region-level normalization failures are skipped inside the pipeline and
/// only surface here when no region could be classified at all.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),
    #[error("face detection failed: {0}")]
    Detection(LocateError),
    #[error("prediction failed: {0}")]
    Prediction(PredictError),
    #[error("no face region could be normalized: {0}")]
    Normalization(#[from] NormalizationError),
}
