use std::sync::Arc;

use crate::classification::domain::emotion_classifier::Prediction;
use crate::decoding::image_decoder::{self, ImageInput};
use crate::pipeline::frame_inference::FrameInference;
use crate::pipeline::inference_error::InferenceError;

/// Single-shot classification of one uploaded image:
/// decode → locate → normalize → classify → log.
pub struct ClassifyImageUseCase {
    inference: Arc<FrameInference>,
}

impl ClassifyImageUseCase {
    pub fn new(inference: Arc<FrameInference>) -> Self {
        Self { inference }
    }

    /// One prediction per classified face, in locator order.
    pub fn execute(&self, input: ImageInput<'_>) -> Result<Vec<Prediction>, InferenceError> {
        self.inference.model().classifier()?;
        let frame = image_decoder::decode(input)?;
        let outcomes = self.inference.classify_frame(&frame)?;
        Ok(outcomes.into_iter().map(|o| o.prediction).collect())
    }

    /// The most confident face, or `None` when no face was found.
    /// Every classified face is still logged.
    pub fn execute_single(&self, input: ImageInput<'_>) -> Result<Option<Prediction>, InferenceError> {
        let predictions = self.execute(input)?;
        Ok(predictions.into_iter().reduce(|best, p| {
            if p.confidence > best.confidence {
                p
            } else {
                best
            }
        }))
    }
}
