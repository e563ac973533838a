use std::sync::Arc;

use serde::Serialize;

use crate::classification::domain::emotion_classifier::{EmotionModel, Prediction};
use crate::detection::domain::face_locator::FaceLocator;
use crate::history::prediction_logger::PredictionLogger;
use crate::normalization::channel_policy::ChannelPolicy;
use crate::normalization::region_normalizer::RegionNormalizer;
use crate::pipeline::inference_error::InferenceError;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

/// What to classify when the locator finds no face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoFaceMode {
    /// Nothing: the result is empty and nothing is logged.
    #[default]
    Empty,
    /// The whole image, treated as one face.
    WholeImage,
}

/// One classified face.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FaceOutcome {
    pub region: FaceRegion,
    pub prediction: Prediction,
}

/// The per-frame pipeline shared by uploads and the live stream:
/// locate → normalize → classify → log.
///
/// Everything inside is read-only after construction except the prediction
/// log, which carries its own lock; one instance serves all requests.
pub struct FrameInference {
    locator: Arc<dyn FaceLocator>,
    model: EmotionModel,
    normalizer: RegionNormalizer,
    channels: ChannelPolicy,
    logger: Arc<PredictionLogger>,
    no_face: NoFaceMode,
}

impl FrameInference {
    /// The channel policy is resolved here, once, from the model's declared
    /// input shape.
    pub fn new(
        locator: Arc<dyn FaceLocator>,
        model: EmotionModel,
        logger: Arc<PredictionLogger>,
    ) -> Self {
        let channels = match model.classifier() {
            Ok(classifier) => ChannelPolicy::resolve(classifier.input_shape().as_deref()),
            Err(_) => ChannelPolicy::DefaultGrayscale,
        };
        Self {
            locator,
            model,
            normalizer: RegionNormalizer::default(),
            channels,
            logger,
            no_face: NoFaceMode::default(),
        }
    }

    pub fn with_no_face_mode(mut self, mode: NoFaceMode) -> Self {
        self.no_face = mode;
        self
    }

    pub fn model(&self) -> &EmotionModel {
        &self.model
    }

    pub fn channel_policy(&self) -> ChannelPolicy {
        self.channels
    }

    pub fn logger(&self) -> &Arc<PredictionLogger> {
        &self.logger
    }

    /// Classifies every face in `frame`, in locator order, and appends one
    /// log record per classified face.
    ///
    /// Regions that fail normalization are skipped with a warning. The call
    /// fails only when the model is absent, detection or a prediction
    /// fails, or every region was skipped. A failed call logs nothing.
    pub fn classify_frame(&self, frame: &Frame) -> Result<Vec<FaceOutcome>, InferenceError> {
        let classifier = self.model.classifier()?;

        let gray = frame.to_grayscale();
        let mut regions = self
            .locator
            .locate(&gray)
            .map_err(InferenceError::Detection)?;
        if regions.is_empty() {
            match self.no_face {
                NoFaceMode::Empty => return Ok(Vec::new()),
                NoFaceMode::WholeImage => {
                    regions.push(FaceRegion::full_frame(frame.width(), frame.height()))
                }
            }
        }

        let expected_channels = self.channels.channels();
        let mut outcomes = Vec::with_capacity(regions.len());
        let mut last_skip = None;
        for region in regions {
            let normalized = match self.normalizer.normalize(frame, Some(&region), expected_channels)
            {
                Ok(normalized) => normalized,
                Err(e) => {
                    log::warn!("Skipping face region {region:?}: {e}");
                    last_skip = Some(e);
                    continue;
                }
            };
            let scores = classifier
                .predict(&normalized)
                .map_err(InferenceError::Prediction)?;
            let prediction = Prediction::from_distribution(&scores)
                .map_err(|e| InferenceError::Prediction(e.into()))?;
            outcomes.push(FaceOutcome { region, prediction });
        }

        if outcomes.is_empty() {
            if let Some(e) = last_skip {
                return Err(InferenceError::Normalization(e));
            }
        }
        for outcome in &outcomes {
            self.logger.append(outcome.prediction.label);
        }
        Ok(outcomes)
    }
}
