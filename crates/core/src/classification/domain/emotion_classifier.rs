use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::classification::domain::emotion_label::EmotionLabel;
use crate::normalization::normalized_region::NormalizedRegion;

pub type PredictError = Box<dyn std::error::Error + Send + Sync>;

/// Domain interface for emotion scoring.
///
/// Weights are loaded once and shared read-only; `predict` is a pure
/// function of its input.
pub trait EmotionClassifier: Send + Sync {
    /// Declared input shape (e.g. `[-1, 48, 48, 1]`), if the model exposes one.
    fn input_shape(&self) -> Option<Vec<i64>>;

    /// Probability distribution over [`EmotionLabel::ALL`], in that order.
    fn predict(&self, region: &NormalizedRegion) -> Result<Vec<f32>, PredictError>;
}

#[derive(Error, Debug, PartialEq)]
pub enum DistributionError {
    #[error("classifier returned {len} scores, expected {}", EmotionLabel::ALL.len())]
    TooShort { len: usize },
    #[error("classifier returned a non-finite score")]
    NotFinite,
}

/// Arg-max label of one distribution together with its score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "emotion")]
    pub label: EmotionLabel,
    pub confidence: f32,
}

impl Prediction {
    /// Picks the arg-max over the label set. Entries past the label set are
    /// ignored; ties resolve to the lower index.
    pub fn from_distribution(scores: &[f32]) -> Result<Self, DistributionError> {
        let n = EmotionLabel::ALL.len();
        if scores.len() < n {
            return Err(DistributionError::TooShort { len: scores.len() });
        }
        let scores = &scores[..n];
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(DistributionError::NotFinite);
        }

        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, s)| {
                if s > best.1 {
                    (i, s)
                } else {
                    best
                }
            });
        Ok(Self {
            label: EmotionLabel::ALL[index],
            confidence,
        })
    }
}

#[derive(Error, Debug, Clone)]
#[error("emotion model is not loaded: {reason}")]
pub struct ModelUnavailable {
    pub reason: String,
}

/// The classifier as loaded at startup: either usable or known-absent.
///
/// An absent model makes every prediction fail fast without attempting
/// inference.
#[derive(Clone)]
pub enum EmotionModel {
    Loaded(Arc<dyn EmotionClassifier>),
    Unavailable { reason: String },
}

impl EmotionModel {
    pub fn loaded(classifier: impl EmotionClassifier + 'static) -> Self {
        Self::Loaded(Arc::new(classifier))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn classifier(&self) -> Result<&Arc<dyn EmotionClassifier>, ModelUnavailable> {
        match self {
            Self::Loaded(classifier) => Ok(classifier),
            Self::Unavailable { reason } => Err(ModelUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}
