/// Emotion classifier backed by an ONNX Runtime session.
///
/// Accepts `[1, H, W, C]` tensors from the region normalizer. Models exported
/// channels-first (`[N, C, H, W]`) get the tensor permuted before inference.
use std::path::Path;
use std::sync::Mutex;

use crate::classification::domain::emotion_classifier::{EmotionClassifier, PredictError};
use crate::normalization::normalized_region::NormalizedRegion;
use crate::shared::onnx_session::{first_input_shape, load_session};

/// Tolerance when deciding whether raw output is already a distribution.
const DISTRIBUTION_TOLERANCE: f32 = 0.02;

pub struct OnnxEmotionClassifier {
    session: Mutex<ort::session::Session>,
    input_shape: Option<Vec<i64>>,
}

impl OnnxEmotionClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let input_shape = first_input_shape(&session);
        log::info!(
            "Emotion classifier loaded from {} (input shape {:?})",
            model_path.display(),
            input_shape
        );
        Ok(Self {
            session: Mutex::new(session),
            input_shape,
        })
    }

    fn channels_first(&self, channels: usize) -> bool {
        match self.input_shape.as_deref() {
            Some([_, c, _, last]) => *c == channels as i64 && *last != channels as i64,
            _ => false,
        }
    }
}

impl EmotionClassifier for OnnxEmotionClassifier {
    fn input_shape(&self) -> Option<Vec<i64>> {
        self.input_shape.clone()
    }

    fn predict(&self, region: &NormalizedRegion) -> Result<Vec<f32>, PredictError> {
        let channels_first = self.channels_first(region.channels());
        let mut tensor = region.clone().into_tensor();
        if channels_first {
            tensor = tensor.permuted_axes([0, 3, 1, 2]).as_standard_layout().to_owned();
        }
        let input_value = ort::value::Tensor::from_array(tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("emotion model produced no outputs".into());
        }
        let scores = outputs[0].try_extract_array::<f32>()?;
        let scores: Vec<f32> = scores.iter().copied().collect();
        Ok(to_distribution(scores))
    }
}

/// Passes probabilities through unchanged and softmaxes raw logits.
fn to_distribution(scores: Vec<f32>) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|&s| (0.0..=1.0).contains(&s))
        && (sum - 1.0).abs() <= DISTRIBUTION_TOLERANCE;
    if is_distribution || scores.is_empty() {
        return scores;
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_probabilities_pass_through() {
        let probs = vec![0.1, 0.0, 0.0, 0.6, 0.1, 0.1, 0.1];
        assert_eq!(to_distribution(probs.clone()), probs);
    }

    #[test]
    fn test_logits_are_softmaxed() {
        let out = to_distribution(vec![2.0, -1.0, 0.5, 4.0, 0.0, 0.0, 1.0]);
        assert_relative_eq!(out.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        let argmax = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert_eq!(argmax, 3);
    }

    #[test]
    fn test_empty_output_stays_empty() {
        assert!(to_distribution(Vec::new()).is_empty());
    }
}
