use std::sync::Arc;

use moodlens_core::history::prediction_logger::PredictionLogger;
use moodlens_core::pipeline::classify_image_use_case::ClassifyImageUseCase;
use moodlens_core::pipeline::frame_inference::FrameInference;
use moodlens_core::pipeline::stream_hub::StreamHub;

/// Shared by every handler. All members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub classify: Arc<ClassifyImageUseCase>,
    pub logger: Arc<PredictionLogger>,
    pub hub: StreamHub,
}

impl AppState {
    pub fn new(inference: Arc<FrameInference>, logger: Arc<PredictionLogger>, hub: StreamHub) -> Self {
        Self {
            classify: Arc::new(ClassifyImageUseCase::new(inference)),
            logger,
            hub,
        }
    }
}
