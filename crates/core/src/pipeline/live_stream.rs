use std::sync::Arc;
use std::time::Instant;

use crate::annotation::frame_annotator::FrameAnnotator;
use crate::capture::domain::frame_source::FrameSource;
use crate::decoding::image_decoder::{decode, ImageInput};
use crate::pipeline::frame_inference::FrameInference;
use crate::pipeline::inference_error::InferenceError;
use crate::pipeline::pipeline_metrics::PipelineMetrics;
use crate::shared::frame::Frame;
use crate::streaming::stream_encoder::StreamEncoder;

/// The live path: camera frame → classify → annotate → JPEG → stream part.
pub struct LiveStream {
    inference: Arc<FrameInference>,
    annotator: FrameAnnotator,
    encoder: StreamEncoder,
}

impl LiveStream {
    pub fn new(
        inference: Arc<FrameInference>,
        annotator: FrameAnnotator,
        encoder: StreamEncoder,
    ) -> Self {
        Self {
            inference,
            annotator,
            encoder,
        }
    }

    /// One full pipeline pass over `frame`, returning one stream part.
    ///
    /// A frame that cannot be classified is still streamed, unannotated.
    pub fn process_frame(
        &self,
        frame: &Frame,
        metrics: &mut dyn PipelineMetrics,
    ) -> Result<Vec<u8>, image::ImageError> {
        let t0 = Instant::now();
        let outcomes = match self.inference.classify_frame(frame) {
            Ok(outcomes) => outcomes,
            Err(InferenceError::ModelUnavailable(e)) => {
                log::debug!("Frame {} not classified: {e}", frame.index());
                Vec::new()
            }
            Err(e) => {
                log::warn!("Frame {} not classified: {e}", frame.index());
                Vec::new()
            }
        };
        metrics.timing("inference", elapsed_ms(t0));
        metrics.metric("faces", outcomes.len() as f64);

        let t1 = Instant::now();
        let mut canvas = frame.to_rgb_image();
        for outcome in &outcomes {
            self.annotator
                .annotate(&mut canvas, &outcome.region, outcome.prediction.label);
        }
        metrics.timing("annotate", elapsed_ms(t1));

        let t2 = Instant::now();
        let part = self.encoder.encode_part(&canvas)?;
        metrics.timing("encode", elapsed_ms(t2));
        metrics.frame_done();
        Ok(part)
    }

    /// Pulls frames from `source` and hands each part to `sink` until the
    /// source ends, a read fails, or `sink` returns `false`.
    ///
    /// All three are clean terminations. Returns the number of parts emitted.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        metrics: &mut dyn PipelineMetrics,
        mut sink: impl FnMut(Vec<u8>) -> bool,
    ) -> usize {
        let mut emitted = 0;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("Camera signalled end of stream");
                    break;
                }
                Err(e) => {
                    log::warn!("Camera read failed, ending stream: {e}");
                    break;
                }
            };
            let frame = match decode(ImageInput::Frame(frame)) {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Skipping undecodable camera frame: {e}");
                    continue;
                }
            };
            let part = match self.process_frame(&frame, metrics) {
                Ok(part) => part,
                Err(e) => {
                    log::warn!("Failed to encode frame {}: {e}", frame.index());
                    continue;
                }
            };
            emitted += 1;
            if !sink(part) {
                break;
            }
        }
        metrics.summary();
        emitted
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
