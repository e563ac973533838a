/// BlazeFace face locator using ONNX Runtime via `ort`.
///
/// A lightweight detector that produces bounding boxes only. The session
/// sits behind a mutex because `ort` needs `&mut` to run; the locator
/// itself is shared read-only across the server.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_locator::{FaceLocator, LocateError};
use crate::shared::frame::Frame;
use crate::shared::onnx_session::load_session;
use crate::shared::region::FaceRegion;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_NMS_IOU: f64 = 0.3;
pub const DEFAULT_MIN_FACE_SIZE: u32 = 20;

/// Detector parameters. Fixed when the locator is built, never per request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocatorConfig {
    pub confidence: f64,
    pub nms_iou: f64,
    /// Boxes smaller than this on either side are discarded.
    pub min_face_size: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            nms_iou: DEFAULT_NMS_IOU,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
        }
    }
}

pub struct OnnxBlazefaceLocator {
    session: Mutex<ort::session::Session>,
    config: LocatorConfig,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceLocator {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path, config: LocatorConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        log::info!(
            "Face locator loaded from {} (confidence {:.2}, nms {:.2})",
            model_path.display(),
            config.confidence,
            config.nms_iou
        );
        Ok(Self {
            session: Mutex::new(session),
            config,
            anchors: generate_anchors(),
        })
    }
}

impl FaceLocator for OnnxBlazefaceLocator {
    fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, LocateError> {
        let input_tensor = preprocess(gray, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence logits)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw = decode_boxes(
            reg_data,
            score_data,
            &self.anchors,
            self.config.confidence,
            gray.width(),
            gray.height(),
        );
        let kept = nms(&mut raw, self.config.nms_iou);

        Ok(to_regions(&kept, gray.width(), gray.height(), self.config.min_face_size))
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize a (grayscale or RGB) frame to `size × size` and normalize to
/// [0,1] NCHW float32 with three channels. Gray is replicated per channel.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    if src_h == 0 || src_w == 0 {
        return tensor;
    }

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                let sc = c.min(channels - 1);
                tensor[[0, c, y, x]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding + NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    score: f64,
}

/// Decode anchor-relative boxes into frame coordinates, keeping only those
/// above the confidence threshold. Coordinates may still exceed the frame.
fn decode_boxes(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    confidence: f64,
    fw: u32,
    fh: u32,
) -> Vec<RawDet> {
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if (score as f64) < confidence {
            continue;
        }
        let offset = i * REGRESSOR_STRIDE;
        if offset + 4 > reg_data.len() {
            break;
        }

        let anchor = anchors[i];
        let cx = anchor[0] + reg_data[offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[offset + 3] / INPUT_SIZE as f32;

        dets.push(RawDet {
            x1: ((cx - w / 2.0) * fw as f32) as f64,
            y1: ((cy - h / 2.0) * fh as f32) as f64,
            x2: ((cx + w / 2.0) * fw as f32) as f64,
            y2: ((cy + h / 2.0) * fh as f32) as f64,
            score: score as f64,
        });
    }

    dets
}

fn nms(dets: &mut [RawDet], iou_thresh: f64) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

/// Clamp kept detections into the frame and drop tiny or empty ones.
fn to_regions(dets: &[RawDet], fw: u32, fh: u32, min_size: u32) -> Vec<FaceRegion> {
    dets.iter()
        .filter_map(|d| FaceRegion::clamped(d.x1, d.y1, d.x2, d.y2, fw, fh))
        .filter(|r| r.width >= min_size && r.height >= min_size)
        .collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> RawDet {
        RawDet {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    #[test]
    fn test_preprocess_shape_from_grayscale() {
        let frame = Frame::new(vec![128u8; 200 * 100], 200, 100, 1, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_replicates_gray_into_every_channel() {
        let frame = Frame::new(vec![255u8; 50 * 50], 50, 50, 1, 0);
        let tensor = preprocess(&frame, 128);
        for c in 0..3 {
            assert!((tensor[[0, c, 64, 64]] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_filters_low_confidence() {
        let anchors = generate_anchors();
        let mut scores = vec![-10.0f32; NUM_ANCHORS];
        let mut reg = vec![0.0f32; NUM_ANCHORS * REGRESSOR_STRIDE];
        // Anchor 0 sits at (1/32, 1/32); give it a 32px (model space) box.
        scores[0] = 10.0;
        reg[2] = 32.0;
        reg[3] = 32.0;

        let dets = decode_boxes(&reg, &scores, &anchors, 0.5, 128, 128);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x1 - (4.0 - 16.0)).abs() < 1e-3);
        assert!((dets[0].x2 - (4.0 + 16.0)).abs() < 1e-3);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.9),
            det(5.0, 5.0, 105.0, 105.0, 0.7),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].score - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.8),
            det(200.0, 200.0, 250.0, 250.0, 0.9),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_to_regions_clamps_edge_boxes() {
        let dets = vec![det(-12.0, -3.0, 40.0, 50.0, 0.9), det(90.0, 60.0, 130.0, 90.0, 0.8)];
        let regions = to_regions(&dets, 100, 80, 10);
        assert_eq!(regions[0], FaceRegion::new(0, 0, 40, 50));
        assert_eq!(regions[1].right(), 100);
        assert_eq!(regions[1].bottom(), 80);
        assert!(regions.iter().all(|r| r.fits_within(100, 80)));
    }

    #[test]
    fn test_to_regions_drops_tiny_boxes() {
        let dets = vec![det(10.0, 10.0, 15.0, 40.0, 0.9)];
        assert!(to_regions(&dets, 100, 100, 20).is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert_eq!(config.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(config.min_face_size, DEFAULT_MIN_FACE_SIZE);
    }
}
