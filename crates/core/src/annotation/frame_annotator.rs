use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::classification::domain::emotion_label::EmotionLabel;
use crate::shared::region::FaceRegion;

const LABEL_FONT_SIZE: f32 = 22.0;
/// Gap between the label's bottom edge and the box top.
const LABEL_OFFSET: i32 = 10;
const LABEL_PADDING: i32 = 2;
const BOX_THICKNESS: u32 = 2;
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Fonts tried, in order, when no font file is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Draws face boxes and emotion labels onto live frames.
///
/// Works in the source frame's coordinate space. Without a font only the
/// boxes are drawn.
pub struct FrameAnnotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl FrameAnnotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(LABEL_FONT_SIZE),
        }
    }

    /// Loads `font_path`, or the first readable system font when `None`.
    pub fn with_font_file(font_path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match font_path {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };
        let font = candidates.iter().find_map(|path| {
            let bytes = std::fs::read(path).ok()?;
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("Annotation font: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable font {}: {e}", path.display());
                    None
                }
            }
        });
        if font.is_none() {
            log::warn!("No annotation font available; live frames get boxes without labels");
        }
        Self::new(font)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws one face: a rectangle around `region` and `label` just above it.
    pub fn annotate(&self, canvas: &mut RgbImage, region: &FaceRegion, label: EmotionLabel) {
        if region.width == 0 || region.height == 0 {
            return;
        }
        for t in 0..BOX_THICKNESS {
            let (w, h) = (
                region.width.saturating_sub(2 * t),
                region.height.saturating_sub(2 * t),
            );
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((region.x + t) as i32, (region.y + t) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }

        let Some(font) = self.font.as_ref() else {
            return;
        };
        let text = label.as_str();
        let (text_w, text_h) = text_size(self.scale, font, text);
        let (x, y) = label_origin(region, text_h as i32 + 2 * LABEL_PADDING);

        let background = Rect::at(x, y).of_size(
            text_w + 2 * LABEL_PADDING as u32,
            text_h + 2 * LABEL_PADDING as u32,
        );
        draw_filled_rect_mut(canvas, background, BOX_COLOR);
        draw_text_mut(
            canvas,
            TEXT_COLOR,
            x + LABEL_PADDING,
            y + LABEL_PADDING,
            self.scale,
            font,
            text,
        );
    }
}

/// Top-left corner of a label `label_h` pixels tall, placed `LABEL_OFFSET`
/// pixels above the box and clamped to the top of the frame.
fn label_origin(region: &FaceRegion, label_h: i32) -> (i32, i32) {
    let y = region.y as i32 - LABEL_OFFSET - label_h;
    (region.x as i32, y.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
    }

    #[test]
    fn test_box_drawn_on_region_border() {
        let annotator = FrameAnnotator::new(None);
        let mut canvas = blank(100, 100);
        annotator.annotate(&mut canvas, &FaceRegion::new(20, 30, 40, 30), EmotionLabel::Happy);

        assert_eq!(*canvas.get_pixel(20, 30), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(59, 59), BOX_COLOR);
        // Second ring of the 2 px border
        assert_eq!(*canvas.get_pixel(21, 40), BOX_COLOR);
        // Interior and outside untouched
        assert_eq!(*canvas.get_pixel(40, 45), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_box_touching_frame_edges_does_not_panic() {
        let annotator = FrameAnnotator::new(None);
        let mut canvas = blank(64, 48);
        annotator.annotate(&mut canvas, &FaceRegion::new(0, 0, 64, 48), EmotionLabel::Sad);
        assert_eq!(*canvas.get_pixel(0, 0), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(63, 47), BOX_COLOR);
    }

    #[test]
    fn test_tiny_region_draws_single_ring() {
        let annotator = FrameAnnotator::new(None);
        let mut canvas = blank(10, 10);
        annotator.annotate(&mut canvas, &FaceRegion::new(4, 4, 2, 2), EmotionLabel::Fear);
        assert_eq!(*canvas.get_pixel(4, 4), BOX_COLOR);
    }

    #[test]
    fn test_label_sits_above_box() {
        assert_eq!(label_origin(&FaceRegion::new(50, 100, 40, 40), 20), (50, 70));
    }

    #[test]
    fn test_label_clamped_at_top_edge() {
        assert_eq!(label_origin(&FaceRegion::new(5, 3, 40, 40), 20), (5, 0));
    }

    #[test]
    fn test_missing_font_file_falls_back_to_boxes_only() {
        let annotator = FrameAnnotator::with_font_file(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!annotator.has_font());
    }
}
