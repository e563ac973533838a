use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array4;
use thiserror::Error;

use crate::normalization::normalized_region::NormalizedRegion;
use crate::shared::constants::EMOTION_INPUT_SIZE;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("region {0:?} is empty")]
    EmptyRegion(FaceRegion),
    #[error("region {region:?} lies outside the {frame_w}x{frame_h} frame")]
    OutOfBounds {
        region: FaceRegion,
        frame_w: u32,
        frame_h: u32,
    },
    #[error("unsupported channel count {0} (expected 1 or 3)")]
    UnsupportedChannels(u8),
    #[error("could not shape normalized tensor: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Crops, resizes and rescales face regions into classifier input.
///
/// Steps, in order: crop → resize to `size × size` (triangle filter, so the
/// result is deterministic) → convert to the expected color layout →
/// divide by 255 → add the leading batch and trailing channel dimensions.
#[derive(Clone, Copy, Debug)]
pub struct RegionNormalizer {
    size: u32,
}

impl RegionNormalizer {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Normalizes `region` of `frame`, or the whole frame when `region` is
    /// `None`. `expected_channels` is 1 (grayscale) or 3 (RGB).
    pub fn normalize(
        &self,
        frame: &Frame,
        region: Option<&FaceRegion>,
        expected_channels: u8,
    ) -> Result<NormalizedRegion, NormalizationError> {
        if expected_channels != 1 && expected_channels != 3 {
            return Err(NormalizationError::UnsupportedChannels(expected_channels));
        }
        let region = region
            .copied()
            .unwrap_or_else(|| FaceRegion::full_frame(frame.width(), frame.height()));
        let crop = crop(frame, &region)?;

        let resized = self.resize(crop);
        let pixels = match expected_channels {
            1 => resized.into_luma8().into_raw(),
            _ => resized.into_rgb8().into_raw(),
        };

        let s = self.size as usize;
        let values: Vec<f32> = pixels.into_iter().map(|v| v as f32 / 255.0).collect();
        let tensor = Array4::from_shape_vec((1, s, s, expected_channels as usize), values)?;
        Ok(NormalizedRegion::new(tensor))
    }

    fn resize(&self, crop: Frame) -> DynamicImage {
        if crop.is_grayscale() {
            let gray = crop.to_gray_image();
            DynamicImage::ImageLuma8(imageops::resize(
                &gray,
                self.size,
                self.size,
                FilterType::Triangle,
            ))
        } else {
            let rgb = crop.to_rgb_image();
            DynamicImage::ImageRgb8(imageops::resize(
                &rgb,
                self.size,
                self.size,
                FilterType::Triangle,
            ))
        }
    }
}

impl Default for RegionNormalizer {
    fn default() -> Self {
        Self::new(EMOTION_INPUT_SIZE)
    }
}

fn crop(frame: &Frame, region: &FaceRegion) -> Result<Frame, NormalizationError> {
    if region.width == 0 || region.height == 0 {
        return Err(NormalizationError::EmptyRegion(*region));
    }
    frame
        .crop(region)
        .ok_or(NormalizationError::OutOfBounds {
            region: *region,
            frame_w: frame.width(),
            frame_h: frame.height(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Frame {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[rstest]
    #[case::grayscale(1)]
    #[case::rgb(3)]
    fn test_output_shape(#[case] channels: u8) {
        let frame = solid_rgb(120, 90, [200, 100, 50]);
        let region = FaceRegion::new(10, 10, 64, 70);
        let out = RegionNormalizer::default()
            .normalize(&frame, Some(&region), channels)
            .unwrap();
        assert_eq!(out.shape(), &[1, 48, 48, channels as usize]);
    }

    #[test]
    fn test_values_rescaled_to_unit_range() {
        let frame = solid_rgb(60, 60, [255, 255, 255]);
        let out = RegionNormalizer::default().normalize(&frame, None, 1).unwrap();
        assert!(out.view().iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_relative_eq!(out.mean(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rgb_keeps_channel_order() {
        let frame = solid_rgb(48, 48, [255, 0, 51]);
        let out = RegionNormalizer::default().normalize(&frame, None, 3).unwrap();
        let view = out.view();
        assert_relative_eq!(view[[0, 10, 10, 0]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(view[[0, 10, 10, 1]], 0.0, epsilon = 1e-6);
        assert_relative_eq!(view[[0, 10, 10, 2]], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_grayscale_source_expanded_to_rgb() {
        let frame = Frame::new(vec![51u8; 30 * 30], 30, 30, 1, 0);
        let out = RegionNormalizer::default().normalize(&frame, None, 3).unwrap();
        assert_eq!(out.channels(), 3);
        assert_relative_eq!(out.mean(), 0.2, epsilon = 1e-4);
    }

    #[test]
    fn test_deterministic() {
        let mut data = Vec::new();
        for i in 0..(97 * 83 * 3) {
            data.push((i % 251) as u8);
        }
        let frame = Frame::new(data, 97, 83, 3, 0);
        let normalizer = RegionNormalizer::default();
        let a = normalizer.normalize(&frame, None, 1).unwrap();
        let b = normalizer.normalize(&frame, None, 1).unwrap();
        assert_eq!(a.view(), b.view());
    }

    #[rstest]
    #[case::left_edge(FaceRegion::new(0, 5, 20, 20))]
    #[case::right_edge(FaceRegion::new(80, 5, 20, 20))]
    #[case::bottom_right_corner(FaceRegion::new(70, 50, 30, 30))]
    #[case::whole_frame(FaceRegion::new(0, 0, 100, 80))]
    fn test_edge_touching_regions_do_not_fail(#[case] region: FaceRegion) {
        let frame = solid_rgb(100, 80, [10, 20, 30]);
        assert!(RegionNormalizer::default()
            .normalize(&frame, Some(&region), 1)
            .is_ok());
    }

    #[test]
    fn test_out_of_bounds_region_is_error() {
        let frame = solid_rgb(100, 80, [10, 20, 30]);
        let err = RegionNormalizer::default()
            .normalize(&frame, Some(&FaceRegion::new(90, 0, 20, 20)), 1)
            .unwrap_err();
        assert!(matches!(err, NormalizationError::OutOfBounds { .. }));
    }

    #[test]
    fn test_zero_size_region_is_error() {
        let frame = solid_rgb(100, 80, [10, 20, 30]);
        let err = RegionNormalizer::default()
            .normalize(&frame, Some(&FaceRegion::new(5, 5, 0, 10)), 1)
            .unwrap_err();
        assert!(matches!(err, NormalizationError::EmptyRegion(_)));
    }

    #[test]
    fn test_unsupported_channels() {
        let frame = solid_rgb(10, 10, [0, 0, 0]);
        let err = RegionNormalizer::default()
            .normalize(&frame, None, 4)
            .unwrap_err();
        assert!(matches!(err, NormalizationError::UnsupportedChannels(4)));
    }

    #[test]
    fn test_custom_size() {
        let frame = solid_rgb(10, 10, [0, 0, 0]);
        let out = RegionNormalizer::new(64).normalize(&frame, None, 1).unwrap();
        assert_eq!(out.size(), 64);
    }
}
