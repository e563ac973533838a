use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::ArrayView3;

use crate::shared::region::FaceRegion;

/// A single camera frame or decoded upload: contiguous bytes in row-major
/// order, either RGB (3 channels) or grayscale (1 channel).
///
/// Format conversion happens at I/O boundaries only; the pipeline works on
/// RGB frames and derives grayscale copies for detection.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert!(
            channels == 1 || channels == 3,
            "frames carry 1 (grayscale) or 3 (RGB) channels"
        );
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Converts any decoded image into an RGB frame.
    pub fn from_image(image: DynamicImage, index: usize) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_grayscale(&self) -> bool {
        self.channels == 1
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Luma copy of this frame (ITU-R 601 weights, as `image` computes them).
    /// Grayscale frames are returned as a plain clone.
    pub fn to_grayscale(&self) -> Frame {
        if self.is_grayscale() {
            return self.clone();
        }
        let gray = image::imageops::grayscale(&self.to_rgb_image());
        Frame::new(gray.into_raw(), self.width, self.height, 1, self.index)
    }

    /// Copies the pixels covered by `region` into a new frame.
    ///
    /// Returns `None` when the region is empty or does not lie inside the frame.
    pub fn crop(&self, region: &FaceRegion) -> Option<Frame> {
        if region.width == 0 || region.height == 0 || !region.fits_within(self.width, self.height)
        {
            return None;
        }
        let c = self.channels as usize;
        let row_len = region.width as usize * c;
        let mut data = Vec::with_capacity(row_len * region.height as usize);
        for row in region.y..region.bottom() {
            let start = (row as usize * self.width as usize + region.x as usize) * c;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(
            data,
            region.width,
            region.height,
            self.channels,
            self.index,
        ))
    }

    /// RGB view for encoding and drawing. Grayscale frames are expanded.
    pub fn to_rgb_image(&self) -> RgbImage {
        if self.is_grayscale() {
            let gray = GrayImage::from_raw(self.width, self.height, self.data.clone())
                .expect("Frame data length must match dimensions");
            return DynamicImage::ImageLuma8(gray).into_rgb8();
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    /// Grayscale view for detection-side consumers.
    pub fn to_gray_image(&self) -> GrayImage {
        let gray = self.to_grayscale();
        GrayImage::from_raw(gray.width, gray.height, gray.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Frame::new(image.into_raw(), width, height, 3, 0)
    }
}
