use serde::Serialize;

/// Axis-aligned face bounding box in source-frame pixel coordinates.
///
/// Produced fresh by the face locator for every frame and never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width × height` frame.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Clamps raw detector coordinates (which may fall outside the frame
    /// or be negative) into a region inside `frame_w × frame_h`.
    ///
    /// Returns `None` if nothing of the box remains inside the frame.
    pub fn clamped(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        frame_w: u32,
        frame_h: u32,
    ) -> Option<Self> {
        let left = x1.max(0.0).floor() as u32;
        let top = y1.max(0.0).floor() as u32;
        let right = (x2.min(frame_w as f64).max(0.0).ceil() as u32).min(frame_w);
        let bottom = (y2.min(frame_h as f64).max(0.0).ceil() as u32).min(frame_h);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self::new(left, top, right - left, bottom - top))
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        self.right() <= frame_w && self.bottom() <= frame_h
    }
}
