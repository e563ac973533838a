use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

pub type LocateError = Box<dyn std::error::Error + Send + Sync>;

/// Domain interface for face localisation.
///
/// Implementations are loaded once and shared read-only across requests
/// and the live loop, hence `&self` and `Sync`. The input is a grayscale
/// frame; every returned region lies inside it. An empty result means no
/// face was found and is not an error.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, LocateError>;
}

/// Locator that always reports the same boxes, clamped to the frame.
///
/// Used for tests and for deployments that only ever classify a fixed
/// crop (e.g. a kiosk camera framed on one face).
pub struct FixedFaceLocator {
    regions: Vec<FaceRegion>,
}

impl FixedFaceLocator {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }

    pub fn none() -> Self {
        Self::new(Vec::new())
    }
}

impl FaceLocator for FixedFaceLocator {
    fn locate(&self, gray: &Frame) -> Result<Vec<FaceRegion>, LocateError> {
        Ok(self
            .regions
            .iter()
            .filter_map(|r| {
                FaceRegion::clamped(
                    r.x as f64,
                    r.y as f64,
                    r.right() as f64,
                    r.bottom() as f64,
                    gray.width(),
                    gray.height(),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_locator_returns_regions_inside_frame() {
        let locator = FixedFaceLocator::new(vec![
            FaceRegion::new(0, 0, 10, 10),
            FaceRegion::new(15, 15, 10, 10),
            FaceRegion::new(100, 100, 5, 5),
        ]);
        let gray = Frame::new(vec![0u8; 20 * 20], 20, 20, 1, 0);
        let regions = locator.locate(&gray).unwrap();
        assert_eq!(
            regions,
            vec![FaceRegion::new(0, 0, 10, 10), FaceRegion::new(15, 15, 5, 5)]
        );
    }

    #[test]
    fn test_none_locator_is_empty_not_error() {
        let gray = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(FixedFaceLocator::none().locate(&gray).unwrap().is_empty());
    }
}
