use ndarray::{Array4, ArrayView4};

/// Classifier-ready tensor of one face: `[1, size, size, channels]` float32
/// with every value in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct NormalizedRegion {
    tensor: Array4<f32>,
}

impl NormalizedRegion {
    pub(crate) fn new(tensor: Array4<f32>) -> Self {
        debug_assert_eq!(tensor.shape()[0], 1, "leading batch dimension must be 1");
        debug_assert_eq!(
            tensor.shape()[1],
            tensor.shape()[2],
            "normalized regions are square"
        );
        Self { tensor }
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.tensor.view()
    }

    pub fn into_tensor(self) -> Array4<f32> {
        self.tensor
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn size(&self) -> usize {
        self.tensor.shape()[1]
    }

    pub fn channels(&self) -> usize {
        self.tensor.shape()[3]
    }

    /// Mean intensity over all pixels and channels.
    pub fn mean(&self) -> f32 {
        self.tensor.mean().unwrap_or(0.0)
    }
}
