//! Binary image classifier port.

use image::RgbImage;

/// Port for a binary image classifier with a fixed input size.
pub trait Classifier: Send + Sync {
    /// Expected input `(width, height)`. Callers resize before predicting.
    fn input_size(&self) -> (u32, u32);

    /// Returns one probability in `[0, 1]` per image.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or an image has the wrong size.
    fn predict(&self, images: &[RgbImage]) -> anyhow::Result<Vec<f32>>;
}
