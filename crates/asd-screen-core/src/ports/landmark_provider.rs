//! Landmark detection port.

use image::RgbImage;

use crate::domain::LandmarkSet;

/// Port for facial landmark detection.
///
/// Implementations must be stateless across calls: every invocation sees
/// only the image it is given.
pub trait LandmarkProvider: Send + Sync {
    /// Returns one landmark set per detected face, possibly none.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying detector fails.
    fn detect(&self, image: &RgbImage) -> anyhow::Result<Vec<LandmarkSet>>;
}
