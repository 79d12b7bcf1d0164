//! Random geometric augmentation for training images.

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use rand::Rng;

/// Augmentation ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentConfig {
    /// Maximum rotation either way, in degrees.
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of width.
    pub width_shift: f32,
    /// Maximum vertical shift as a fraction of height.
    pub height_shift: f32,
    /// Zoom factors are drawn from `[1 - zoom, 1 + zoom]` per axis.
    pub zoom: f32,
    /// Mirror half of the images left-right.
    pub horizontal_flip: bool,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift: 0.12,
            height_shift: 0.12,
            zoom: 0.15,
            horizontal_flip: true,
        }
    }
}

impl AugmentConfig {
    /// No augmentation at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            zoom: 0.0,
            horizontal_flip: false,
        }
    }

    /// True if any rotation, shift or zoom is enabled.
    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.rotation_range > 0.0
            || self.width_shift > 0.0
            || self.height_shift > 0.0
            || self.zoom > 0.0
    }

    /// True when every transform is disabled.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        !self.has_geometry() && !self.horizontal_flip
    }
}

/// Applies random transforms drawn from an [`AugmentConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Augmenter {
    config: AugmentConfig,
}

impl Augmenter {
    /// Creates an augmenter.
    #[must_use]
    pub const fn new(config: AugmentConfig) -> Self {
        Self { config }
    }

    /// Configured ranges.
    #[must_use]
    pub const fn config(&self) -> &AugmentConfig {
        &self.config
    }

    /// Returns a transformed copy of `image`. Uncovered pixels are black.
    #[allow(clippy::cast_precision_loss)]
    pub fn apply<R: Rng + ?Sized>(&self, image: &RgbImage, rng: &mut R) -> RgbImage {
        let c = &self.config;
        if c.is_identity() {
            return image.clone();
        }

        let mut out = if c.has_geometry() {
            let (w, h) = (image.width() as f32, image.height() as f32);
            let angle = symmetric(rng, c.rotation_range).to_radians();
            let tx = symmetric(rng, c.width_shift) * w;
            let ty = symmetric(rng, c.height_shift) * h;
            let zx = 1.0 + symmetric(rng, c.zoom);
            let zy = 1.0 + symmetric(rng, c.zoom);

            let (cx, cy) = (w / 2.0, h / 2.0);
            let projection = Projection::translate(cx + tx, cy + ty)
                * Projection::rotate(angle)
                * Projection::scale(1.0 / zx, 1.0 / zy)
                * Projection::translate(-cx, -cy);
            warp(image, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]))
        } else {
            image.clone()
        };

        let flip = c.horizontal_flip && rng.gen_bool(0.5);
        if flip {
            imageops::flip_horizontal_in_place(&mut out);
        }
        out
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}
