//! Synthetic images and landmark sets for testing.

use std::ops::Range;

use asd_screen_core::domain::{ImageInfo, LandmarkSet, Point2};
use asd_screen_core::region::{FACE_MESH_LEFT_EYE, FACE_MESH_RIGHT_EYE};
use image::{DynamicImage, Rgb, RgbImage};

/// Number of points in a face-mesh landmark set.
const FACE_MESH_POINTS: usize = 468;

/// Builder for creating synthetic test images.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    /// A skin-toned oval on a gray background with two dark eyes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn face(width: u32, height: u32) -> ImageInfo {
        let (w, h) = (width as f32, height as f32);
        let img = RgbImage::from_fn(width, height, |x, y| {
            let (px, py) = (x as f32 / w, y as f32 / h);
            let in_eye = |cx: f32| ((px - cx) / 0.06).powi(2) + ((py - 0.42) / 0.03).powi(2) <= 1.0;
            let in_face = ((px - 0.5) / 0.3).powi(2) + ((py - 0.5) / 0.4).powi(2) <= 1.0;
            if in_eye(0.38) || in_eye(0.62) {
                Rgb([40, 30, 30])
            } else if in_face {
                Rgb([224, 180, 150])
            } else {
                Rgb([128, 128, 128])
            }
        });
        ImageInfo::new("synthetic://face", DynamicImage::ImageRgb8(img))
    }

    /// A single-color RGB image.
    #[must_use]
    pub fn uniform(width: u32, height: u32, value: u8) -> ImageInfo {
        let img = RgbImage::from_pixel(width, height, Rgb([value, value, value]));
        ImageInfo::new("synthetic://uniform", DynamicImage::ImageRgb8(img))
    }

    /// An image whose red channel encodes `index`, for tracing samples
    /// through a stream.
    #[must_use]
    pub fn indexed(index: u8, side: u32) -> RgbImage {
        RgbImage::from_pixel(side, side, Rgb([index, 255 - index, 0]))
    }

    /// `count` indexed samples labeled `1.0` on even indices, `0.0` on odd.
    #[must_use]
    pub fn labeled_samples(count: u8, side: u32) -> Vec<(RgbImage, f32)> {
        (0..count)
            .map(|i| (Self::indexed(i, side), if i % 2 == 0 { 1.0 } else { 0.0 }))
            .collect()
    }

    /// Reads back the index stored by [`indexed`](Self::indexed).
    #[must_use]
    pub fn index_of(image: &RgbImage) -> Option<u8> {
        image.pixels().next().map(|p| p[0])
    }
}

/// Builds normalized face-mesh landmark sets with chosen eye boxes.
///
/// Points outside both eye ranges sit at the face center.
#[derive(Debug, Clone)]
pub struct LandmarkBuilder {
    points: Vec<Point2>,
}

impl Default for LandmarkBuilder {
    fn default() -> Self {
        Self {
            points: vec![Point2::new(0.5, 0.5); FACE_MESH_POINTS],
        }
    }
}

impl LandmarkBuilder {
    /// Starts from a mesh with every point at the center.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Places the left-eye range on the box `[x1, y1, x2, y2]`.
    #[must_use]
    pub fn left_eye(self, bbox: [f32; 4]) -> Self {
        self.eye(FACE_MESH_LEFT_EYE, bbox)
    }

    /// Places the right-eye range on the box `[x1, y1, x2, y2]`.
    #[must_use]
    pub fn right_eye(self, bbox: [f32; 4]) -> Self {
        self.eye(FACE_MESH_RIGHT_EYE, bbox)
    }

    /// Places every point of `range` on a corner of `bbox`, cycling.
    #[must_use]
    pub fn eye(mut self, range: Range<usize>, bbox: [f32; 4]) -> Self {
        let [x1, y1, x2, y2] = bbox;
        let corners = [(x1, y1), (x2, y1), (x2, y2), (x1, y2)];
        for (i, index) in range.enumerate() {
            let (x, y) = corners[i % corners.len()];
            if let Some(point) = self.points.get_mut(index) {
                *point = Point2::new(x, y);
            }
        }
        self
    }

    /// Keeps only the first `len` points.
    #[must_use]
    pub fn truncate(mut self, len: usize) -> Self {
        self.points.truncate(len);
        self
    }

    /// Finishes the set.
    #[must_use]
    pub fn build(self) -> LandmarkSet {
        LandmarkSet::normalized(self.points)
    }

    /// A typical frontal face: left eye on the image's right half.
    #[must_use]
    pub fn frontal() -> LandmarkSet {
        Self::new()
            .left_eye([0.55, 0.38, 0.7, 0.46])
            .right_eye([0.3, 0.38, 0.45, 0.46])
            .build()
    }
}
