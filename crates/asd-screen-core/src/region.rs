//! Landmark-driven eye region extraction.
//!
//! Turns one landmark set into a padded, resized eye crop. Candidate index
//! ranges are tried in order and the first one that yields a non-empty box
//! wins; the two eyes are never compared or combined.

// Pixel math mirrors integer truncation on purpose
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use std::ops::Range;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, warn};

use crate::domain::LandmarkSet;
use crate::ports::LandmarkProvider;

/// Left-eye indices in the 468-point face mesh layout.
pub const FACE_MESH_LEFT_EYE: Range<usize> = 33..133;
/// Right-eye indices in the 468-point face mesh layout.
pub const FACE_MESH_RIGHT_EYE: Range<usize> = 263..362;

/// Default eye crop edge length in pixels.
pub const EYE_CROP_SIZE: u32 = 128;

/// A cropped, resized eye image owned by the caller.
pub type RegionCrop = RgbImage;

/// Ordered landmark index ranges tried as eye candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EyeRegions {
    /// Candidate ranges, highest priority first.
    pub candidates: Vec<Range<usize>>,
}

impl EyeRegions {
    /// Left eye first, then right eye.
    #[must_use]
    pub fn new(left: Range<usize>, right: Range<usize>) -> Self {
        Self {
            candidates: vec![left, right],
        }
    }

    /// Ranges for the 468-point face mesh.
    #[must_use]
    pub fn face_mesh() -> Self {
        Self::new(FACE_MESH_LEFT_EYE, FACE_MESH_RIGHT_EYE)
    }
}

impl Default for EyeRegions {
    fn default() -> Self {
        Self::face_mesh()
    }
}

/// Channel order the eye classifier expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red.
    Bgr,
}

/// Configuration for eye region extraction.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Candidate landmark ranges.
    pub regions: EyeRegions,
    /// Horizontal pad per side, as a fraction of box width.
    pub pad_x: f32,
    /// Vertical pad per side, as a fraction of box height.
    pub pad_y: f32,
    /// Output crop `(width, height)`.
    pub crop_size: (u32, u32),
    /// Output channel order.
    pub channel_order: ChannelOrder,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            regions: EyeRegions::default(),
            pad_x: 0.25,
            pad_y: 0.4,
            crop_size: (EYE_CROP_SIZE, EYE_CROP_SIZE),
            channel_order: ChannelOrder::Rgb,
        }
    }
}

impl ExtractorConfig {
    /// Replaces the candidate ranges.
    #[must_use]
    pub fn with_regions(mut self, regions: EyeRegions) -> Self {
        self.regions = regions;
        self
    }

    /// Sets the output crop size.
    #[must_use]
    pub const fn with_crop_size(mut self, width: u32, height: u32) -> Self {
        self.crop_size = (width, height);
        self
    }
}

/// Integer pixel box with exclusive right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    /// Left edge.
    pub x1: i64,
    /// Top edge.
    pub y1: i64,
    /// Right edge (exclusive).
    pub x2: i64,
    /// Bottom edge (exclusive).
    pub y2: i64,
}

impl PixelBox {
    /// Box width, zero if inverted.
    #[must_use]
    pub fn width(&self) -> u32 {
        u32::try_from(self.x2.saturating_sub(self.x1).max(0)).unwrap_or(u32::MAX)
    }

    /// Box height, zero if inverted.
    #[must_use]
    pub fn height(&self) -> u32 {
        u32::try_from(self.y2.saturating_sub(self.y1).max(0)).unwrap_or(u32::MAX)
    }

    /// True if the box covers no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Result of an extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// An eye crop of the configured size.
    Found(RegionCrop),
    /// No candidate range produced a usable box.
    NotFound,
}

impl Extraction {
    /// Returns the crop, if any.
    #[must_use]
    pub fn into_crop(self) -> Option<RegionCrop> {
        match self {
            Self::Found(crop) => Some(crop),
            Self::NotFound => None,
        }
    }

    /// True if a crop was produced.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Extracts a single eye crop from an image and its landmarks.
#[derive(Debug, Clone, Default)]
pub struct RegionExtractor {
    config: ExtractorConfig,
}

impl RegionExtractor {
    /// Creates an extractor with the given configuration.
    #[must_use]
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Truncated bounding box of the points of `range` present in
    /// `landmarks`, before padding. Points with non-finite coordinates are
    /// skipped. `None` if no usable point is in the range.
    #[must_use]
    pub fn bounding_box(
        range: &Range<usize>,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Option<PixelBox> {
        let mut points = range
            .clone()
            .filter_map(|i| landmarks.pixel_point(i, width, height))
            .filter(|p| p.x.is_finite() && p.y.is_finite());

        let first = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(PixelBox {
            x1: min_x as i64,
            y1: min_y as i64,
            x2: max_x as i64,
            y2: max_y as i64,
        })
    }

    /// Padded box for `range`, clamped to the image. `None` when the range
    /// has no points or the clamped box is empty.
    #[must_use]
    pub fn region_box(
        &self,
        range: &Range<usize>,
        landmarks: &LandmarkSet,
        width: u32,
        height: u32,
    ) -> Option<PixelBox> {
        let raw = Self::bounding_box(range, landmarks, width, height)?;

        let pad_x = (raw.x2.saturating_sub(raw.x1) as f32 * self.config.pad_x) as i64;
        let pad_y = (raw.y2.saturating_sub(raw.y1) as f32 * self.config.pad_y) as i64;

        let padded = PixelBox {
            x1: raw.x1.saturating_sub(pad_x).max(0),
            y1: raw.y1.saturating_sub(pad_y).max(0),
            x2: raw.x2.saturating_add(pad_x).min(i64::from(width) - 1),
            y2: raw.y2.saturating_add(pad_y).min(i64::from(height) - 1),
        };

        (!padded.is_empty()).then_some(padded)
    }

    /// Extracts the first eye crop the candidate ranges yield.
    #[must_use]
    pub fn extract(&self, image: &RgbImage, landmarks: &LandmarkSet) -> Extraction {
        let (width, height) = image.dimensions();

        for range in &self.config.regions.candidates {
            let Some(region) = self.region_box(range, landmarks, width, height) else {
                debug!("No eye box for landmark range {range:?}");
                continue;
            };

            let crop = imageops::crop_imm(
                image,
                region.x1 as u32,
                region.y1 as u32,
                region.width(),
                region.height(),
            )
            .to_image();

            return Extraction::Found(self.finish(&crop));
        }

        Extraction::NotFound
    }

    /// Extracts from the first face of a detection result.
    #[must_use]
    pub fn extract_first(&self, image: &RgbImage, faces: &[LandmarkSet]) -> Extraction {
        faces
            .first()
            .map_or(Extraction::NotFound, |landmarks| self.extract(image, landmarks))
    }

    /// Whole-image resize to the crop size, used when no eye is found.
    #[must_use]
    pub fn resize_whole(&self, image: &RgbImage) -> RegionCrop {
        self.finish(image)
    }

    fn finish(&self, image: &RgbImage) -> RegionCrop {
        let (w, h) = self.config.crop_size;
        let mut out = imageops::resize(image, w, h, FilterType::Triangle);
        if self.config.channel_order == ChannelOrder::Bgr {
            for pixel in out.pixels_mut() {
                pixel.0.swap(0, 2);
            }
        }
        out
    }
}

/// Landmark detection followed by eye extraction.
#[derive(Clone)]
pub struct EyeLocator {
    provider: Arc<dyn LandmarkProvider>,
    extractor: RegionExtractor,
}

impl EyeLocator {
    /// Creates a locator from a detector and an extractor.
    #[must_use]
    pub fn new(provider: Arc<dyn LandmarkProvider>, extractor: RegionExtractor) -> Self {
        Self {
            provider,
            extractor,
        }
    }

    /// Returns the extractor.
    #[must_use]
    pub const fn extractor(&self) -> &RegionExtractor {
        &self.extractor
    }

    /// Runs a fresh landmark lookup and extracts the first face's eye.
    ///
    /// # Errors
    ///
    /// Returns an error if the landmark detector fails.
    pub fn locate(&self, image: &RgbImage) -> anyhow::Result<Extraction> {
        let faces = self.provider.detect(image)?;
        Ok(self.extractor.extract_first(image, &faces))
    }

    /// Eye crop, or a whole-image resize if no eye can be extracted.
    #[must_use]
    pub fn eye_or_whole(&self, image: &RgbImage) -> RegionCrop {
        match self.locate(image) {
            Ok(Extraction::Found(crop)) => crop,
            Ok(Extraction::NotFound) => {
                debug!("Eye not found, using whole image");
                self.extractor.resize_whole(image)
            }
            Err(e) => {
                warn!("Landmark detection failed, using whole image: {e:#}");
                self.extractor.resize_whole(image)
            }
        }
    }
}

impl std::fmt::Debug for EyeLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EyeLocator")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::Point2;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]))
    }

    /// Pixel-space set where indices `0..4` outline a box.
    fn box_landmarks(x1: f32, y1: f32, x2: f32, y2: f32) -> LandmarkSet {
        LandmarkSet::pixel(vec![
            Point2::new(x1, y1),
            Point2::new(x2, y1),
            Point2::new(x2, y2),
            Point2::new(x1, y2),
        ])
    }

    fn extractor(left: Range<usize>, right: Range<usize>) -> RegionExtractor {
        RegionExtractor::new(ExtractorConfig::default().with_regions(EyeRegions::new(left, right)))
    }

    #[test]
    fn test_padding_is_wider_vertically() {
        let ex = extractor(0..4, 4..8);
        let lm = box_landmarks(40.0, 45.0, 60.0, 55.0);

        let b = ex.region_box(&(0..4), &lm, 100, 100);
        // pad_x = int(20 * 0.25) = 5, pad_y = int(10 * 0.4) = 4
        assert_eq!(
            b,
            Some(PixelBox {
                x1: 35,
                y1: 41,
                x2: 65,
                y2: 59
            })
        );
    }

    #[test]
    fn test_box_clamped_to_image() {
        let ex = extractor(0..4, 4..8);
        let lm = box_landmarks(0.0, 0.0, 99.0, 99.0);

        let b = ex.region_box(&(0..4), &lm, 100, 100);
        assert_eq!(
            b,
            Some(PixelBox {
                x1: 0,
                y1: 0,
                x2: 99,
                y2: 99
            })
        );
    }

    #[test]
    fn test_normalized_points_scaled() {
        let lm = LandmarkSet::normalized(vec![Point2::new(0.25, 0.5), Point2::new(0.75, 0.75)]);
        let b = RegionExtractor::bounding_box(&(0..2), &lm, 200, 100);
        assert_eq!(
            b,
            Some(PixelBox {
                x1: 50,
                y1: 50,
                x2: 150,
                y2: 75
            })
        );
    }

    #[test]
    fn test_out_of_range_indices_skipped() {
        // Range 2..10 only has indices 2 and 3 available
        let lm = box_landmarks(10.0, 10.0, 30.0, 20.0);
        let b = RegionExtractor::bounding_box(&(2..10), &lm, 100, 100);
        assert_eq!(
            b,
            Some(PixelBox {
                x1: 10,
                y1: 20,
                x2: 30,
                y2: 20
            })
        );
    }

    #[test]
    fn test_range_without_points_is_not_found() {
        let ex = extractor(33..133, 263..362);
        let lm = box_landmarks(10.0, 10.0, 30.0, 20.0);
        assert_eq!(ex.extract(&gradient(64, 64), &lm), Extraction::NotFound);
    }

    #[test]
    fn test_single_point_is_zero_area() {
        let ex = extractor(0..1, 1..2);
        let lm = LandmarkSet::pixel(vec![Point2::new(5.0, 5.0), Point2::new(9.0, 9.0)]);
        assert_eq!(ex.extract(&gradient(64, 64), &lm), Extraction::NotFound);
    }

    #[test]
    fn test_left_preferred_over_right() {
        let image = gradient(100, 100);
        let mut points = box_landmarks(10.0, 10.0, 30.0, 20.0).points;
        points.extend(box_landmarks(60.0, 60.0, 90.0, 80.0).points);
        let lm = LandmarkSet::pixel(points);

        let ex = extractor(0..4, 4..8);
        let crop = ex.extract(&image, &lm).into_crop();

        let expected = {
            let r = ex.region_box(&(0..4), &lm, 100, 100).unwrap();
            let raw = imageops::crop_imm(&image, r.x1 as u32, r.y1 as u32, r.width(), r.height())
                .to_image();
            imageops::resize(&raw, EYE_CROP_SIZE, EYE_CROP_SIZE, FilterType::Triangle)
        };
        assert_eq!(crop, Some(expected));
    }

    #[test]
    fn test_falls_back_to_right_eye() {
        let image = gradient(100, 100);
        // Left eye collapses to a single point, right eye is a real box
        let mut points = vec![Point2::new(20.0, 20.0); 4];
        points.extend(box_landmarks(60.0, 60.0, 90.0, 80.0).points);
        let lm = LandmarkSet::pixel(points);

        let ex = extractor(0..4, 4..8);
        assert!(ex.region_box(&(0..4), &lm, 100, 100).is_none());
        assert!(ex.extract(&image, &lm).is_found());
    }

    #[test]
    fn test_box_outside_image_not_found() {
        let ex = extractor(0..4, 4..8);
        let lm = box_landmarks(-50.0, -50.0, -20.0, -30.0);
        assert_eq!(ex.extract(&gradient(64, 64), &lm), Extraction::NotFound);
    }

    #[test]
    fn test_non_finite_points_are_not_found() {
        let ex = extractor(0..2, 2..4);
        let lm = LandmarkSet::pixel(vec![
            Point2::new(f32::NEG_INFINITY, 1.0),
            Point2::new(f32::INFINITY, 5.0),
            Point2::new(f32::NAN, 3.0),
            Point2::new(10.0, f32::INFINITY),
        ]);
        assert_eq!(ex.extract(&RgbImage::new(64, 64), &lm), Extraction::NotFound);
    }

    #[test]
    fn test_huge_coordinates_do_not_overflow() {
        let ex = extractor(0..2, 2..4);
        let lm = LandmarkSet::pixel(vec![
            Point2::new(1e20, 1e20),
            Point2::new(2e20, 3e20),
            Point2::new(-1e20, -1e20),
            Point2::new(-2e20, -3e20),
        ]);
        assert_eq!(ex.extract(&RgbImage::new(64, 64), &lm), Extraction::NotFound);

        let spanning = box_landmarks(-1e20, -1e20, 1e20, 1e20);
        let b = ex.region_box(&(0..4), &spanning, 64, 64);
        assert_eq!(
            b,
            Some(PixelBox {
                x1: 0,
                y1: 0,
                x2: 63,
                y2: 63
            })
        );
    }

    #[test]
    fn test_crop_has_configured_size() {
        let ex = RegionExtractor::new(
            ExtractorConfig::default()
                .with_regions(EyeRegions::new(0..4, 4..8))
                .with_crop_size(64, 32),
        );
        let lm = box_landmarks(10.0, 10.0, 40.0, 30.0);
        let crop = ex.extract(&gradient(100, 100), &lm).into_crop();
        assert_eq!(crop.map(|c| c.dimensions()), Some((64, 32)));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let image = gradient(120, 90);
        let lm = box_landmarks(20.0, 30.0, 70.0, 50.0);
        let ex = extractor(0..4, 4..8);
        assert_eq!(ex.extract(&image, &lm), ex.extract(&image, &lm));
    }

    #[test]
    fn test_bgr_swaps_channels() {
        let image = RgbImage::from_pixel(50, 50, Rgb([10, 20, 30]));
        let lm = box_landmarks(10.0, 10.0, 40.0, 40.0);
        let mut config = ExtractorConfig::default().with_regions(EyeRegions::new(0..4, 4..8));
        config.channel_order = ChannelOrder::Bgr;
        let crop = RegionExtractor::new(config).extract(&image, &lm).into_crop();
        assert_eq!(crop.map(|c| *c.get_pixel(0, 0)), Some(Rgb([30, 20, 10])));
    }

    #[test]
    fn test_no_faces_is_not_found() {
        let ex = RegionExtractor::default();
        assert_eq!(ex.extract_first(&gradient(10, 10), &[]), Extraction::NotFound);
    }
}
