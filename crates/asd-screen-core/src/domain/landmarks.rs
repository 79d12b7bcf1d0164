//! Facial landmark geometry.

use serde::{Deserialize, Serialize};

/// Coordinate space of the points in a [`LandmarkSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Points are fractions of image width/height in `[0, 1]`.
    #[default]
    Normalized,
    /// Points are already in pixel units.
    Pixel,
}

/// A single 2D landmark point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point2 {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered landmark points for one detected face.
///
/// Point `i` always refers to the same anatomical location for a given
/// detector, which is what lets fixed index ranges select the eyes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    /// Landmark points, positionally indexed.
    pub points: Vec<Point2>,
    /// Space the points are expressed in.
    pub space: CoordinateSpace,
}

impl LandmarkSet {
    /// Creates a landmark set from normalized points.
    #[must_use]
    pub const fn normalized(points: Vec<Point2>) -> Self {
        Self {
            points,
            space: CoordinateSpace::Normalized,
        }
    }

    /// Creates a landmark set from pixel-space points.
    #[must_use]
    pub const fn pixel(points: Vec<Point2>) -> Self {
        Self {
            points,
            space: CoordinateSpace::Pixel,
        }
    }

    /// Number of points in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the set has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns point `index` in pixel coordinates for a `width` x `height`
    /// image, or `None` if the detector produced fewer points.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_point(&self, index: usize, width: u32, height: u32) -> Option<Point2> {
        let p = self.points.get(index)?;
        Some(match self.space {
            CoordinateSpace::Normalized => Point2::new(p.x * width as f32, p.y * height as f32),
            CoordinateSpace::Pixel => *p,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_point_scales_normalized() {
        let set = LandmarkSet::normalized(vec![Point2::new(0.5, 0.25)]);
        let p = set.pixel_point(0, 200, 100);
        assert_eq!(p, Some(Point2::new(100.0, 25.0)));
    }

    #[test]
    fn test_pixel_point_keeps_pixel_space() {
        let set = LandmarkSet::pixel(vec![Point2::new(12.0, 7.0)]);
        assert_eq!(set.pixel_point(0, 200, 100), Some(Point2::new(12.0, 7.0)));
    }

    #[test]
    fn test_pixel_point_out_of_range() {
        let set = LandmarkSet::normalized(vec![Point2::new(0.1, 0.1)]);
        assert!(set.pixel_point(5, 10, 10).is_none());
    }
}
