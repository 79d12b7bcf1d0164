//! `BlazeFace` detector as a landmark provider.
//!
//! Network layout follows "`BlazeFace`: Sub-millisecond Neural Face Detection
//! on Mobile GPUs" with the weight naming of hollance/BlazeFace-PyTorch
//! (BatchNorm folded into conv biases). Each detection is turned into a
//! 14-point landmark set: the six keypoints, then four contour points around
//! the right eye and four around the left eye.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::imageops::FilterType;
use image::RgbImage;
use tracing::{debug, trace};

use super::{load_safetensors, sigmoid};
use crate::domain::{LandmarkSet, Point2};
use crate::ports::LandmarkProvider;
use crate::region::EyeRegions;

/// Detector input side.
pub const INPUT_SIZE: usize = 128;

const NUM_ANCHORS: usize = 896;
const SCORE_THRESHOLD: f32 = 0.75;
const NMS_THRESHOLD: f32 = 0.3;

/// Eye box size relative to the face box.
const EYE_WIDTH_RATIO: f32 = 0.25;
const EYE_HEIGHT_RATIO: f32 = 0.15;

/// Right-eye contour indices in a `BlazeFace` landmark set.
pub const BLAZEFACE_RIGHT_EYE: Range<usize> = 6..10;
/// Left-eye contour indices in a `BlazeFace` landmark set.
pub const BLAZEFACE_LEFT_EYE: Range<usize> = 10..14;

/// `(in, out, kernel, stride)` per block.
const BACKBONE1: [(usize, usize, usize, usize); 11] = [
    (24, 24, 3, 1),
    (24, 28, 3, 1),
    (28, 32, 3, 2),
    (32, 36, 3, 1),
    (36, 42, 3, 1),
    (42, 48, 3, 2),
    (48, 56, 3, 1),
    (56, 64, 3, 1),
    (64, 72, 3, 1),
    (72, 80, 3, 1),
    (80, 88, 3, 1),
];

const BACKBONE2: [(usize, usize, usize, usize); 5] = [
    (88, 96, 3, 2),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
    (96, 96, 3, 1),
];

/// Eye regions matching [`FaceDetection::landmarks`].
#[must_use]
pub fn eye_regions() -> EyeRegions {
    EyeRegions::new(BLAZEFACE_LEFT_EYE, BLAZEFACE_RIGHT_EYE)
}

/// One detected face in normalized coordinates.
#[derive(Debug, Clone)]
pub struct FaceDetection {
    /// `[x_min, y_min, x_max, y_max]`.
    pub bbox: [f32; 4],
    /// Detection score.
    pub score: f32,
    /// Right eye, left eye, nose, mouth, right ear, left ear as `[x, y]`.
    pub keypoints: [[f32; 2]; 6],
}

impl FaceDetection {
    /// Keypoints followed by four contour points per eye.
    #[must_use]
    pub fn landmarks(&self) -> LandmarkSet {
        let face_w = self.bbox[2] - self.bbox[0];
        let face_h = self.bbox[3] - self.bbox[1];
        let half_w = face_w * EYE_WIDTH_RATIO / 2.0;
        let half_h = face_h * EYE_HEIGHT_RATIO / 2.0;

        let mut points: Vec<Point2> = self
            .keypoints
            .iter()
            .map(|&[x, y]| Point2::new(x, y))
            .collect();

        for [cx, cy] in [self.keypoints[0], self.keypoints[1]] {
            points.extend([
                Point2::new((cx - half_w).max(0.0), cy),
                Point2::new(cx, (cy - half_h).max(0.0)),
                Point2::new((cx + half_w).min(1.0), cy),
                Point2::new(cx, (cy + half_h).min(1.0)),
            ]);
        }

        LandmarkSet::normalized(points)
    }
}

/// Depthwise-separable residual block.
struct BlazeBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    channel_pad: usize,
    stride: usize,
}

impl BlazeBlock {
    fn new(spec: (usize, usize, usize, usize), vb: &VarBuilder) -> Result<Self> {
        let (in_channels, out_channels, kernel, stride) = spec;
        let padding = if stride == 2 { 0 } else { (kernel - 1) / 2 };

        let depthwise = conv2d(
            in_channels,
            in_channels,
            kernel,
            Conv2dConfig {
                stride,
                padding,
                groups: in_channels,
                ..Conv2dConfig::default()
            },
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d(
            in_channels,
            out_channels,
            1,
            Conv2dConfig::default(),
            vb.pp("pointwise"),
        )?;

        Ok(Self {
            depthwise,
            pointwise,
            channel_pad: out_channels.saturating_sub(in_channels),
            stride,
        })
    }
}

impl Module for BlazeBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (padded, residual) = if self.stride == 2 {
            (
                x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?,
                x.max_pool2d(2)?,
            )
        } else {
            (x.clone(), x.clone())
        };

        let h = self.depthwise.forward(&padded)?.relu()?;
        let h = self.pointwise.forward(&h)?;

        let residual = if self.channel_pad > 0 {
            residual.pad_with_zeros(1, 0, self.channel_pad)?
        } else {
            residual
        };

        (h + residual)?.relu()
    }
}

/// The detector network.
pub struct BlazeFace {
    conv0: Conv2d,
    backbone1: Vec<BlazeBlock>,
    backbone2: Vec<BlazeBlock>,
    classifier_16: Conv2d,
    regressor_16: Conv2d,
    classifier_8: Conv2d,
    regressor_8: Conv2d,
    anchors: Vec<[f32; 2]>,
    device: Device,
}

impl BlazeFace {
    /// Builds the network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or misshapen.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let device = vb.device().clone();

        let conv0 = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("conv0"),
        )?;

        let backbone1 = BACKBONE1
            .iter()
            .enumerate()
            .map(|(i, &spec)| BlazeBlock::new(spec, &vb.pp(format!("backbone1.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let backbone2 = BACKBONE2
            .iter()
            .enumerate()
            .map(|(i, &spec)| BlazeBlock::new(spec, &vb.pp(format!("backbone2.{i}"))))
            .collect::<Result<Vec<_>>>()?;

        let head = |in_c, out_c, name: &str| {
            conv2d(in_c, out_c, 1, Conv2dConfig::default(), vb.pp(name))
        };

        Ok(Self {
            conv0,
            backbone1,
            backbone2,
            classifier_16: head(88, 2, "classifier_16")?,
            regressor_16: head(88, 32, "regressor_16")?,
            classifier_8: head(96, 6, "classifier_8")?,
            regressor_8: head(96, 96, "regressor_8")?,
            anchors: anchor_centers(),
            device,
        })
    }

    /// Loads weights from a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match.
    pub fn load(path: impl AsRef<Path>, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading BlazeFace from {}", path.display());
        let vb = load_safetensors(path, device)?;
        Self::new(vb).with_context(|| format!("Invalid BlazeFace weights in {}", path.display()))
    }

    /// Resizes to 128×128 and scales to `[-1, 1]`, NCHW.
    fn preprocess(&self, image: &RgbImage) -> Result<Tensor> {
        let side = INPUT_SIZE as u32;
        let resized = image::imageops::resize(image, side, side, FilterType::Triangle);
        let data: Vec<f32> = resized
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 127.5 - 1.0)
            .collect();

        Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()
            .context("Failed to preprocess image")
    }

    fn forward(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let mut h = self.conv0.forward(&x)?.relu()?;

        for block in &self.backbone1 {
            h = block.forward(&h)?;
        }
        let feature_16 = h.clone();
        for block in &self.backbone2 {
            h = block.forward(&h)?;
        }
        let feature_8 = h;

        let flat = |t: Tensor, anchors: usize, width: usize| {
            t.permute((0, 2, 3, 1))?.reshape((1, anchors, width))
        };
        let c16 = flat(self.classifier_16.forward(&feature_16)?, 512, 1)?;
        let r16 = flat(self.regressor_16.forward(&feature_16)?, 512, 16)?;
        let c8 = flat(self.classifier_8.forward(&feature_8)?, 384, 1)?;
        let r8 = flat(self.regressor_8.forward(&feature_8)?, 384, 16)?;

        Ok((Tensor::cat(&[c16, c8], 1)?, Tensor::cat(&[r16, r8], 1)?))
    }

    /// Detects faces, highest score first.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect_faces(&self, image: &RgbImage) -> Result<Vec<FaceDetection>> {
        let input = self.preprocess(image)?;
        let (scores, boxes) = self.forward(&input)?;
        let scores = scores.squeeze(0)?.to_vec2::<f32>()?;
        let boxes = boxes.squeeze(0)?.to_vec2::<f32>()?;
        Ok(nms(decode(&self.anchors, &scores, &boxes)))
    }
}

impl LandmarkProvider for BlazeFace {
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>> {
        let faces = self.detect_faces(image)?;
        trace!("BlazeFace found {} faces", faces.len());
        Ok(faces.iter().map(FaceDetection::landmarks).collect())
    }
}

/// Anchor centers: 2 per cell on 16×16, then 6 per cell on 8×8.
fn anchor_centers() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (grid, per_cell) in [(16_u8, 2), (8_u8, 6)] {
        let scale = f32::from(grid);
        for y in 0..grid {
            for x in 0..grid {
                let center = [(f32::from(x) + 0.5) / scale, (f32::from(y) + 0.5) / scale];
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }
    anchors
}

fn decode(anchors: &[[f32; 2]], scores: &[Vec<f32>], boxes: &[Vec<f32>]) -> Vec<FaceDetection> {
    let size = INPUT_SIZE as f32;
    anchors
        .iter()
        .zip(scores.iter().zip(boxes))
        .filter_map(|(&[ax, ay], (score, raw))| {
            let score = sigmoid(score[0]);
            if score < SCORE_THRESHOLD {
                return None;
            }
            let cx = ax + raw[0] / size;
            let cy = ay + raw[1] / size;
            let w = raw[2] / size;
            let h = raw[3] / size;

            let mut keypoints = [[0.0_f32; 2]; 6];
            for (k, point) in keypoints.iter_mut().enumerate() {
                let x = ax + raw[4 + k * 2] / size;
                let y = ay + raw[5 + k * 2] / size;
                *point = [x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)];
            }

            Some(FaceDetection {
                bbox: [
                    (cx - w / 2.0).clamp(0.0, 1.0),
                    (cy - h / 2.0).clamp(0.0, 1.0),
                    (cx + w / 2.0).clamp(0.0, 1.0),
                    (cy + h / 2.0).clamp(0.0, 1.0),
                ],
                score,
                keypoints,
            })
        })
        .collect()
}

fn nms(mut detections: Vec<FaceDetection>) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceDetection> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(&k.bbox, &det.bbox) < NMS_THRESHOLD) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = w * h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
