//! Convolutional binary classifier for face and eye crops.
//!
//! A stack of conv → ReLU → max-pool blocks (the backbone) followed by global
//! average pooling, dropout and a single-logit linear head. Variables are
//! named `backbone.{i}.*` and `head.*` so the backbone can be frozen by
//! leaving its variables out of the optimizer.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Dropout, Linear, VarBuilder};
use image::imageops::FilterType;
use image::RgbImage;
use tracing::debug;

use super::{load_safetensors, sigmoid};
use crate::domain::Modality;
use crate::ports::Classifier;
use crate::region::EYE_CROP_SIZE;

/// Face classifier input side.
pub const FACE_INPUT_SIZE: u32 = 224;

/// Default head dropout rate.
pub const DEFAULT_DROPOUT: f32 = 0.35;

/// Variable prefix of the frozen-in-stage-1 layers.
pub const BACKBONE_PREFIX: &str = "backbone";

/// Variable prefix of the always-trainable layers.
pub const HEAD_PREFIX: &str = "head";

/// Shape of a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSpec {
    /// Which path this classifier serves.
    pub modality: Modality,
    /// Square input side in pixels.
    pub input_size: u32,
    /// Output channels of each backbone block.
    pub widths: Vec<usize>,
    /// Dropout rate before the head.
    pub dropout: f32,
}

impl ClassifierSpec {
    /// Whole-face classifier, 224×224 input.
    #[must_use]
    pub fn face() -> Self {
        Self {
            modality: Modality::Face,
            input_size: FACE_INPUT_SIZE,
            widths: vec![16, 32, 64, 128],
            dropout: DEFAULT_DROPOUT,
        }
    }

    /// Eye-region classifier, 128×128 input.
    #[must_use]
    pub fn eye() -> Self {
        Self {
            modality: Modality::Eye,
            input_size: EYE_CROP_SIZE,
            widths: vec![16, 32, 64],
            dropout: DEFAULT_DROPOUT,
        }
    }

    /// Sets the dropout rate.
    #[must_use]
    pub const fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    /// Sets the input side.
    #[must_use]
    pub const fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }
}

/// The network itself.
pub struct BinaryClassifier {
    blocks: Vec<Conv2d>,
    dropout: Dropout,
    head: Linear,
}

impl BinaryClassifier {
    /// Builds the network, creating or reading variables through `vb`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(spec: &ClassifierSpec, vb: VarBuilder) -> Result<Self> {
        anyhow::ensure!(!spec.widths.is_empty(), "classifier needs at least one block");

        let config = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        let backbone = vb.pp(BACKBONE_PREFIX);
        let mut blocks = Vec::with_capacity(spec.widths.len());
        let mut in_channels = 3;
        for (i, &out_channels) in spec.widths.iter().enumerate() {
            let conv = conv2d(in_channels, out_channels, 3, config, backbone.pp(i.to_string()))
                .with_context(|| format!("Failed to build backbone block {i}"))?;
            blocks.push(conv);
            in_channels = out_channels;
        }

        let head = linear(in_channels, 1, vb.pp(HEAD_PREFIX)).context("Failed to build head")?;

        Ok(Self {
            blocks,
            dropout: Dropout::new(spec.dropout),
            head,
        })
    }

    /// Returns logits of shape `(n, 1)`. Dropout is active only when `train`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has the wrong shape.
    pub fn forward_t(&self, x: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let mut h = x.clone();
        for block in &self.blocks {
            h = block.forward(&h)?.relu()?.max_pool2d(2)?;
        }
        let pooled = h.mean((2, 3))?;
        let pooled = self.dropout.forward(&pooled, train)?;
        self.head.forward(&pooled)
    }
}

/// Converts images into an NCHW tensor scaled to `[0, 1]`.
///
/// Images not already `size`×`size` are resized first.
///
/// # Errors
///
/// Returns an error if tensor creation fails.
pub fn images_to_tensor(images: &[RgbImage], size: u32, device: &Device) -> Result<Tensor> {
    let side = size as usize;
    let mut data = Vec::with_capacity(images.len() * side * side * 3);
    for image in images {
        if image.dimensions() == (size, size) {
            data.extend(image.as_raw().iter().map(|&v| f32::from(v) / 255.0));
        } else {
            let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
            data.extend(resized.as_raw().iter().map(|&v| f32::from(v) / 255.0));
        }
    }

    Tensor::from_vec(data, (images.len(), side, side, 3), device)?
        .permute((0, 3, 1, 2))?
        .contiguous()
        .context("Failed to build input tensor")
}

/// Trained classifier loaded from a safetensors file.
pub struct CandleClassifier {
    network: BinaryClassifier,
    spec: ClassifierSpec,
    device: Device,
}

impl CandleClassifier {
    /// Wraps an already built network.
    #[must_use]
    pub const fn new(network: BinaryClassifier, spec: ClassifierSpec, device: Device) -> Self {
        Self {
            network,
            spec,
            device,
        }
    }

    /// Loads weights from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not match `spec`.
    pub fn load(path: impl AsRef<Path>, spec: ClassifierSpec, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        debug!(
            "Loading {} classifier from {}",
            spec.modality.name(),
            path.display()
        );
        let vb = load_safetensors(path, device)?;
        let network = BinaryClassifier::new(&spec, vb)
            .with_context(|| format!("Weights in {} do not match", path.display()))?;
        Ok(Self::new(network, spec, device.clone()))
    }

    /// The classifier's shape.
    #[must_use]
    pub const fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }
}

impl Classifier for CandleClassifier {
    fn input_size(&self) -> (u32, u32) {
        (self.spec.input_size, self.spec.input_size)
    }

    fn predict(&self, images: &[RgbImage]) -> Result<Vec<f32>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let input = images_to_tensor(images, self.spec.input_size, &self.device)?;
        let logits = self.network.forward_t(&input, false)?;
        let logits = logits.flatten_all()?.to_vec1::<f32>()?;
        Ok(logits.into_iter().map(sigmoid).collect())
    }
}

impl std::fmt::Debug for CandleClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleClassifier")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_specs() {
        assert_eq!(ClassifierSpec::face().input_size, 224);
        assert_eq!(ClassifierSpec::eye().input_size, 128);
        assert!((ClassifierSpec::eye().dropout - 0.35).abs() < f32::EPSILON);
    }

    #[test]
    fn test_forward_shape() {
        let spec = ClassifierSpec::eye().with_input_size(32);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let network = BinaryClassifier::new(&spec, vb).unwrap();

        let images = vec![RgbImage::new(32, 32), RgbImage::new(40, 20)];
        let input = images_to_tensor(&images, 32, &Device::Cpu).unwrap();
        assert_eq!(input.dims(), &[2, 3, 32, 32]);

        let logits = network.forward_t(&input, false).unwrap();
        assert_eq!(logits.dims(), &[2, 1]);
    }

    #[test]
    fn test_variable_prefixes() {
        let spec = ClassifierSpec::eye().with_input_size(16);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        BinaryClassifier::new(&spec, vb).unwrap();

        let data = varmap.data().lock().unwrap();
        assert!(data.keys().all(|k| k.starts_with("backbone.") || k.starts_with("head.")));
        assert!(data.contains_key("head.weight"));
        assert!(data.contains_key("backbone.0.weight"));
    }
}
