//! Candle implementation of the staged training model.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use tracing::debug;

use super::classifier::{images_to_tensor, BinaryClassifier, ClassifierSpec, HEAD_PREFIX};
use crate::training::{BatchMetrics, LabeledBatch, Stage, StagedModel};

/// Copy of every variable, keyed by name.
pub type WeightSnapshot = HashMap<String, Tensor>;

/// Trains a [`BinaryClassifier`] from fresh weights.
pub struct CandleTrainer {
    varmap: VarMap,
    network: BinaryClassifier,
    spec: ClassifierSpec,
    device: Device,
    optimizer: Option<AdamW>,
}

impl CandleTrainer {
    /// Builds a randomly initialised network for `spec`.
    ///
    /// # Errors
    ///
    /// Returns an error if variables cannot be created on `device`.
    pub fn new(spec: ClassifierSpec, device: Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = BinaryClassifier::new(&spec, vb)?;
        Ok(Self {
            varmap,
            network,
            spec,
            device,
            optimizer: None,
        })
    }

    /// The classifier's shape.
    #[must_use]
    pub const fn spec(&self) -> &ClassifierSpec {
        &self.spec
    }

    fn trainable_vars(&self, stage: Stage) -> Result<Vec<Var>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow::anyhow!("variable map lock poisoned"))?;
        let head = format!("{HEAD_PREFIX}.");
        let vars = data
            .iter()
            .filter(|(name, _)| stage == Stage::FineTune || name.starts_with(&head))
            .map(|(_, var)| var.clone())
            .collect();
        Ok(vars)
    }

    fn batch_tensors(&self, batch: &LabeledBatch) -> Result<(Tensor, Tensor)> {
        let input = images_to_tensor(&batch.images, self.spec.input_size, &self.device)?;
        let targets = Tensor::from_vec(batch.labels.clone(), (batch.len(), 1), &self.device)?;
        Ok((input, targets))
    }
}

/// Mean binary cross-entropy on logits, in the numerically stable form
/// `max(x, 0) - x·t + ln(1 + e^-|x|)`.
fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
    let softplus = ((logits.abs()?.neg()?.exp()? + 1.0)?).log()?;
    let loss = ((logits.relu()? - (logits * targets)?)? + softplus)?;
    loss.mean_all()
}

fn metrics(logits: &Tensor, targets: &Tensor, loss: &Tensor) -> Result<BatchMetrics> {
    let logits = logits.flatten_all()?.to_vec1::<f32>()?;
    let targets = targets.flatten_all()?.to_vec1::<f32>()?;
    let correct = logits
        .iter()
        .zip(&targets)
        .filter(|(logit, target)| (**logit >= 0.0) == (**target >= 0.5))
        .count();
    Ok(BatchMetrics {
        loss: f64::from(loss.to_scalar::<f32>()?),
        correct,
        count: targets.len(),
    })
}

impl StagedModel for CandleTrainer {
    type Snapshot = WeightSnapshot;

    fn name(&self) -> &str {
        self.spec.modality.name()
    }

    fn configure(&mut self, stage: Stage, learning_rate: f64) -> Result<()> {
        let vars = self.trainable_vars(stage)?;
        debug!(
            "{} {stage}: {} trainable tensors",
            self.spec.modality.name(),
            vars.len()
        );
        let params = ParamsAdamW {
            lr: learning_rate,
            weight_decay: 0.0,
            ..ParamsAdamW::default()
        };
        self.optimizer = Some(AdamW::new(vars, params)?);
        Ok(())
    }

    fn train_batch(&mut self, batch: &LabeledBatch) -> Result<BatchMetrics> {
        let (input, targets) = self.batch_tensors(batch)?;
        let logits = self.network.forward_t(&input, true)?;
        let loss = bce_with_logits(&logits, &targets)?;
        let optimizer = self
            .optimizer
            .as_mut()
            .context("optimizer not configured; call configure first")?;
        optimizer.backward_step(&loss)?;
        metrics(&logits, &targets, &loss)
    }

    fn evaluate_batch(&self, batch: &LabeledBatch) -> Result<BatchMetrics> {
        let (input, targets) = self.batch_tensors(batch)?;
        let logits = self.network.forward_t(&input, false)?;
        let loss = bce_with_logits(&logits, &targets)?;
        metrics(&logits, &targets, &loss)
    }

    fn snapshot(&self) -> Result<WeightSnapshot> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow::anyhow!("variable map lock poisoned"))?;
        data.iter()
            .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
            .collect()
    }

    fn restore(&mut self, snapshot: WeightSnapshot) -> Result<()> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| anyhow::anyhow!("variable map lock poisoned"))?;
        for (name, tensor) in snapshot {
            let var = data
                .get(&name)
                .with_context(|| format!("snapshot has unknown variable '{name}'"))?;
            var.set(&tensor)?;
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.varmap
            .save(path)
            .with_context(|| format!("Failed to save weights to {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.varmap
            .load(path)
            .with_context(|| format!("Failed to load weights from {}", path.display()))
    }
}

impl std::fmt::Debug for CandleTrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleTrainer")
            .field("spec", &self.spec)
            .field("configured", &self.optimizer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn tiny_spec() -> ClassifierSpec {
        ClassifierSpec::eye().with_input_size(16)
    }

    fn batch() -> LabeledBatch {
        LabeledBatch::new(
            vec![
                RgbImage::from_pixel(16, 16, Rgb([250, 250, 250])),
                RgbImage::from_pixel(16, 16, Rgb([5, 5, 5])),
            ],
            vec![1.0, 0.0],
        )
    }

    fn head_weight(trainer: &CandleTrainer) -> Vec<f32> {
        trainer.snapshot().unwrap()["head.weight"]
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap()
    }

    fn backbone_weight(trainer: &CandleTrainer) -> Vec<f32> {
        trainer.snapshot().unwrap()["backbone.0.weight"]
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn test_bce_matches_closed_form() {
        let logits = Tensor::new(&[[0.0_f32], [2.0]], &Device::Cpu).unwrap();
        let targets = Tensor::new(&[[1.0_f32], [0.0]], &Device::Cpu).unwrap();
        let loss: f32 = bce_with_logits(&logits, &targets)
            .unwrap()
            .to_scalar()
            .unwrap();
        let expected = (2.0_f32.ln() + (1.0 + 2.0_f32.exp()).ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_train_requires_configure() {
        let mut trainer = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        assert!(trainer.train_batch(&batch()).is_err());
    }

    #[test]
    fn test_frozen_stage_leaves_backbone() {
        let mut trainer = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        let backbone = backbone_weight(&trainer);
        let head = head_weight(&trainer);

        trainer.configure(Stage::FrozenBackbone, 1e-2).unwrap();
        let m = trainer.train_batch(&batch()).unwrap();
        assert_eq!(m.count, 2);

        assert_eq!(backbone_weight(&trainer), backbone);
        assert_ne!(head_weight(&trainer), head);
    }

    #[test]
    fn test_fine_tune_updates_backbone() {
        let mut trainer = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        let backbone = backbone_weight(&trainer);
        trainer.configure(Stage::FineTune, 1e-2).unwrap();
        trainer.train_batch(&batch()).unwrap();
        assert_ne!(backbone_weight(&trainer), backbone);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut trainer = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        let saved = trainer.snapshot().unwrap();
        let head = head_weight(&trainer);
        trainer.configure(Stage::FineTune, 1e-2).unwrap();
        trainer.train_batch(&batch()).unwrap();
        trainer.restore(saved).unwrap();
        assert_eq!(head_weight(&trainer), head);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("eye.safetensors");

        let trainer = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        trainer.save(&path).unwrap();
        let head = head_weight(&trainer);

        let mut other = CandleTrainer::new(tiny_spec(), Device::Cpu).unwrap();
        other.load(&path).unwrap();
        assert_eq!(head_weight(&other), head);
    }
}
