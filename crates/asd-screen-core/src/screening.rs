//! Single-image screening pipeline.
//!
//! Face-count gate first, then the face and eye modalities, then the
//! ensemble. Modalities whose classifier is not loaded or whose region
//! cannot be found are left out of the decision rather than failing it.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbImage};
use tracing::debug;

use crate::domain::{ModalityPrediction, Screening, ScreeningError};
use crate::ensemble::decide;
use crate::gate;
use crate::ports::{Classifier, LandmarkProvider};
use crate::region::{EyeLocator, Extraction, RegionExtractor};

/// Longest image side handed to the detector; larger uploads are downscaled.
pub const MAX_DETECTION_DIMENSION: u32 = 800;

/// Screening pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScreenerConfig {
    /// Downscale uploads whose longest side exceeds this. `None` disables.
    pub max_dimension: Option<u32>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            max_dimension: Some(MAX_DETECTION_DIMENSION),
        }
    }
}

/// Screens one image at a time against the loaded classifiers.
pub struct Screener {
    detector: Arc<dyn LandmarkProvider>,
    eyes: EyeLocator,
    face_classifier: Option<Arc<dyn Classifier>>,
    eye_classifier: Option<Arc<dyn Classifier>>,
    config: ScreenerConfig,
}

impl Screener {
    /// Creates a screener with no classifiers loaded.
    #[must_use]
    pub fn new(detector: Arc<dyn LandmarkProvider>, extractor: RegionExtractor) -> Self {
        Self {
            eyes: EyeLocator::new(Arc::clone(&detector), extractor),
            detector,
            face_classifier: None,
            eye_classifier: None,
            config: ScreenerConfig::default(),
        }
    }

    /// Attaches the face classifier.
    #[must_use]
    pub fn with_face_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.face_classifier = Some(classifier);
        self
    }

    /// Attaches the eye classifier.
    #[must_use]
    pub fn with_eye_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.eye_classifier = Some(classifier);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ScreenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Names of the loaded modalities.
    #[must_use]
    pub fn loaded_modalities(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.face_classifier.is_some() {
            names.push("face");
        }
        if self.eye_classifier.is_some() {
            names.push("eye");
        }
        names
    }

    /// Screens a decoded image.
    ///
    /// # Errors
    ///
    /// Rejects images with zero or several faces before any classifier
    /// runs. Detector and classifier failures are returned as faults.
    pub fn screen(&self, image: &DynamicImage) -> Result<Screening, ScreeningError> {
        let rgb = self.prepare(image);

        let faces = self
            .detector
            .detect(&rgb)
            .map_err(ScreeningError::Detector)?;
        debug!("Faces detected: {}", faces.len());
        gate::admit(faces.len())?;

        let face = self
            .face_classifier
            .as_deref()
            .map(|classifier| classify(classifier, &rgb))
            .transpose()?;

        let eye = match self.eye_classifier.as_deref() {
            Some(classifier) => match self.eyes.locate(&rgb).map_err(ScreeningError::Detector)? {
                Extraction::Found(crop) => Some(classify(classifier, &crop)?),
                Extraction::NotFound => {
                    debug!("Eye region not detected, deciding without it");
                    None
                }
            },
            None => None,
        };

        let verdict = decide(face.map(|p| p.probability), eye.map(|p| p.probability));

        Ok(Screening { face, eye, verdict })
    }

    fn prepare(&self, image: &DynamicImage) -> RgbImage {
        let (w, h) = image.dimensions();
        match self.config.max_dimension {
            Some(max) if w.max(h) > max => {
                debug!("Downscaling {w}x{h} to fit {max}px");
                image.resize(max, max, FilterType::Triangle).to_rgb8()
            }
            _ => image.to_rgb8(),
        }
    }
}

/// Resizes to the classifier input and runs a single-image batch.
fn classify(
    classifier: &dyn Classifier,
    image: &RgbImage,
) -> Result<ModalityPrediction, ScreeningError> {
    let (w, h) = classifier.input_size();
    let input = if image.dimensions() == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, w, h, FilterType::CatmullRom)
    };

    let probabilities = classifier
        .predict(std::slice::from_ref(&input))
        .map_err(ScreeningError::Classifier)?;

    let probability = probabilities.first().copied().ok_or_else(|| {
        ScreeningError::Classifier(anyhow::anyhow!("classifier returned no probability"))
    })?;

    Ok(ModalityPrediction::from_probability(
        probability.clamp(0.0, 1.0),
    ))
}
