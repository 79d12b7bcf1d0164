//! Test support utilities for asd-screen.
//!
//! Provides mocks for the detector, classifier, dataset, model and
//! progress ports, plus synthetic image and landmark builders.
//!
//! # Example
//!
//! ```
//! use asd_screen_test_support::{LandmarkBuilder, MockClassifier, SyntheticImageBuilder};
//!
//! let face = SyntheticImageBuilder::face(256, 256);
//! let landmarks = LandmarkBuilder::frontal();
//! let classifier = MockClassifier::fixed(224, 0.7);
//! # let _ = (face, landmarks, classifier);
//! ```

mod builders;
mod mocks;

pub use builders::{LandmarkBuilder, SyntheticImageBuilder};
pub use mocks::{
    MockClassifier, MockLabeledSource, MockLandmarkProvider, MockProgressSink, MockStagedModel,
    ModelCall,
};
