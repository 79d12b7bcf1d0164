//! ASD Screen Adapters - External adapters for asd-screen.
//!
//! This crate provides adapters for:
//! - Filesystem image source for uploads
//! - Directory-per-class training datasets with augmentation
//! - Model directory layout

pub mod augment;
pub mod dataset;
pub mod fs;
pub mod models;

pub use augment::{AugmentConfig, Augmenter};
pub use dataset::{open_splits, DatasetBatches, DatasetConfig, DirectoryDataset, Sample, SPLITS};
pub use fs::{load_image, FsImageSource};
pub use models::{
    list_models, model_path, models_dir, set_models_dir, ModelStatus, BLAZEFACE, EYE_CLASSIFIER,
    FACE_CLASSIFIER,
};
