//! Candle-backed models: the `BlazeFace` landmark provider, the binary
//! classifiers used for both screening paths, and their trainer.

mod blazeface;
mod classifier;
mod device;
mod loader;
mod trainer;
mod utils;

pub use blazeface::{
    eye_regions, BlazeFace, FaceDetection, BLAZEFACE_LEFT_EYE, BLAZEFACE_RIGHT_EYE,
};
pub use classifier::{
    images_to_tensor, BinaryClassifier, CandleClassifier, ClassifierSpec, BACKBONE_PREFIX,
    DEFAULT_DROPOUT, FACE_INPUT_SIZE, HEAD_PREFIX,
};
pub use device::select_device;
pub use loader::load_safetensors;
pub use trainer::{CandleTrainer, WeightSnapshot};
pub use utils::sigmoid;
