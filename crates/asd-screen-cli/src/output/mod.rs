//! Output formatting for CLI.

mod json;
mod progress;

pub use json::{JsonOutput, OutputRecord};
pub use progress::ProgressBar;
