//! Fall-detection classifier: a small dense network trained on 15 sensor
//! features and exported as a compact int8 artifact for on-device inference.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod subcommands;
pub mod utils;

pub use config::TrainConfig;
pub use error::{Error, Result};
