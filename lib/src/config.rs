use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::export::Precision;
use crate::model::{AdamConfig, ModelConfig};

pub const DEFAULT_OUTPUT: &str = "fall_detection_model.tflite";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_HOLDOUT: f64 = 0.2;
/// Size of each class in the synthetic dataset used when no data file is given.
pub const PLACEHOLDER_SAMPLES_PER_CLASS: usize = 100;

/// Fully resolved settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
  pub model: ModelConfig,
  pub optimizer: AdamConfig,
  pub epochs: usize,
  pub batch_size: usize,
  pub holdout_fraction: f64,
  /// Root of every random draw in the run (split, initialization, shuffling, dropout).
  pub seed: u64,
  pub precision: Precision,
  pub output: PathBuf,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      model: ModelConfig::fall_detection(),
      optimizer: AdamConfig::default(),
      epochs: 50,
      batch_size: 32,
      holdout_fraction: DEFAULT_HOLDOUT,
      seed: DEFAULT_SEED,
      precision: Precision::default(),
      output: PathBuf::from(DEFAULT_OUTPUT),
    }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<()> {
    self.model.validate()?;
    self.optimizer.validate()?;
    if self.batch_size == 0 {
      return Err(Error::Config("batch size must be positive".into()));
    }
    if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
      return Err(Error::HoldoutFraction(self.holdout_fraction));
    }
    if self.output.as_os_str().is_empty() {
      return Err(Error::Config("output path is empty".into()));
    }
    Ok(())
  }
}
