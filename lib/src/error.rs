use thiserror::Error;

/// Everything that can go wrong between reading samples and writing the artifact.
/// None of these are recoverable within a run.
#[derive(Error, Debug)]
pub enum Error {
  #[error("feature vector has {found} values, model expects {expected}")]
  Dimension { expected: usize, found: usize },

  #[error("label {value} is not binary (expected 0 or 1)")]
  Label { value: f32 },

  #[error("feature at position {index} is not a finite number")]
  NonFinite { index: usize },

  #[error("dataset is empty")]
  EmptyDataset,

  #[error("holdout fraction {0} must lie strictly between 0 and 1")]
  HoldoutFraction(f64),

  #[error("{samples} samples cannot be split with holdout fraction {fraction}")]
  SplitTooSmall { samples: usize, fraction: f64 },

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error("line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error("malformed artifact: {0}")]
  Artifact(String),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("tensor error: {0}")]
  Tensor(#[from] candle_core::Error),

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
