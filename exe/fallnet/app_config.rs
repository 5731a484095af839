use std::{error::Error, path::Path, path::PathBuf};

use fallnet::{
  export::Precision,
  model::{AdamConfig, ModelConfig},
  TrainConfig,
};
use serde::Deserialize;

/// Training settings as they may appear in a YAML file or on the command line.
/// Every field is optional; whatever is missing falls back to [`TrainConfig::default`].
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
  pub seed: Option<u64>,
  pub epochs: Option<usize>,
  pub batch_size: Option<usize>,
  /// Shortcut for `optimizer.learning_rate`
  pub learning_rate: Option<f32>,
  pub holdout_fraction: Option<f64>,
  pub precision: Option<Precision>,
  pub output: Option<PathBuf>,
  pub model: Option<ModelConfig>,
  pub optimizer: Option<AdamConfig>,
}

impl AppConfig {
  pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
  }

  // merge configs where the second overwrites the first
  pub fn merge(self, other: Self) -> Self {
    Self {
      seed: other.seed.or(self.seed),
      epochs: other.epochs.or(self.epochs),
      batch_size: other.batch_size.or(self.batch_size),
      learning_rate: other.learning_rate.or(self.learning_rate),
      holdout_fraction: other.holdout_fraction.or(self.holdout_fraction),
      precision: other.precision.or(self.precision),
      output: other.output.or(self.output),
      model: other.model.or(self.model),
      optimizer: other.optimizer.or(self.optimizer),
    }
  }

  pub fn resolve(self) -> TrainConfig {
    let defaults = TrainConfig::default();
    let mut optimizer = self.optimizer.unwrap_or(defaults.optimizer);
    if let Some(learning_rate) = self.learning_rate {
      optimizer.learning_rate = learning_rate;
    }
    TrainConfig {
      model: self.model.unwrap_or(defaults.model),
      optimizer,
      epochs: self.epochs.unwrap_or(defaults.epochs),
      batch_size: self.batch_size.unwrap_or(defaults.batch_size),
      holdout_fraction: self.holdout_fraction.unwrap_or(defaults.holdout_fraction),
      seed: self.seed.unwrap_or(defaults.seed),
      precision: self.precision.unwrap_or(defaults.precision),
      output: self.output.unwrap_or(defaults.output),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use fallnet::model::Activation;

  #[test]
  fn second_config_wins() {
    let file = AppConfig {
      epochs: Some(10),
      seed: Some(1),
      ..AppConfig::default()
    };
    let cli = AppConfig {
      epochs: Some(99),
      ..AppConfig::default()
    };
    let merged = file.merge(cli);
    assert_eq!(merged.epochs, Some(99));
    assert_eq!(merged.seed, Some(1));
  }

  #[test]
  fn empty_config_resolves_to_defaults() {
    assert_eq!(AppConfig::default().resolve(), TrainConfig::default());
  }

  #[test]
  fn learning_rate_shortcut_overrides_optimizer_block() {
    let cfg: AppConfig = serde_yaml::from_str(
      "learning_rate: 0.01\noptimizer:\n  learning_rate: 0.5\n  beta1: 0.8\n",
    )
    .unwrap();
    let resolved = cfg.resolve();
    assert_eq!(resolved.optimizer.learning_rate, 0.01);
    assert_eq!(resolved.optimizer.beta1, 0.8);
    assert_eq!(resolved.optimizer.beta2, 0.999);
  }

  #[test]
  fn reads_yaml_topology() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.yaml");
    std::fs::write(
      &path,
      r#"
epochs: 20
precision: float32
output: out/model.tflite
model:
  input_dim: 15
  layers:
    - { units: 16, activation: relu, dropout: 0.1 }
    - { units: 1, activation: sigmoid }
"#,
    )
    .unwrap();
    let resolved = AppConfig::from_file(&path).unwrap().resolve();
    resolved.validate().unwrap();
    assert_eq!(resolved.epochs, 20);
    assert_eq!(resolved.precision, Precision::Float32);
    assert_eq!(resolved.output, PathBuf::from("out/model.tflite"));
    assert_eq!(resolved.model.summary(), "15 -> 16 -> 1");
    assert_eq!(resolved.model.layers[1].activation, Activation::Sigmoid);
    assert_eq!(resolved.model.layers[1].dropout, 0.0);
  }

  #[test]
  fn unknown_keys_are_rejected() {
    assert!(serde_yaml::from_str::<AppConfig>("epoch: 3\n").is_err());
  }
}
