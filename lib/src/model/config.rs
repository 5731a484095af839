use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::FEATURE_COUNT;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
  Linear,
  Relu,
  Sigmoid,
}

impl Activation {
  pub fn apply(self, z: f32) -> f32 {
    match self {
      Activation::Linear => z,
      Activation::Relu => z.max(0.0),
      Activation::Sigmoid => sigmoid(z),
    }
  }

  pub fn code(self) -> u8 {
    match self {
      Activation::Linear => 0,
      Activation::Relu => 1,
      Activation::Sigmoid => 2,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Activation::Linear),
      1 => Some(Activation::Relu),
      2 => Some(Activation::Sigmoid),
      _ => None,
    }
  }
}

pub fn sigmoid(z: f32) -> f32 {
  if z >= 0.0 {
    1.0 / (1.0 + (-z).exp())
  } else {
    let e = z.exp();
    e / (1.0 + e)
  }
}

/// One fully-connected layer, optionally followed by dropout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
  pub units: usize,
  pub activation: Activation,
  #[serde(default)]
  pub dropout: f32,
}

impl LayerSpec {
  pub fn dense(units: usize, activation: Activation) -> Self {
    Self {
      units,
      activation,
      dropout: 0.0,
    }
  }

  pub fn with_dropout(mut self, rate: f32) -> Self {
    self.dropout = rate;
    self
  }
}

/// Topology of the classifier as data, consumed by [`super::Model::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  pub input_dim: usize,
  pub layers: Vec<LayerSpec>,
}

impl ModelConfig {
  /// 15 -> 64 relu -> dropout 0.2 -> 32 relu -> dropout 0.2 -> 1 sigmoid
  pub fn fall_detection() -> Self {
    Self {
      input_dim: FEATURE_COUNT,
      layers: vec![
        LayerSpec::dense(64, Activation::Relu).with_dropout(0.2),
        LayerSpec::dense(32, Activation::Relu).with_dropout(0.2),
        LayerSpec::dense(1, Activation::Sigmoid),
      ],
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.input_dim == 0 {
      return Err(Error::Config("input dimension must be positive".into()));
    }
    let last = self
      .layers
      .last()
      .ok_or_else(|| Error::Config("model needs at least one layer".into()))?;
    for (i, layer) in self.layers.iter().enumerate() {
      if layer.units == 0 {
        return Err(Error::Config(format!("layer {} has no units", i)));
      }
      if !(0.0..1.0).contains(&layer.dropout) {
        return Err(Error::Config(format!(
          "layer {} dropout {} outside [0, 1)",
          i, layer.dropout
        )));
      }
    }
    if last.units != 1 || last.activation != Activation::Sigmoid || last.dropout != 0.0 {
      return Err(Error::Config(
        "output layer must be a single sigmoid unit without dropout".into(),
      ));
    }
    Ok(())
  }

  /// e.g. `15 -> 64 -> 32 -> 1`
  pub fn summary(&self) -> String {
    std::iter::once(self.input_dim)
      .chain(self.layers.iter().map(|l| l.units))
      .join(" -> ")
  }
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self::fall_detection()
  }
}

/// Adam hyper-parameters. Defaults follow the common Keras settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
  pub learning_rate: f32,
  pub beta1: f32,
  pub beta2: f32,
  pub epsilon: f32,
}

impl Default for AdamConfig {
  fn default() -> Self {
    Self {
      learning_rate: 1e-3,
      beta1: 0.9,
      beta2: 0.999,
      epsilon: 1e-7,
    }
  }
}

impl AdamConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
      return Err(Error::Config(format!(
        "learning rate {} must be positive",
        self.learning_rate
      )));
    }
    if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
      return Err(Error::Config("adam betas must lie in [0, 1)".into()));
    }
    if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
      return Err(Error::Config("adam epsilon must be positive and finite".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_topology() {
    let cfg = ModelConfig::fall_detection();
    cfg.validate().unwrap();
    assert_eq!(cfg.input_dim, 15);
    assert_eq!(cfg.summary(), "15 -> 64 -> 32 -> 1");
    assert_eq!(cfg.layers[0].dropout, 0.2);
    assert_eq!(cfg.layers[1].dropout, 0.2);
  }

  #[test]
  fn rejects_non_sigmoid_output() {
    let mut cfg = ModelConfig::fall_detection();
    cfg.layers.last_mut().unwrap().activation = Activation::Relu;
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn rejects_bad_dropout() {
    let mut cfg = ModelConfig::fall_detection();
    cfg.layers[0].dropout = 1.0;
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn rejects_empty_stack() {
    let cfg = ModelConfig {
      input_dim: 15,
      layers: vec![],
    };
    assert!(cfg.validate().is_err());
  }

  #[test]
  fn adam_rejects_non_finite_epsilon() {
    for epsilon in [f32::NAN, f32::INFINITY, 0.0, -1e-7] {
      let cfg = AdamConfig {
        epsilon,
        ..AdamConfig::default()
      };
      assert!(matches!(cfg.validate(), Err(Error::Config(_))), "{}", epsilon);
    }
    AdamConfig::default().validate().unwrap();
  }

  #[test]
  fn sigmoid_is_stable_at_extremes() {
    assert_eq!(sigmoid(-1000.0), 0.0);
    assert_eq!(sigmoid(1000.0), 1.0);
    assert!((sigmoid(0.0) - 0.5).abs() < 1e-7);
  }

  #[test]
  fn activation_codes_roundtrip() {
    for a in [Activation::Linear, Activation::Relu, Activation::Sigmoid] {
      assert_eq!(Activation::from_code(a.code()), Some(a));
    }
    assert_eq!(Activation::from_code(9), None);
  }
}
