use std::path::Path;

use super::artifact::{Artifact, ArtifactLayer, Precision};
use crate::error::{Error, Result};
use crate::model::{validate_features, Activation};

/// Frozen fully-connected layer. Weights are row-major: one row of `inputs`
/// values per unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
  pub inputs: usize,
  pub units: usize,
  pub activation: Activation,
  pub weights: Vec<f32>,
  pub bias: Vec<f32>,
}

impl Dense {
  pub fn row(&self, unit: usize) -> &[f32] {
    &self.weights[unit * self.inputs..(unit + 1) * self.inputs]
  }

  pub fn forward(&self, x: &[f32]) -> Vec<f32> {
    (0..self.units)
      .map(|j| {
        let z = self.row(j).iter().zip(x).map(|(w, x)| w * x).sum::<f32>() + self.bias[j];
        self.activation.apply(z)
      })
      .collect()
  }
}

/// Runs an exported artifact the way an on-device runtime would:
/// weights are decoded once and every call is a plain forward pass.
#[derive(Debug, Clone)]
pub struct Interpreter {
  precision: Precision,
  input_dim: usize,
  layers: Vec<Dense>,
}

impl Interpreter {
  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    let artifact = Artifact::from_bytes(bytes)?;
    Ok(Self {
      precision: artifact.precision,
      input_dim: artifact.input_dim,
      layers: artifact.layers.iter().map(ArtifactLayer::to_dense).collect(),
    })
  }

  pub fn load(path: &Path) -> Result<Self> {
    let bytes = std::fs::read(path)?;
    Self::from_bytes(&bytes)
  }

  pub fn precision(&self) -> Precision {
    self.precision
  }

  pub fn input_dim(&self) -> usize {
    self.input_dim
  }

  /// Fall probability for one feature vector.
  pub fn invoke(&self, features: &[f32]) -> Result<f32> {
    validate_features(features, self.input_dim)?;
    let out = self
      .layers
      .iter()
      .fold(features.to_vec(), |a, layer| layer.forward(&a));
    out
      .first()
      .copied()
      .ok_or_else(|| Error::Artifact("network has no output".into()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::export::{export, export_with_precision};
  use crate::model::{create_model, placeholder_dataset, train, Dataset, TrainingParams};

  fn trained() -> (crate::model::Model, Dataset) {
    let ds = placeholder_dataset(40, 12);
    let mut model = create_model(12).unwrap();
    let params = TrainingParams {
      epochs: 20,
      batch_size: 16,
      seed: 12,
    };
    train(&mut model, &ds, &Dataset::default(), &params).unwrap();
    (model, ds)
  }

  #[test]
  fn int8_tracks_model_within_tolerance() {
    let (model, ds) = trained();
    let interpreter = Interpreter::from_bytes(&export(&model).unwrap()).unwrap();
    assert_eq!(interpreter.precision(), Precision::Int8);
    for s in &ds.samples {
      let expected = model.predict(&s.features).unwrap();
      let got = interpreter.invoke(&s.features).unwrap();
      assert!((expected - got).abs() <= 0.05, "{} vs {}", expected, got);
    }
  }

  #[test]
  fn float32_matches_model() {
    let (model, ds) = trained();
    let bytes = export_with_precision(&model, Precision::Float32).unwrap();
    let interpreter = Interpreter::from_bytes(&bytes).unwrap();
    for s in &ds.samples {
      let expected = model.predict(&s.features).unwrap();
      let got = interpreter.invoke(&s.features).unwrap();
      // only summation order differs from the training graph
      assert!((expected - got).abs() < 1e-5, "{} vs {}", expected, got);
    }
  }

  #[test]
  fn dense_forward_is_row_major() {
    let layer = Dense {
      inputs: 2,
      units: 2,
      activation: Activation::Relu,
      weights: vec![1.0, 2.0, -3.0, 1.0],
      bias: vec![0.5, 0.0],
    };
    assert_eq!(layer.row(1), &[-3.0, 1.0]);
    assert_eq!(layer.forward(&[1.0, 1.0]), vec![3.5, 0.0]);
  }

  #[test]
  fn checks_input_width() {
    let interpreter = Interpreter::from_bytes(&export(&create_model(0).unwrap()).unwrap()).unwrap();
    assert_eq!(interpreter.input_dim(), 15);
    assert!(matches!(
      interpreter.invoke(&[0.0; 16]),
      Err(Error::Dimension {
        expected: 15,
        found: 16
      })
    ));
  }

  #[test]
  fn loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.tflite");
    let model = create_model(6).unwrap();
    std::fs::write(&path, export(&model).unwrap()).unwrap();
    let interpreter = Interpreter::load(&path).unwrap();
    let x = [0.3; 15];
    assert!((interpreter.invoke(&x).unwrap() - model.predict(&x).unwrap()).abs() <= 0.05);
    assert!(matches!(
      Interpreter::load(&dir.path().join("nope.tflite")),
      Err(Error::Io(_))
    ));
  }
}
