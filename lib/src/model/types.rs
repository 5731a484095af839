use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Width of the feature vector produced by the on-device feature extractor.
///
/// The order is part of the contract with the inference side. The leading
/// five positions are signal vector magnitude, signal energy, jerk,
/// rotational energy and orientation change; the rest are opaque.
pub const FEATURE_COUNT: usize = 15;

/// Probability above which a prediction counts as a fall.
pub const DECISION_THRESHOLD: f32 = 0.5;

pub const FALL: f32 = 1.0;
pub const NON_FALL: f32 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
  pub features: Vec<f32>,
  pub label: f32,
}

impl Sample {
  pub fn new(features: Vec<f32>, label: f32) -> Self {
    Self { features, label }
  }

  /// Checks width, finiteness and that the label is exactly 0 or 1.
  pub fn validate(&self, width: usize) -> Result<()> {
    validate_features(&self.features, width)?;
    if self.label != FALL && self.label != NON_FALL {
      return Err(Error::Label { value: self.label });
    }
    Ok(())
  }
}

pub fn validate_features(features: &[f32], width: usize) -> Result<()> {
  if features.len() != width {
    return Err(Error::Dimension {
      expected: width,
      found: features.len(),
    });
  }
  match features.iter().position(|x| !x.is_finite()) {
    Some(index) => Err(Error::NonFinite { index }),
    None => Ok(()),
  }
}

/// Labeled feature vectors. Sample order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  pub samples: Vec<Sample>,
}

impl Dataset {
  pub fn new(samples: Vec<Sample>) -> Self {
    Self { samples }
  }

  /// Pairs feature rows with labels; both sides must have equal length.
  pub fn from_parts(features: Vec<Vec<f32>>, labels: Vec<f32>) -> Result<Self> {
    if features.len() != labels.len() {
      return Err(Error::Config(format!(
        "{} feature rows but {} labels",
        features.len(),
        labels.len()
      )));
    }
    Ok(Self {
      samples: features
        .into_iter()
        .zip(labels)
        .map(|(features, label)| Sample::new(features, label))
        .collect(),
    })
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn validate(&self, width: usize) -> Result<()> {
    self.samples.iter().try_for_each(|s| s.validate(width))
  }

  pub fn positives(&self) -> usize {
    self.samples.iter().filter(|s| s.label == FALL).count()
  }
}
