use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{error::Result, export::Interpreter, model::read_features};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
  pub probability: f32,
  pub fall: bool,
}

/// Scores every feature row of a file with an exported artifact.
pub struct Predict {
  model_path: PathBuf,
  input_path: PathBuf,
  threshold: f32,
}

impl Predict {
  pub fn new(model_path: &Path, input_path: &Path, threshold: f32) -> Self {
    Self {
      model_path: PathBuf::from(model_path),
      input_path: PathBuf::from(input_path),
      threshold,
    }
  }

  pub fn run(self) -> Result<Vec<Prediction>> {
    let interpreter = Interpreter::load(&self.model_path)?;
    let rows = read_features(&self.input_path, interpreter.input_dim())?;
    tracing::debug!("Scoring {} rows", rows.len());
    rows
      .iter()
      .map(|row| {
        let probability = interpreter.invoke(row)?;
        Ok(Prediction {
          probability,
          fall: probability > self.threshold,
        })
      })
      .collect()
  }
}
