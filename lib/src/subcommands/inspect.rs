use std::{
  fmt,
  path::{Path, PathBuf},
};

use itertools::Itertools;

use crate::{
  error::Result,
  export::{Artifact, Precision},
  model::Activation,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSummary {
  pub precision: Precision,
  pub input_dim: usize,
  pub layers: Vec<(usize, Activation)>,
  pub params: usize,
  pub bytes: usize,
}

impl fmt::Display for ArtifactSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "precision:  {}", self.precision)?;
    writeln!(f, "inputs:     {}", self.input_dim)?;
    writeln!(
      f,
      "layers:     {}",
      self
        .layers
        .iter()
        .map(|(units, act)| format!("{}({:?})", units, act).to_lowercase())
        .join(" -> ")
    )?;
    writeln!(f, "parameters: {}", self.params)?;
    write!(f, "size:       {} bytes", self.bytes)
  }
}

/// Reports what an artifact contains without running it.
pub struct Inspect {
  model_path: PathBuf,
}

impl Inspect {
  pub fn new(model_path: &Path) -> Self {
    Self {
      model_path: PathBuf::from(model_path),
    }
  }

  pub fn run(self) -> Result<ArtifactSummary> {
    let bytes = std::fs::read(&self.model_path)?;
    let artifact = Artifact::from_bytes(&bytes)?;
    Ok(ArtifactSummary {
      precision: artifact.precision,
      input_dim: artifact.input_dim,
      layers: artifact
        .layers
        .iter()
        .map(|l| (l.units, l.activation))
        .collect(),
      params: artifact.param_count(),
      bytes: bytes.len(),
    })
  }
}
