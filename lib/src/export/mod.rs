pub mod artifact;
pub mod interpreter;
pub mod quantize;

pub use artifact::{Artifact, Precision};
pub use interpreter::{Dense, Interpreter};

use tracing::info;

use crate::error::Result;
use crate::model::Model;

/// Freezes `model` into the default int8 artifact.
pub fn export(model: &Model) -> Result<Vec<u8>> {
  export_with_precision(model, Precision::default())
}

#[tracing::instrument(skip(model))]
pub fn export_with_precision(model: &Model, precision: Precision) -> Result<Vec<u8>> {
  let bytes = Artifact::from_model(model, precision)?.to_bytes()?;
  info!(
    "Exported {} parameters ({}) as {} bytes",
    model.param_count(),
    model.config().summary(),
    bytes.len()
  );
  Ok(bytes)
}
