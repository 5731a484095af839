use serde::Serialize;
use std::{io::Write, path::Path};

#[cfg(not(debug_assertions))]
use human_panic::setup_panic;
use tempfile::NamedTempFile;
use tracing::{
  info,
  subscriber::{DefaultGuard, SetGlobalDefaultError},
};

#[cfg(debug_assertions)]
extern crate better_panic;

use tracing_subscriber::EnvFilter;

use crate::error::Result;

pub fn install_logger() -> std::result::Result<(), SetGlobalDefaultError> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_env_filter(filter)
    .finish();
  tracing::subscriber::set_global_default(subscriber)
}

pub fn init_logging() -> std::result::Result<(), SetGlobalDefaultError> {
  // Human Panic. Only enabled when *not* debugging.
  #[cfg(not(debug_assertions))]
  {
    setup_panic!();
  }

  // Better Panic. Only enabled *when* debugging.
  #[cfg(debug_assertions)]
  {
    better_panic::Settings::debug()
      .most_recent_first(false)
      .lineno_suffix(true)
      .verbosity(better_panic::Verbosity::Full)
      .install();
  }

  install_logger()?;

  Ok(())
}

/// Thread-local subscriber for tests; logging stops when the guard drops.
pub fn init_logging_tests() -> DefaultGuard {
  let subscriber = tracing_subscriber::fmt()
    .compact()
    .with_test_writer()
    .with_max_level(tracing::Level::DEBUG)
    .finish();
  tracing::subscriber::set_default(subscriber)
}

/// Writes `bytes` verbatim to `path`.
///
/// The data goes to a temporary file next to `path` that is renamed into
/// place only after a complete write. On any error the temporary file is
/// removed and `path` is left as it was.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn save(bytes: &[u8], path: &Path) -> Result<()> {
  let dir = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new("."),
  };
  let mut file = NamedTempFile::new_in(dir)?;
  file.write_all(bytes)?;
  file.as_file().sync_all()?;
  file.persist(path).map_err(|e| e.error)?;
  info!("Wrote {} bytes to {}", bytes.len(), path.display());
  Ok(())
}

pub fn serialize_to_file<T: Serialize>(path: &Path, obj: &T) -> Result<()> {
  let buff = serde_json::to_vec_pretty(obj)?;
  save(&buff, path)
}
