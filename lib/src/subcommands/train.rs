use std::path::{Path, PathBuf};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  config::{TrainConfig, PLACEHOLDER_SAMPLES_PER_CLASS},
  error::Result,
  export::export_with_precision,
  model::{placeholder_dataset, read_dataset, split_dataset, train, History, Model, TrainingParams},
  utils::{save, serialize_to_file},
};

/// Build, train, export and save in one pass.
pub struct Train {
  config: TrainConfig,
  data_path: Option<PathBuf>,
  report_path: Option<PathBuf>,
}

/// What a finished run leaves behind besides the artifact file.
#[derive(Debug)]
pub struct TrainOutcome {
  pub model: Model,
  pub history: History,
  pub artifact_len: usize,
}

#[derive(Serialize)]
struct TrainingReport<'a> {
  config: &'a TrainConfig,
  train_samples: usize,
  eval_samples: usize,
  artifact_bytes: usize,
  history: &'a History,
}

impl Train {
  pub fn new(config: TrainConfig, data_path: Option<&Path>, report_path: Option<&Path>) -> Self {
    Self {
      config,
      data_path: data_path.map(PathBuf::from),
      report_path: report_path.map(PathBuf::from),
    }
  }

  #[tracing::instrument(skip(self), fields(output = %self.config.output.display()))]
  pub fn run(self) -> Result<TrainOutcome> {
    let cfg = &self.config;
    cfg.validate()?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let dataset = match &self.data_path {
      Some(path) => read_dataset(path, cfg.model.input_dim)?,
      None => {
        warn!("No dataset given, training on placeholder data");
        placeholder_dataset(PLACEHOLDER_SAMPLES_PER_CLASS, rng.gen())
      }
    };
    info!(
      "Loaded {} samples ({} falls)",
      dataset.len(),
      dataset.positives()
    );

    let (train_set, eval_set) = split_dataset(dataset, cfg.holdout_fraction, rng.gen())?;
    let mut model = Model::build(&cfg.model, cfg.optimizer, &mut rng)?;
    info!(
      "Model {} with {} parameters",
      cfg.model.summary(),
      model.param_count()
    );

    let params = TrainingParams {
      epochs: cfg.epochs,
      batch_size: cfg.batch_size,
      seed: rng.gen(),
    };
    let history = train(&mut model, &train_set, &eval_set, &params)?;

    let bytes = export_with_precision(&model, cfg.precision)?;
    save(&bytes, &cfg.output)?;

    if let Some(report_path) = &self.report_path {
      let report = TrainingReport {
        config: cfg,
        train_samples: train_set.len(),
        eval_samples: eval_set.len(),
        artifact_bytes: bytes.len(),
        history: &history,
      };
      serialize_to_file(report_path, &report)?;
    }

    Ok(TrainOutcome {
      model,
      history,
      artifact_len: bytes.len(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::export::{Interpreter, Precision};

  fn quick_config(output: PathBuf) -> TrainConfig {
    TrainConfig {
      epochs: 15,
      output,
      ..TrainConfig::default()
    }
  }

  #[test]
  fn placeholder_run_writes_a_loadable_artifact() {
    let _scope = crate::utils::init_logging_tests();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fall_detection_model.tflite");
    let report = dir.path().join("report.json");

    let outcome = Train::new(quick_config(output.clone()), None, Some(report.as_path()))
      .run()
      .unwrap();
    assert_eq!(outcome.history.epochs.len(), 15);
    assert_eq!(std::fs::metadata(&output).unwrap().len() as usize, outcome.artifact_len);

    let interpreter = Interpreter::load(&output).unwrap();
    assert_eq!(interpreter.precision(), Precision::Int8);
    let x = [1.0; 15];
    let expected = outcome.model.predict(&x).unwrap();
    assert!((interpreter.invoke(&x).unwrap() - expected).abs() <= 0.05);

    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&report).unwrap()).unwrap();
    assert_eq!(json["train_samples"], 160);
    assert_eq!(json["eval_samples"], 40);
    assert_eq!(json["history"]["epochs"].as_array().unwrap().len(), 15);
  }

  #[test]
  fn trains_from_a_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("samples.txt");
    let rows: String = crate::model::placeholder_dataset(10, 2)
      .samples
      .iter()
      .map(|s| {
        let mut cols: Vec<String> = s.features.iter().map(|f| f.to_string()).collect();
        cols.push(s.label.to_string());
        cols.join(" ") + "\n"
      })
      .collect();
    std::fs::write(&data, rows).unwrap();

    let output = dir.path().join("model.tflite");
    let config = TrainConfig {
      epochs: 2,
      precision: Precision::Float32,
      ..quick_config(output.clone())
    };
    let outcome = Train::new(config, Some(data.as_path()), None).run().unwrap();
    assert_eq!(outcome.history.epochs.len(), 2);
    assert_eq!(Interpreter::load(&output).unwrap().precision(), Precision::Float32);
  }

  #[test]
  fn same_seed_same_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.tflite");
    let b = dir.path().join("b.tflite");
    Train::new(quick_config(a.clone()), None, None).run().unwrap();
    Train::new(quick_config(b.clone()), None, None).run().unwrap();
    assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
  }

  #[test]
  fn bad_rows_abort_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("samples.txt");
    std::fs::write(&data, "1 2 3 1\n").unwrap();
    let output = dir.path().join("model.tflite");
    let err = Train::new(quick_config(output.clone()), Some(data.as_path()), None)
      .run()
      .unwrap_err();
    assert!(matches!(err, Error::Parse { line: 1, .. }));
    assert!(!output.exists());
  }
}
