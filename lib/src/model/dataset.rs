use rand::{distributions::Uniform, rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::path::Path;

use super::{Dataset, Sample, FALL, FEATURE_COUNT, NON_FALL};
use crate::error::{Error, Result};

/// Non-empty, non-comment lines parsed as whitespace separated floats,
/// tagged with their 1-based line number.
fn numeric_rows(content: &str) -> impl Iterator<Item = Result<(usize, Vec<f32>)>> + '_ {
  content
    .lines()
    .enumerate()
    .map(|(i, line)| (i + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
    .map(|(line, text)| {
      text
        .split_whitespace()
        .map(|val| {
          val.parse::<f32>().map_err(|e| Error::Parse {
            line,
            message: format!("{:?}: {}", val, e),
          })
        })
        .collect::<Result<Vec<f32>>>()
        .map(|values| (line, values))
    })
}

/// One sample per line: `width` feature values followed by the label.
pub fn parse_dataset(content: &str, width: usize) -> Result<Dataset> {
  let mut samples = Vec::new();
  for row in numeric_rows(content) {
    let (line, mut values) = row?;
    if values.len() != width + 1 {
      return Err(Error::Parse {
        line,
        message: format!(
          "expected {} features and a label, found {} columns",
          width,
          values.len()
        ),
      });
    }
    let label = values.pop().unwrap_or(NON_FALL);
    let sample = Sample::new(values, label);
    sample.validate(width).map_err(|e| Error::Parse {
      line,
      message: e.to_string(),
    })?;
    samples.push(sample);
  }
  Ok(Dataset::new(samples))
}

pub fn read_dataset(path: &Path, width: usize) -> Result<Dataset> {
  let content = std::fs::read_to_string(path)?;
  parse_dataset(&content, width)
}

/// Unlabeled rows, as fed to a trained model.
pub fn parse_features(content: &str, width: usize) -> Result<Vec<Vec<f32>>> {
  numeric_rows(content)
    .map(|row| {
      let (line, values) = row?;
      super::validate_features(&values, width).map_err(|e| Error::Parse {
        line,
        message: e.to_string(),
      })?;
      Ok(values)
    })
    .collect()
}

pub fn read_features(path: &Path, width: usize) -> Result<Vec<Vec<f32>>> {
  let content = std::fs::read_to_string(path)?;
  parse_features(&content, width)
}

/// Random partition into (train, eval). The eval side gets
/// `ceil(len * holdout_fraction)` samples and neither side may be empty.
pub fn split_dataset(dataset: Dataset, holdout_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
  if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
    return Err(Error::HoldoutFraction(holdout_fraction));
  }
  let n = dataset.len();
  let n_eval = (n as f64 * holdout_fraction).ceil() as usize;
  if n_eval == 0 || n_eval >= n {
    return Err(Error::SplitTooSmall {
      samples: n,
      fraction: holdout_fraction,
    });
  }
  let mut samples = dataset.samples;
  samples.shuffle(&mut StdRng::seed_from_u64(seed));
  let eval = samples.split_off(n - n_eval);
  Ok((Dataset::new(samples), Dataset::new(eval)))
}

/// Synthetic stand-in until recorded sensor data is available. Falls draw
/// every feature from [0.6, 1.4), non-falls from [0.0, 0.4).
pub fn placeholder_dataset(samples_per_class: usize, seed: u64) -> Dataset {
  let mut rng = StdRng::seed_from_u64(seed);
  let fall = Uniform::new(0.6f32, 1.4);
  let calm = Uniform::new(0.0f32, 0.4);
  let mut samples = Vec::with_capacity(2 * samples_per_class);
  for _ in 0..samples_per_class {
    let features = (0..FEATURE_COUNT).map(|_| rng.sample(fall)).collect();
    samples.push(Sample::new(features, FALL));
    let features = (0..FEATURE_COUNT).map(|_| rng.sample(calm)).collect();
    samples.push(Sample::new(features, NON_FALL));
  }
  Dataset::new(samples)
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn numbered(n: usize) -> Dataset {
    Dataset::new(
      (0..n)
        .map(|i| Sample::new(vec![i as f32; 3], (i % 2) as f32))
        .collect(),
    )
  }

  fn ids(ds: &Dataset) -> Vec<usize> {
    ds.samples.iter().map(|s| s.features[0] as usize).collect()
  }

  proptest! {
    #[test]
    fn split_partitions_the_input(n in 2usize..300, fraction in 0.01f64..0.99, seed in any::<u64>()) {
      let expected_eval = (n as f64 * fraction).ceil() as usize;
      prop_assume!(expected_eval < n);
      let (train, eval) = split_dataset(numbered(n), fraction, seed).unwrap();

      prop_assert_eq!(train.len() + eval.len(), n);
      prop_assert!((eval.len() as f64 - n as f64 * fraction).abs() < 1.0);

      let mut all = ids(&train);
      all.extend(ids(&eval));
      all.sort_unstable();
      prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
    }
  }

  #[test]
  fn split_matches_eighty_twenty() {
    let (train, eval) = split_dataset(numbered(10), 0.2, 1).unwrap();
    assert_eq!((train.len(), eval.len()), (8, 2));
    let (train, eval) = split_dataset(numbered(2), 0.2, 1).unwrap();
    assert_eq!((train.len(), eval.len()), (1, 1));
  }

  #[test]
  fn split_is_seeded() {
    let a = split_dataset(numbered(50), 0.2, 9).unwrap();
    let b = split_dataset(numbered(50), 0.2, 9).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn split_rejects_bad_fractions() {
    for f in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
      assert!(matches!(
        split_dataset(numbered(10), f, 0),
        Err(Error::HoldoutFraction(_))
      ));
    }
    assert!(matches!(
      split_dataset(numbered(1), 0.2, 0),
      Err(Error::SplitTooSmall { samples: 1, .. })
    ));
    assert!(matches!(
      split_dataset(Dataset::default(), 0.2, 0),
      Err(Error::SplitTooSmall { samples: 0, .. })
    ));
  }

  #[test]
  fn parses_labeled_rows() {
    let content = "# svm energy jerk label\n\n1 2 3 1\n  0.5 0.25 0 0  \n";
    let ds = parse_dataset(content, 3).unwrap();
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.samples[0], Sample::new(vec![1.0, 2.0, 3.0], 1.0));
    assert_eq!(ds.samples[1].label, 0.0);
  }

  #[test]
  fn parse_reports_line_numbers() {
    match parse_dataset("1 2 3 1\n1 2 x 0\n", 3) {
      Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
      other => panic!("unexpected {:?}", other),
    }
    match parse_dataset("1 2 3 1\n\n1 2 0\n", 3) {
      Err(Error::Parse { line, .. }) => assert_eq!(line, 3),
      other => panic!("unexpected {:?}", other),
    }
    match parse_dataset("1 2 3 7\n", 3) {
      Err(Error::Parse { line, message }) => {
        assert_eq!(line, 1);
        assert!(message.contains("label"));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn parses_unlabeled_rows() {
    let rows = parse_features("1 2\n3 4\n", 2).unwrap();
    assert_eq!(rows, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    assert!(parse_features("1 2 3\n", 2).is_err());
  }

  #[test]
  fn placeholder_is_balanced_and_valid() {
    let ds = placeholder_dataset(25, 3);
    assert_eq!(ds.len(), 50);
    assert_eq!(ds.positives(), 25);
    ds.validate(FEATURE_COUNT).unwrap();
    assert_eq!(ds, placeholder_dataset(25, 3));
  }

  #[test]
  fn reads_dataset_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("samples.txt");
    std::fs::write(&path, "0.1 0.2 0\n0.9 0.8 1\n").unwrap();
    let ds = read_dataset(&path, 2).unwrap();
    assert_eq!(ds.positives(), 1);
    assert!(matches!(
      read_dataset(&dir.path().join("missing.txt"), 2),
      Err(Error::Io(_))
    ));
  }
}
