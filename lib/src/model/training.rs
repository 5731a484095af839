use candle_core::Tensor;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Dataset, Model, DECISION_THRESHOLD, FALL};
use crate::error::{Error, Result};

/// Mean binary cross-entropy of `sigmoid(logits)` against `labels`, in the
/// overflow-free form `max(z, 0) - z * y + ln(1 + e^-|z|)`.
pub fn binary_cross_entropy_with_logits(logits: &Tensor, labels: &Tensor) -> candle_core::Result<Tensor> {
  let softplus = (logits.abs()?.neg()?.exp()? + 1.0)?.log()?;
  ((logits.relu()? - logits.mul(labels)?)? + softplus)?.mean_all()
}

pub fn accuracy_hit(p: f32, label: f32) -> bool {
  (p > DECISION_THRESHOLD) == (label == FALL)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
  pub loss: f32,
  pub accuracy: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
  pub epochs: usize,
  pub batch_size: usize,
  /// Drives shuffling and dropout.
  pub seed: u64,
}

impl Default for TrainingParams {
  fn default() -> Self {
    Self {
      epochs: 50,
      batch_size: 32,
      seed: 0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
  pub epoch: usize,
  pub loss: f32,
  pub accuracy: f32,
  pub val_loss: Option<f32>,
  pub val_accuracy: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
  pub epochs: Vec<EpochMetrics>,
}

impl History {
  pub fn last(&self) -> Option<&EpochMetrics> {
    self.epochs.last()
  }
}

/// Runs `params.epochs` passes over `train_set` in shuffled mini-batches and
/// scores `eval_set` after each pass. An empty `eval_set` skips evaluation.
///
/// Both sets are validated against the model's input width before the first
/// update, so a rejected call leaves the parameters untouched.
#[tracing::instrument(
  skip_all,
  fields(epochs = params.epochs, train = train_set.len(), eval = eval_set.len())
)]
pub fn train(
  model: &mut Model,
  train_set: &Dataset,
  eval_set: &Dataset,
  params: &TrainingParams,
) -> Result<History> {
  if params.batch_size == 0 {
    return Err(Error::Config("batch size must be positive".into()));
  }
  if train_set.is_empty() {
    return Err(Error::EmptyDataset);
  }
  train_set.validate(model.input_dim())?;
  eval_set.validate(model.input_dim())?;

  let mut rng = StdRng::seed_from_u64(params.seed);
  let mut order: Vec<usize> = (0..train_set.len()).collect();
  let mut history = History::default();
  let start = std::time::Instant::now();

  for epoch in 1..=params.epochs {
    order.shuffle(&mut rng);
    let (mut loss, mut hits) = (0.0f64, 0usize);
    for batch in order.chunks(params.batch_size) {
      let (x, y) = model.to_tensors(batch.iter().map(|&i| &train_set.samples[i]))?;
      let (batch_loss, probs) = model.train_step(&x, &y, &mut rng)?;
      loss += f64::from(batch_loss) * batch.len() as f64;
      hits += batch
        .iter()
        .zip(&probs)
        .filter(|&(&i, &p)| accuracy_hit(p, train_set.samples[i].label))
        .count();
    }

    let n = train_set.len() as f64;
    let val = if eval_set.is_empty() {
      None
    } else {
      Some(model.evaluate(eval_set)?)
    };
    let metrics = EpochMetrics {
      epoch,
      loss: (loss / n) as f32,
      accuracy: (hits as f64 / n) as f32,
      val_loss: val.map(|m| m.loss),
      val_accuracy: val.map(|m| m.accuracy),
    };
    match val {
      Some(v) => info!(
        "epoch {}/{} loss={:.4} accuracy={:.4} val_loss={:.4} val_accuracy={:.4}",
        epoch, params.epochs, metrics.loss, metrics.accuracy, v.loss, v.accuracy
      ),
      None => info!(
        "epoch {}/{} loss={:.4} accuracy={:.4}",
        epoch, params.epochs, metrics.loss, metrics.accuracy
      ),
    }
    history.epochs.push(metrics);
  }

  let steps = model.steps();
  if steps > 0 {
    debug!(
      "Took {:.2}s, {:.2}µs / step",
      start.elapsed().as_secs_f32(),
      start.elapsed().as_micros() / steps as u128
    );
  }
  Ok(history)
}
