use std::fmt;

use candle_core::{DType, Device, Module, Tensor, Var};
use candle_nn::{ops, AdamW, Linear, Optimizer, ParamsAdamW};
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

use super::{accuracy_hit, binary_cross_entropy_with_logits, Metrics};
use super::{validate_features, Activation, AdamConfig, Dataset, LayerSpec, ModelConfig, Sample};
use crate::error::{Error, Result};
use crate::export::interpreter::Dense;

/// Glorot-uniform values for a `units x inputs` weight matrix, row-major.
fn glorot_uniform<R: Rng>(inputs: usize, units: usize, rng: &mut R) -> Vec<f32> {
  let limit = (6.0 / (inputs + units) as f32).sqrt();
  let dist = Uniform::new_inclusive(-limit, limit);
  (0..inputs * units).map(|_| rng.sample(dist)).collect()
}

/// Inverted-dropout multipliers: 0 with probability `rate`, 1/(1-rate) otherwise.
fn dropout_mask<R: Rng>(
  (rows, cols): (usize, usize),
  rate: f32,
  device: &Device,
  rng: &mut R,
) -> Result<Tensor> {
  let keep = 1.0 / (1.0 - rate);
  let mask: Vec<f32> = (0..rows * cols)
    .map(|_| if rng.gen::<f32>() < rate { 0.0 } else { keep })
    .collect();
  Ok(Tensor::from_vec(mask, (rows, cols), device)?)
}

fn activate(activation: Activation, z: &Tensor) -> candle_core::Result<Tensor> {
  match activation {
    Activation::Linear => Ok(z.clone()),
    Activation::Relu => z.relu(),
    Activation::Sigmoid => ops::sigmoid(z),
  }
}

/// A dense layer whose parameters are candle variables. `linear` reads the
/// same storage, so optimizer updates are visible to the forward pass.
struct Layer {
  inputs: usize,
  spec: LayerSpec,
  weight: Var,
  bias: Var,
  linear: Linear,
}

impl Layer {
  /// Glorot-uniform weights, zero bias.
  fn new<R: Rng>(inputs: usize, spec: &LayerSpec, device: &Device, rng: &mut R) -> Result<Self> {
    let weight = Tensor::from_vec(glorot_uniform(inputs, spec.units, rng), (spec.units, inputs), device)?;
    let weight = Var::from_tensor(&weight)?;
    let bias = Var::from_tensor(&Tensor::zeros(spec.units, DType::F32, device)?)?;
    let linear = Linear::new(weight.as_tensor().clone(), Some(bias.as_tensor().clone()));
    Ok(Self {
      inputs,
      spec: spec.clone(),
      weight,
      bias,
      linear,
    })
  }

  fn param_count(&self) -> usize {
    self.inputs * self.spec.units + self.spec.units
  }

  fn freeze(&self) -> Result<Dense> {
    Ok(Dense {
      inputs: self.inputs,
      units: self.spec.units,
      activation: self.spec.activation,
      weights: self.weight.as_tensor().flatten_all()?.to_vec1::<f32>()?,
      bias: self.bias.as_tensor().to_vec1::<f32>()?,
    })
  }
}

/// Binary classifier: a stack of dense layers ending in one sigmoid unit,
/// compiled with Adam and binary cross-entropy.
pub struct Model {
  config: ModelConfig,
  adam: AdamConfig,
  device: Device,
  layers: Vec<Layer>,
  optimizer: AdamW,
  steps: usize,
}

impl fmt::Debug for Model {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Model")
      .field("topology", &self.config.summary())
      .field("optimizer", &self.adam)
      .field("steps", &self.steps)
      .finish()
  }
}

impl Model {
  /// Builds any valid topology. Parameter values come from `rng`.
  pub fn build<R: Rng>(config: &ModelConfig, optimizer: AdamConfig, rng: &mut R) -> Result<Self> {
    config.validate()?;
    optimizer.validate()?;
    let device = Device::Cpu;
    let mut inputs = config.input_dim;
    let mut layers = Vec::with_capacity(config.layers.len());
    for spec in &config.layers {
      layers.push(Layer::new(inputs, spec, &device, rng)?);
      inputs = spec.units;
    }
    let vars = layers
      .iter()
      .flat_map(|l| [l.weight.clone(), l.bias.clone()])
      .collect();
    let params = ParamsAdamW {
      lr: f64::from(optimizer.learning_rate),
      beta1: f64::from(optimizer.beta1),
      beta2: f64::from(optimizer.beta2),
      eps: f64::from(optimizer.epsilon),
      weight_decay: 0.0,
    };
    let adam = AdamW::new(vars, params)?;
    tracing::debug!("Built model {}", config.summary());
    Ok(Self {
      config: config.clone(),
      adam: optimizer,
      device,
      layers,
      optimizer: adam,
      steps: 0,
    })
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub fn input_dim(&self) -> usize {
    self.config.input_dim
  }

  pub fn optimizer(&self) -> &AdamConfig {
    &self.adam
  }

  /// Optimizer updates applied so far.
  pub fn steps(&self) -> usize {
    self.steps
  }

  pub fn param_count(&self) -> usize {
    self.layers.iter().map(Layer::param_count).sum()
  }

  /// Copies the current parameters out of the graph.
  pub fn freeze(&self) -> Result<Vec<Dense>> {
    self.layers.iter().map(Layer::freeze).collect()
  }

  /// Fall probability for one feature vector. Dropout is inactive.
  pub fn predict(&self, features: &[f32]) -> Result<f32> {
    validate_features(features, self.input_dim())?;
    let x = Tensor::from_slice(features, (1, self.input_dim()), &self.device)?;
    let p = ops::sigmoid(&self.logits(&x, None)?)?;
    Ok(p.reshape(())?.to_scalar::<f32>()?)
  }

  /// Mean loss and accuracy over `dataset` without dropout.
  pub fn evaluate(&self, dataset: &Dataset) -> Result<Metrics> {
    if dataset.is_empty() {
      return Err(Error::EmptyDataset);
    }
    dataset.validate(self.input_dim())?;
    let (x, y) = self.to_tensors(dataset.samples.iter())?;
    let logits = self.logits(&x, None)?;
    let loss = binary_cross_entropy_with_logits(&logits, &y)?.to_scalar::<f32>()?;
    let probs = ops::sigmoid(&logits)?.flatten_all()?.to_vec1::<f32>()?;
    let hits = probs
      .iter()
      .zip(&dataset.samples)
      .filter(|(p, s)| accuracy_hit(**p, s.label))
      .count();
    Ok(Metrics {
      loss,
      accuracy: hits as f32 / dataset.len() as f32,
    })
  }

  /// Stacks validated samples into a `(n, input_dim)` feature tensor and a
  /// `(n, 1)` label tensor.
  pub(crate) fn to_tensors<'a>(
    &self,
    samples: impl ExactSizeIterator<Item = &'a Sample>,
  ) -> Result<(Tensor, Tensor)> {
    let n = samples.len();
    let mut xs = Vec::with_capacity(n * self.input_dim());
    let mut ys = Vec::with_capacity(n);
    for s in samples {
      xs.extend_from_slice(&s.features);
      ys.push(s.label);
    }
    Ok((
      Tensor::from_vec(xs, (n, self.input_dim()), &self.device)?,
      Tensor::from_vec(ys, (n, 1), &self.device)?,
    ))
  }

  /// Output-unit logits for a batch. With `dropout` set, hidden activations
  /// are masked from that generator.
  fn logits(&self, x: &Tensor, mut dropout: Option<&mut StdRng>) -> Result<Tensor> {
    let (output, hidden) = self
      .layers
      .split_last()
      .ok_or_else(|| Error::Config("model has no layers".into()))?;
    let mut a = x.clone();
    for layer in hidden {
      a = activate(layer.spec.activation, &layer.linear.forward(&a)?)?;
      if let Some(rng) = dropout.as_deref_mut() {
        if layer.spec.dropout > 0.0 {
          a = a.mul(&dropout_mask(a.dims2()?, layer.spec.dropout, &self.device, rng)?)?;
        }
      }
    }
    Ok(output.linear.forward(&a)?)
  }

  /// One Adam update on a mini-batch. Returns the batch loss and the
  /// dropout-active probabilities the loss was computed from.
  pub(crate) fn train_step(&mut self, x: &Tensor, y: &Tensor, rng: &mut StdRng) -> Result<(f32, Vec<f32>)> {
    let logits = self.logits(x, Some(rng))?;
    let loss = binary_cross_entropy_with_logits(&logits, y)?;
    self.optimizer.backward_step(&loss)?;
    self.steps += 1;
    let probs = ops::sigmoid(&logits)?.flatten_all()?.to_vec1::<f32>()?;
    Ok((loss.to_scalar::<f32>()?, probs))
  }
}

/// The fall-detection classifier: 15 -> 64 -> 32 -> 1 with dropout 0.2,
/// Adam at its defaults, initialized from `seed`.
pub fn create_model(seed: u64) -> Result<Model> {
  let mut rng = StdRng::seed_from_u64(seed);
  Model::build(&ModelConfig::fall_detection(), AdamConfig::default(), &mut rng)
}
