//! Byte container for a frozen classifier.
//!
//! Layout, all integers and floats little-endian:
//!
//! ```text
//! magic        "FDNN"
//! version      u16
//! precision    u8     0 = float32, 1 = int8
//! reserved     u8
//! input_dim    u32
//! layer_count  u32
//! per layer:
//!   inputs     u32
//!   units      u32
//!   activation u8     0 = linear, 1 = relu, 2 = sigmoid
//!   weights    float32: units * inputs f32
//!              int8:    units f32 row scales, then units * inputs i8
//!   bias       units f32
//! ```
//!
//! Dropout does not appear: it is the identity at inference time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::quantize::{QuantScale, QuantizedMatrix};
use crate::error::{Error, Result};
use super::interpreter::Dense;
use crate::model::{Activation, Model};

pub const MAGIC: &[u8; 4] = b"FDNN";
pub const VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
  Float32,
  #[default]
  Int8,
}

impl Precision {
  pub fn code(self) -> u8 {
    match self {
      Precision::Float32 => 0,
      Precision::Int8 => 1,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Precision::Float32),
      1 => Some(Precision::Int8),
      _ => None,
    }
  }
}

impl fmt::Display for Precision {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Precision::Float32 => write!(f, "float32"),
      Precision::Int8 => write!(f, "int8"),
    }
  }
}

impl FromStr for Precision {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "float32" | "f32" => Ok(Precision::Float32),
      "int8" | "i8" => Ok(Precision::Int8),
      other => Err(format!("unknown precision {:?} (float32 or int8)", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerWeights {
  Float32(Vec<f32>),
  Int8(QuantizedMatrix),
}

impl LayerWeights {
  pub fn to_f32(&self) -> Vec<f32> {
    match self {
      LayerWeights::Float32(w) => w.clone(),
      LayerWeights::Int8(m) => m.dequantize(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLayer {
  pub inputs: usize,
  pub units: usize,
  pub activation: Activation,
  pub weights: LayerWeights,
  pub bias: Vec<f32>,
}

impl ArtifactLayer {
  fn from_dense(layer: &Dense, precision: Precision) -> Self {
    let weights = match precision {
      Precision::Float32 => LayerWeights::Float32(layer.weights.clone()),
      Precision::Int8 => LayerWeights::Int8(QuantizedMatrix::from_rows(
        &layer.weights,
        layer.units,
        layer.inputs,
      )),
    };
    Self {
      inputs: layer.inputs,
      units: layer.units,
      activation: layer.activation,
      weights,
      bias: layer.bias.clone(),
    }
  }

  /// Float layer ready for inference; int8 weights are dequantized once here.
  pub fn to_dense(&self) -> Dense {
    Dense {
      inputs: self.inputs,
      units: self.units,
      activation: self.activation,
      weights: self.weights.to_f32(),
      bias: self.bias.clone(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
  pub precision: Precision,
  pub input_dim: usize,
  pub layers: Vec<ArtifactLayer>,
}

impl Artifact {
  pub fn from_model(model: &Model, precision: Precision) -> Result<Self> {
    Ok(Self {
      precision,
      input_dim: model.input_dim(),
      layers: model
        .freeze()?
        .iter()
        .map(|l| ArtifactLayer::from_dense(l, precision))
        .collect(),
    })
  }

  pub fn param_count(&self) -> usize {
    self
      .layers
      .iter()
      .map(|l| l.inputs * l.units + l.units)
      .sum()
  }

  pub fn to_bytes(&self) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.push(self.precision.code());
    out.push(0);
    put_u32(&mut out, self.input_dim)?;
    put_u32(&mut out, self.layers.len())?;
    for layer in &self.layers {
      put_u32(&mut out, layer.inputs)?;
      put_u32(&mut out, layer.units)?;
      out.push(layer.activation.code());
      match &layer.weights {
        LayerWeights::Float32(w) => put_f32s(&mut out, w),
        LayerWeights::Int8(m) => {
          for s in &m.scales {
            out.extend_from_slice(&s.scale.to_le_bytes());
          }
          out.extend(m.values.iter().map(|q| q.to_le_bytes()[0]));
        }
      }
      put_f32s(&mut out, &layer.bias);
    }
    Ok(out)
  }

  pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
    let mut r = Reader::new(bytes);
    if r.take(4)? != MAGIC {
      return Err(malformed("bad magic"));
    }
    let version = r.u16()?;
    if version != VERSION {
      return Err(malformed(format!("unsupported version {}", version)));
    }
    let code = r.u8()?;
    let precision =
      Precision::from_code(code).ok_or_else(|| malformed(format!("unknown precision {}", code)))?;
    r.u8()?;
    let input_dim = r.u32()?;
    let layer_count = r.u32()?;
    if input_dim == 0 || layer_count == 0 {
      return Err(malformed("empty network"));
    }

    let mut layers = Vec::new();
    let mut width = input_dim;
    for i in 0..layer_count {
      let inputs = r.u32()?;
      let units = r.u32()?;
      if inputs != width {
        return Err(malformed(format!(
          "layer {} takes {} inputs but receives {}",
          i, inputs, width
        )));
      }
      if units == 0 {
        return Err(malformed(format!("layer {} has no units", i)));
      }
      let code = r.u8()?;
      let activation = Activation::from_code(code)
        .ok_or_else(|| malformed(format!("unknown activation {}", code)))?;
      let count = inputs
        .checked_mul(units)
        .ok_or_else(|| malformed("layer size overflows"))?;
      let weights = match precision {
        Precision::Float32 => LayerWeights::Float32(r.f32s(count)?),
        Precision::Int8 => {
          let scales = r
            .f32s(units)?
            .into_iter()
            .map(|scale| QuantScale { scale })
            .collect();
          let values = r.take(count)?.iter().map(|&b| i8::from_le_bytes([b])).collect();
          LayerWeights::Int8(QuantizedMatrix {
            rows: units,
            cols: inputs,
            scales,
            values,
          })
        }
      };
      let bias = r.f32s(units)?;
      layers.push(ArtifactLayer {
        inputs,
        units,
        activation,
        weights,
        bias,
      });
      width = units;
    }
    if width != 1 {
      return Err(malformed("output layer must be a single unit"));
    }
    if r.remaining() != 0 {
      return Err(malformed(format!("{} trailing bytes", r.remaining())));
    }
    Ok(Self {
      precision,
      input_dim,
      layers,
    })
  }
}

fn malformed(message: impl Into<String>) -> Error {
  Error::Artifact(message.into())
}

fn put_u32(out: &mut Vec<u8>, v: usize) -> Result<()> {
  let v = u32::try_from(v).map_err(|_| malformed(format!("dimension {} does not fit in u32", v)))?;
  out.extend_from_slice(&v.to_le_bytes());
  Ok(())
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
  for v in values {
    out.extend_from_slice(&v.to_le_bytes());
  }
}

struct Reader<'a> {
  bytes: &'a [u8],
  pos: usize,
}

impl<'a> Reader<'a> {
  fn new(bytes: &'a [u8]) -> Self {
    Self { bytes, pos: 0 }
  }

  fn remaining(&self) -> usize {
    self.bytes.len() - self.pos
  }

  fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    if n > self.remaining() {
      return Err(malformed(format!(
        "truncated: wanted {} bytes at offset {}, {} left",
        n,
        self.pos,
        self.remaining()
      )));
    }
    let out = &self.bytes[self.pos..self.pos + n];
    self.pos += n;
    Ok(out)
  }

  fn u8(&mut self) -> Result<u8> {
    Ok(self.take(1)?[0])
  }

  fn u16(&mut self) -> Result<u16> {
    let b = self.take(2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
  }

  fn u32(&mut self) -> Result<usize> {
    let b = self.take(4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
  }

  fn f32s(&mut self, n: usize) -> Result<Vec<f32>> {
    let len = n.checked_mul(4).ok_or_else(|| malformed("length overflows"))?;
    Ok(
      self
        .take(len)?
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect(),
    )
  }
}
