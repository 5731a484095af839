/// Largest magnitude an int8 weight may take. -128 is left unused so the
/// range stays symmetric around zero.
pub const QMAX: f32 = 127.0;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Defines a scaling of a float by: x => round(x / scale), zero point fixed at 0
pub struct QuantScale {
  pub scale: f32,
}

impl QuantScale {
  /// Scale that maps the largest magnitude in `values` onto [`QMAX`].
  /// An all-zero slice gets scale 1 so dequantization stays well defined.
  pub fn fit(values: &[f32]) -> Self {
    let max = values.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    Self {
      scale: if max > 0.0 { max / QMAX } else { 1.0 },
    }
  }

  pub fn quantize(&self, x: f32) -> i8 {
    (x / self.scale).round().clamp(-QMAX, QMAX) as i8
  }

  pub fn dequantize(&self, q: i8) -> f32 {
    f32::from(q) * self.scale
  }
}

/// Row-major int8 matrix with one scale per row (per output unit).
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedMatrix {
  pub rows: usize,
  pub cols: usize,
  pub scales: Vec<QuantScale>,
  pub values: Vec<i8>,
}

impl QuantizedMatrix {
  pub fn from_rows(weights: &[f32], rows: usize, cols: usize) -> Self {
    let mut scales = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows * cols);
    for row in weights.chunks(cols.max(1)).take(rows) {
      let scale = QuantScale::fit(row);
      values.extend(row.iter().map(|&w| scale.quantize(w)));
      scales.push(scale);
    }
    Self {
      rows,
      cols,
      scales,
      values,
    }
  }

  pub fn dequantize(&self) -> Vec<f32> {
    self
      .values
      .chunks(self.cols.max(1))
      .zip(&self.scales)
      .flat_map(|(row, scale)| row.iter().map(move |&q| scale.dequantize(q)))
      .collect()
  }
}
