//! Column-wise z-scoring of `[samples, features]` matrices.
//!
//! `zscore_columns_inplace`:
//!   for each column j: μ_j = mean(x[:, j]), σ_j = std(x[:, j], ddof)
//!   x[:, j] = (x[:, j] − μ_j) / σ_j
//!
//! Columns with σ_j = 0 are centred but not scaled; callers that cannot use a
//! flat column check [`ColumnScale::first_constant`].
use ndarray::{Array2, Axis};

/// Per-column location and scale used by [`zscore_columns_inplace`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScale {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ColumnScale {
    /// Index of the first column whose spread is negligible, if any.
    ///
    /// A column is flat when `σ_j <= rel_tol · max(|μ_j|, max_k σ_k)`; an
    /// undefined σ (too few rows) also counts as flat.
    pub fn first_constant(&self, rel_tol: f64) -> Option<usize> {
        let max_std = self.std.iter().cloned().filter(|s| s.is_finite()).fold(0.0, f64::max);
        self.mean
            .iter()
            .zip(&self.std)
            .position(|(m, &s)| !(s > rel_tol * m.abs().max(max_std)))
    }
}

/// Standardise each column in place. Returns the statistics used.
///
/// Requires more than `ddof` rows; with fewer every σ is reported as NaN and
/// the data is only centred.
pub fn zscore_columns_inplace(x: &mut Array2<f64>, ddof: usize) -> ColumnScale {
    let n = x.nrows();
    let mut mean = Vec::with_capacity(x.ncols());
    let mut std = Vec::with_capacity(x.ncols());
    for mut col in x.axis_iter_mut(Axis(1)) {
        let m = if n == 0 { 0.0 } else { col.sum() / n as f64 };
        let ss: f64 = col.iter().map(|&v| (v - m) * (v - m)).sum();
        let s = if n > ddof { (ss / (n - ddof) as f64).sqrt() } else { f64::NAN };
        if s > 0.0 {
            col.mapv_inplace(|v| (v - m) / s);
        } else {
            col.mapv_inplace(|v| v - m);
        }
        mean.push(m);
        std.push(s);
    }
    ColumnScale { mean, std }
}
