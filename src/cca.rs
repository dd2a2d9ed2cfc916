//! Canonical correlation analysis between two channel groups.
//!
//! Given `X` (`[n, p]`, EEG) and `Y` (`[n, q]`, EOG) observed over the same
//! `n` samples, find weight pairs `(a_i, b_i)` maximising
//! `corr(X·a_i, Y·b_i)` subject to the pairs being mutually uncorrelated.
//!
//! # Algorithm
//! 1. Standardise every column (mean 0, std 1, ddof = 1).
//! 2. Covariance blocks `Cxx = XᵀX/(n−1)`, `Cyy`, `Cxy`.
//! 3. Whitening `Cxx^{-1/2}`, `Cyy^{-1/2}` by symmetric eigendecomposition.
//! 4. SVD of `M = Cxx^{-1/2}·Cxy·Cyy^{-1/2} = U·S·Vᵀ`; the singular values are
//!    the canonical correlations, in descending order.
//! 5. Weights `A = Cxx^{-1/2}·U[:, :k]`, `B = Cyy^{-1/2}·V[:, :k]`.
//! 6. Sign: each pair `(a_i, b_i)` is negated together when the entry of
//!    `a_i` with the largest magnitude is negative, so results do not depend
//!    on the SVD's arbitrary sign choice.
//! 7. Projections `Xc = Xs·A`, `Yc = Ys·B`.
//!
//! The fit is closed-form: identical input gives identical output.
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::normalize::zscore_columns_inplace;

/// Eigenvalues below `RANK_TOL × λ_max` make a covariance block singular.
pub const RANK_TOL: f64 = 1e-12;

/// A column whose std is below `FLAT_TOL` times its group's scale is
/// treated as constant (the std-scale counterpart of [`RANK_TOL`]).
pub const FLAT_TOL: f64 = 1e-6;

/// Why a CCA fit produced no result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("X has {x_rows} samples but Y has {y_rows}")]
    DimensionMismatch { x_rows: usize, y_rows: usize },

    #[error("{n_samples} samples for {n_features} features (need at least as many samples)")]
    TooFewSamples { n_samples: usize, n_features: usize },

    #[error("{requested} components requested but at most {max} are available")]
    TooManyComponents { requested: usize, max: usize },

    #[error("input contains NaN or infinite values")]
    NonFinite,

    #[error("{side} column {index} is constant")]
    ConstantChannel { side: char, index: usize },

    #[error("{side} covariance is singular (rank-deficient channels)")]
    SingularCovariance { side: char },
}

/// Result of one fit.
#[derive(Debug, Clone)]
pub struct CanonicalPair {
    /// `[n, k]` canonical projections of X.
    pub xc: Array2<f64>,
    /// `[n, k]` canonical projections of Y.
    pub yc: Array2<f64>,
    /// `[p, k]` weights applied to the standardised X.
    pub x_weights: Array2<f64>,
    /// `[q, k]` weights applied to the standardised Y.
    pub y_weights: Array2<f64>,
    /// Singular values of the whitened cross-covariance, descending.
    pub singular_values: Vec<f64>,
}

impl CanonicalPair {
    #[inline]
    pub fn n_components(&self) -> usize {
        self.xc.ncols()
    }

    /// Pearson correlation of each projection pair `(Xc[:, i], Yc[:, i])`.
    pub fn correlations(&self) -> Vec<f64> {
        (0..self.n_components())
            .map(|i| pearson(self.xc.column(i), self.yc.column(i)))
            .collect()
    }
}

/// Pearson correlation; NaN when either side has zero variance.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return f64::NAN;
    }
    let ma = a.iter().take(n).sum::<f64>() / n as f64;
    let mb = b.iter().take(n).sum::<f64>() / n as f64;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()).take(n) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa == 0.0 || sbb == 0.0 {
        return f64::NAN;
    }
    (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// `C^{-1/2}` of a symmetric positive-definite matrix.
fn inv_sqrt(c: &Array2<f64>, side: char) -> Result<DMatrix<f64>, FitError> {
    let eig = SymmetricEigen::new(to_dmatrix(c));
    let max = eig.eigenvalues.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) || eig.eigenvalues.iter().any(|&l| l <= RANK_TOL * max) {
        return Err(FitError::SingularCovariance { side });
    }
    let d = DMatrix::from_diagonal(&eig.eigenvalues.map(|l| 1.0 / l.sqrt()));
    Ok(&eig.eigenvectors * d * eig.eigenvectors.transpose())
}

fn standardise(m: ArrayView2<f64>, side: char) -> Result<Array2<f64>, FitError> {
    let mut s = m.to_owned();
    let scale = zscore_columns_inplace(&mut s, 1);
    if let Some(index) = scale.first_constant(FLAT_TOL) {
        return Err(FitError::ConstantChannel { side, index });
    }
    Ok(s)
}

/// Fit a `k`-component CCA on `x` (`[n, p]`) and `y` (`[n, q]`) and project
/// both onto the canonical axes.
pub fn fit_transform(
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    k: usize,
) -> Result<CanonicalPair, FitError> {
    let (n, p) = x.dim();
    let (ny, q) = y.dim();
    if n != ny {
        return Err(FitError::DimensionMismatch { x_rows: n, y_rows: ny });
    }
    let max = p.min(q);
    if k == 0 || k > max {
        return Err(FitError::TooManyComponents { requested: k, max });
    }
    if n < p + q {
        return Err(FitError::TooFewSamples { n_samples: n, n_features: p + q });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let xs = standardise(x, 'X')?;
    let ys = standardise(y, 'Y')?;

    let denom = (n - 1) as f64;
    let cxx = xs.t().dot(&xs) / denom;
    let cyy = ys.t().dot(&ys) / denom;
    let cxy = xs.t().dot(&ys) / denom;

    let wx = inv_sqrt(&cxx, 'X')?;
    let wy = inv_sqrt(&cyy, 'Y')?;
    let m = &wx * to_dmatrix(&cxy) * &wy;

    let svd = m.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(FitError::SingularCovariance { side: 'M' }),
    };
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    order.truncate(k);

    let mut a = Array2::<f64>::zeros((p, k));
    let mut b = Array2::<f64>::zeros((q, k));
    for (col, &i) in order.iter().enumerate() {
        let ai = &wx * u.column(i);
        let bi = &wy * v_t.row(i).transpose();
        let pivot = ai.iter().cloned().fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for r in 0..p {
            a[[r, col]] = sign * ai[r];
        }
        for r in 0..q {
            b[[r, col]] = sign * bi[r];
        }
    }

    Ok(CanonicalPair {
        xc: xs.dot(&a),
        yc: ys.dot(&b),
        x_weights: a,
        y_weights: b,
        singular_values: order.iter().map(|&i| svd.singular_values[i]).collect(),
    })
}
