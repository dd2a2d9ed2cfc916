//! Gaussian kernel density estimate with Scott's bandwidth.
//!
//! `h = σ · n^(−1/5)` with σ the sample std (ddof = 1), and
//! `f(x) = 1/(n·h·√(2π)) · Σ exp(−((x − xᵢ)/h)² / 2)`.
use std::f64::consts::PI;

use super::descriptive::std;

/// Scott's rule bandwidth. `None` for fewer than two finite values or a
/// constant sample.
pub fn scott_bandwidth(x: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 {
        return None;
    }
    let h = std(x, 1) * (n as f64).powf(-0.2);
    (h.is_finite() && h > 0.0).then_some(h)
}

/// A fitted one-dimensional KDE.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    points: Vec<f64>,
    pub bandwidth: f64,
}

impl GaussianKde {
    /// Fit on the finite entries of `x`.
    pub fn fit(x: &[f64]) -> Option<Self> {
        let points: Vec<f64> = x.iter().copied().filter(|v| v.is_finite()).collect();
        let bandwidth = scott_bandwidth(&points)?;
        Some(Self { points, bandwidth })
    }

    pub fn density(&self, at: f64) -> f64 {
        let h = self.bandwidth;
        let norm = 1.0 / (self.points.len() as f64 * h * (2.0 * PI).sqrt());
        norm * self.points.iter().map(|p| (-0.5 * ((at - p) / h).powi(2)).exp()).sum::<f64>()
    }

    /// Density on `n` evenly spaced points covering `lo..=hi`.
    pub fn evaluate(&self, lo: f64, hi: f64, n: usize) -> Vec<(f64, f64)> {
        let step = if n > 1 { (hi - lo) / (n - 1) as f64 } else { 0.0 };
        (0..n)
            .map(|i| {
                let x = lo + i as f64 * step;
                (x, self.density(x))
            })
            .collect()
    }

    /// `min − 3h ..= max + 3h`, where nearly all of the mass lies.
    pub fn support(&self) -> (f64, f64) {
        let lo = self.points.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = self.points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (lo - 3.0 * self.bandwidth, hi + 3.0 * self.bandwidth)
    }
}
