//! Descriptive statistics over `&[f64]`.
//!
//! Conventions follow NumPy/SciPy defaults:
//! - `std(x, ddof)`: `sqrt(Σ(x − μ)² / (n − ddof))`
//! - `skewness`: biased `m3 / m2^1.5`
//! - `kurtosis`: Fisher (excess), biased `m4 / m2² − 3`
//! - `percentile`: linear interpolation between closest ranks
//!
//! Empty inputs (or `n <= ddof`) give NaN rather than panicking.
//!
//! Mean and std come from `statrs`; the higher moments, percentiles and the
//! histogram entropy are computed here.
use statrs::statistics::Statistics;

/// Bins of the correlation-entropy histogram.
pub const ENTROPY_BINS: usize = 20;

/// Added to every bin before normalising so `ln 0` never occurs.
pub const ENTROPY_EPS: f64 = 1e-12;

pub fn mean(x: &[f64]) -> f64 {
    x.mean()
}

pub fn std(x: &[f64], ddof: usize) -> f64 {
    let n = x.len();
    if n <= ddof {
        return f64::NAN;
    }
    match ddof {
        0 => x.population_std_dev(),
        1 => x.std_dev(),
        _ => (x.population_variance() * n as f64 / (n - ddof) as f64).sqrt(),
    }
}

/// Central moment of order `k`.
fn central_moment(x: &[f64], m: f64, k: i32) -> f64 {
    x.iter().map(|v| (v - m).powi(k)).sum::<f64>() / x.len() as f64
}

pub fn skewness(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let m = mean(x);
    let m2 = central_moment(x, m, 2);
    if m2 == 0.0 {
        return f64::NAN;
    }
    central_moment(x, m, 3) / m2.powf(1.5)
}

pub fn kurtosis(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let m = mean(x);
    let m2 = central_moment(x, m, 2);
    if m2 == 0.0 {
        return f64::NAN;
    }
    central_moment(x, m, 4) / (m2 * m2) - 3.0
}

/// `q`-th percentile (`q` in `[0, 100]`), linear interpolation.
pub fn percentile(x: &[f64], q: f64) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, q)
}

/// [`percentile`] on already sorted data.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Shannon entropy (natural log) of the 20-bin histogram of `x` over `[0, 1]`.
///
/// Values outside `[0, 1]` and NaNs are ignored; the last bin is closed.
/// Every bin gets [`ENTROPY_EPS`] added before normalising, so the result lies
/// in `[0, ln 20]`. NaN when no value falls in range.
pub fn histogram_entropy(x: &[f64]) -> f64 {
    let mut counts = [0.0_f64; ENTROPY_BINS];
    let mut n_in = 0usize;
    for &v in x {
        if !(0.0..=1.0).contains(&v) {
            continue;
        }
        let bin = ((v * ENTROPY_BINS as f64) as usize).min(ENTROPY_BINS - 1);
        counts[bin] += 1.0;
        n_in += 1;
    }
    if n_in == 0 {
        return f64::NAN;
    }
    let total: f64 = counts.iter().map(|c| c + ENTROPY_EPS).sum();
    -counts
        .iter()
        .map(|c| {
            let p = (c + ENTROPY_EPS) / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Mean, std, skewness, kurtosis and count in one pass over a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub count: usize,
}

impl Moments {
    pub fn of(x: &[f64], ddof: usize) -> Self {
        Self {
            mean: mean(x),
            std: std(x, ddof),
            skewness: skewness(x),
            kurtosis: kurtosis(x),
            count: x.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn std_ddof() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(std(&x, 0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(std(&x, 1), (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(std(&x, 2), (32.0_f64 / 6.0).sqrt(), epsilon = 1e-12);
        assert!(std(&[1.0], 1).is_nan());
        assert_abs_diff_eq!(mean(&x), 5.0, epsilon = 1e-12);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn percentiles_interpolate() {
        let x = [4.0, 1.0, 3.0, 2.0];
        assert_abs_diff_eq!(percentile(&x, 25.0), 1.75, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&x, 50.0), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile(&x, 100.0), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_data_has_zero_skew() {
        let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert_abs_diff_eq!(skewness(&x), 0.0, epsilon = 1e-12);
        // m2 = 2, m4 = 6.8 → 6.8 / 4 − 3
        assert_abs_diff_eq!(kurtosis(&x), -1.3, epsilon = 1e-12);
    }

    #[test]
    fn uniform_entropy_is_ln_20() {
        let x: Vec<f64> = (0..20).map(|i| (i as f64 + 0.5) / 20.0).collect();
        assert_abs_diff_eq!(histogram_entropy(&x), 20.0_f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn point_mass_entropy_near_zero() {
        let h = histogram_entropy(&[0.9; 50]);
        assert!(h >= 0.0 && h < 1e-9);
        assert_abs_diff_eq!(histogram_entropy(&[1.0, 1.0]), histogram_entropy(&[0.99, 0.99]), epsilon = 1e-12);
        assert!(histogram_entropy(&[-0.5, 1.5]).is_nan());
    }
}
