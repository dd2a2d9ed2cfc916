//! Unit-root and stationarity tests on a single series.
//!
//! ## ADF (augmented Dickey–Fuller, constant term)
//!
//! Regress `Δx_t` on `[x_{t−1}, Δx_{t−1}, …, Δx_{t−L}, 1]`. The statistic is
//! the t-value of `x_{t−1}`. `L` is chosen by AIC over `0..=maxlag` with
//! `maxlag = min(ceil(12·(n/100)^¼), n/2 − 2)`, every candidate fitted on the
//! same trimmed sample; the chosen lag is then refitted on the longest sample
//! it allows. p-values use MacKinnon's (1994, 2010) response-surface
//! approximation for one series with a constant.
//!
//! ## KPSS (level stationarity)
//!
//! `η = Σ S_t² / n²` over the partial sums of `x − x̄`, divided by the Bartlett
//! long-run variance with the Hobijn et al. (1998) automatic bandwidth. The
//! p-value is interpolated in the Kwiatkowski et al. (1992) table and clamped
//! to `[0.01, 0.10]`.
//!
//! ADF rejects a unit root when `p < 0.05`; KPSS fails to reject stationarity
//! when `p > 0.05`. The two nulls are opposite.
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

/// Shortest series either test accepts.
pub const MIN_OBSERVATIONS: usize = 10;

/// Significance level of both stationarity decisions.
pub const ALPHA: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StationarityError {
    #[error("series has {got} observations, need at least {needed}")]
    TooShort { needed: usize, got: usize },

    #[error("series contains NaN or infinite values")]
    NonFinite,

    #[error("{0}")]
    Degenerate(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub n_obs: usize,
}

impl AdfResult {
    /// Unit root rejected at [`ALPHA`].
    pub fn is_stationary(&self) -> bool {
        self.p_value < ALPHA
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpssResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lags: usize,
}

impl KpssResult {
    /// Level stationarity not rejected at [`ALPHA`].
    pub fn is_stationary(&self) -> bool {
        self.p_value > ALPHA
    }
}

fn check_input(x: &[f64]) -> Result<(), StationarityError> {
    if x.len() < MIN_OBSERVATIONS {
        return Err(StationarityError::TooShort { needed: MIN_OBSERVATIONS, got: x.len() });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(StationarityError::NonFinite);
    }
    Ok(())
}

// ── ADF ──────────────────────────────────────────────────────────────────────

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// MacKinnon approximate p-value of an ADF statistic (constant, one series).
pub fn mackinnon_p(tau: f64) -> f64 {
    if tau > TAU_MAX {
        return 1.0;
    }
    if tau < TAU_MIN {
        return 0.0;
    }
    let coef: &[f64] = if tau <= TAU_STAR { &TAU_SMALLP } else { &TAU_LARGEP };
    let z: f64 = coef.iter().enumerate().map(|(i, c)| c * tau.powi(i as i32)).sum();
    match Normal::new(0.0, 1.0) {
        Ok(n) => n.cdf(z),
        Err(_) => f64::NAN,
    }
}

struct OlsFit {
    t0: f64,
    aic: f64,
}

/// OLS of `Δx` on `[x_{t−1}, Δx_{t−1..t−lag}, 1]` over `Δx` indices
/// `start..dx.len()`.
fn adf_regression(x: &[f64], dx: &[f64], lag: usize, start: usize) -> Option<OlsFit> {
    let m = dx.len() - start;
    let k = lag + 2;
    if m <= k {
        return None;
    }
    let design = DMatrix::from_fn(m, k, |r, c| {
        let t = start + r;
        match c {
            0 => x[t],
            c if c == k - 1 => 1.0,
            c => dx[t - c],
        }
    });
    let y = DVector::from_fn(m, |r, _| dx[start + r]);

    let xtx = design.transpose() * &design;
    let inv = xtx.try_inverse()?;
    let beta = &inv * (design.transpose() * &y);
    let resid = &y - &design * &beta;
    let ssr = resid.dot(&resid);
    if !(ssr > 0.0) {
        return None;
    }
    let sigma2 = ssr / (m - k) as f64;
    let se0 = (sigma2 * inv[(0, 0)]).sqrt();
    let n = m as f64;
    let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / n).ln() + 1.0);
    Some(OlsFit { t0: beta[0] / se0, aic: -2.0 * llf + 2.0 * k as f64 })
}

/// Augmented Dickey–Fuller test with a constant and AIC lag selection.
pub fn adf(x: &[f64]) -> Result<AdfResult, StationarityError> {
    check_input(x)?;
    let n = x.len();
    let dx: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    let maxlag = ((12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize).min(n / 2 - 2);

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=maxlag {
        if let Some(fit) = adf_regression(x, &dx, lag, maxlag) {
            if best.map_or(true, |(aic, _)| fit.aic < aic) {
                best = Some((fit.aic, lag));
            }
        }
    }
    let (_, lag) = best.ok_or(StationarityError::Degenerate("ADF regression is singular"))?;

    let fit = adf_regression(x, &dx, lag, lag)
        .ok_or(StationarityError::Degenerate("ADF regression is singular"))?;
    Ok(AdfResult {
        statistic: fit.t0,
        p_value: mackinnon_p(fit.t0),
        used_lag: lag,
        n_obs: dx.len() - lag,
    })
}

// ── KPSS ─────────────────────────────────────────────────────────────────────

const KPSS_CRIT: [f64; 4] = [0.347, 0.463, 0.574, 0.739];
const KPSS_PVALS: [f64; 4] = [0.10, 0.05, 0.025, 0.01];

/// `Σ r[i..]·r[..n−i]`
fn autocov_sum(r: &[f64], i: usize) -> f64 {
    r[i..].iter().zip(&r[..r.len() - i]).map(|(a, b)| a * b).sum()
}

/// Hobijn et al. automatic bandwidth.
fn kpss_autolag(r: &[f64]) -> Option<usize> {
    let n = r.len() as f64;
    let covlags = n.powf(2.0 / 9.0) as usize;
    let mut s0 = r.iter().map(|v| v * v).sum::<f64>() / n;
    let mut s1 = 0.0;
    for i in 1..=covlags {
        let prod = autocov_sum(r, i) / (n / 2.0);
        s0 += prod;
        s1 += i as f64 * prod;
    }
    if s0 == 0.0 {
        return None;
    }
    let s_hat = s1 / s0;
    let gamma = 1.1447 * (s_hat * s_hat).powf(1.0 / 3.0);
    let lags = gamma * n.powf(1.0 / 3.0);
    lags.is_finite().then_some(lags as usize)
}

/// Linear interpolation in the KPSS table, clamped at both ends.
fn kpss_p(stat: f64) -> f64 {
    if stat <= KPSS_CRIT[0] {
        return KPSS_PVALS[0];
    }
    if stat >= KPSS_CRIT[3] {
        return KPSS_PVALS[3];
    }
    let i = KPSS_CRIT.iter().rposition(|&c| c <= stat).unwrap_or(0);
    let f = (stat - KPSS_CRIT[i]) / (KPSS_CRIT[i + 1] - KPSS_CRIT[i]);
    KPSS_PVALS[i] + f * (KPSS_PVALS[i + 1] - KPSS_PVALS[i])
}

/// KPSS test for level stationarity with automatic lag selection.
pub fn kpss(x: &[f64]) -> Result<KpssResult, StationarityError> {
    check_input(x)?;
    let n = x.len();
    let mean = x.iter().sum::<f64>() / n as f64;
    let r: Vec<f64> = x.iter().map(|v| v - mean).collect();

    let lags = kpss_autolag(&r)
        .ok_or(StationarityError::Degenerate("KPSS: series is constant"))?
        .min(n - 1);

    let mut cum = 0.0;
    let eta = r
        .iter()
        .map(|v| {
            cum += v;
            cum * cum
        })
        .sum::<f64>()
        / (n * n) as f64;

    let mut s2 = r.iter().map(|v| v * v).sum::<f64>();
    for i in 1..=lags {
        s2 += 2.0 * autocov_sum(&r, i) * (1.0 - i as f64 / (lags as f64 + 1.0));
    }
    s2 /= n as f64;
    if !(s2 > 0.0) {
        return Err(StationarityError::Degenerate("KPSS: long-run variance is not positive"));
    }

    let statistic = eta / s2;
    Ok(KpssResult { statistic, p_value: kpss_p(statistic), lags })
}
