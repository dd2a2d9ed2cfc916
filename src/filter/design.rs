//! FIR filter design matching MNE / `scipy.signal.firwin`.
//!
//! All kernels are Hamming-windowed sincs of odd length (linear phase):
//!   • high-pass edge `l`:  trans = min(max(0.25·l, 2), l)
//!   • low-pass edge `h`:   trans = min(max(0.25·h, 2), nyq − h)
//!   • length N = ceil(3.3 / trans · sfreq), rounded up to odd; multi-edge
//!     kernels take the longest edge requirement
//!   • the firwin cutoff of each edge sits mid-transition
use std::f64::consts::PI;

use anyhow::{bail, Result};

/// MNE transition bandwidth for a high-pass edge at `l_freq`.
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// MNE transition bandwidth for a low-pass edge at `h_freq`.
pub fn auto_trans_bandwidth_low(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Number of FIR taps for a given transition bandwidth.
/// Returns an odd integer (required for zero-phase linear-phase FIR).
///
/// Formula: `ceil(3.3 / trans_bw * sfreq)` rounded up to odd.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n_raw = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n_raw % 2 == 0 { n_raw + 1 } else { n_raw }
}

fn check_edge(f: f64, sfreq: f64, what: &str) -> Result<()> {
    if !(f > 0.0 && f < sfreq / 2.0) {
        bail!("{what} edge {f} Hz must lie in (0, {}) Hz", sfreq / 2.0);
    }
    Ok(())
}

/// Zero-phase high-pass kernel.
///
/// Matches `mne.filter.create_filter(None, sfreq, l_freq=l_freq, h_freq=None,
///   fir_window='hamming', fir_design='firwin', phase='zero')`.
pub fn design_highpass(l_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge(l_freq, sfreq, "high-pass")?;
    let trans_bw = auto_trans_bandwidth(l_freq);
    let n = auto_filter_length(trans_bw, sfreq);
    Ok(firwin(n, l_freq - trans_bw / 2.0, sfreq, false))
}

/// Zero-phase low-pass kernel.
pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge(h_freq, sfreq, "low-pass")?;
    let trans_bw = auto_trans_bandwidth_low(h_freq, sfreq);
    let n = auto_filter_length(trans_bw, sfreq);
    Ok(firwin(n, h_freq + trans_bw / 2.0, sfreq, true))
}

/// Zero-phase band-pass kernel passing `[l_freq, h_freq]`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge(l_freq, sfreq, "high-pass")?;
    check_edge(h_freq, sfreq, "low-pass")?;
    if l_freq >= h_freq {
        bail!("band-pass edges inverted: {l_freq} Hz >= {h_freq} Hz");
    }
    let l_trans = auto_trans_bandwidth(l_freq);
    let h_trans = auto_trans_bandwidth_low(h_freq, sfreq);
    let n = auto_filter_length(l_trans.min(h_trans), sfreq);
    let lo = firwin(n, l_freq - l_trans / 2.0, sfreq, true);
    let hi = firwin(n, h_freq + h_trans / 2.0, sfreq, true);
    Ok(hi.iter().zip(&lo).map(|(h, l)| h - l).collect())
}

/// Zero-phase band-stop kernel rejecting `[l_freq, h_freq]` with a fixed
/// transition bandwidth on both edges (MNE's notch uses 1 Hz).
pub fn design_bandstop(l_freq: f64, h_freq: f64, trans_bw: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_edge(l_freq, sfreq, "band-stop lower")?;
    check_edge(h_freq, sfreq, "band-stop upper")?;
    if l_freq >= h_freq {
        bail!("band-stop edges inverted: {l_freq} Hz >= {h_freq} Hz");
    }
    let n = auto_filter_length(trans_bw, sfreq);
    let lo = firwin(n, l_freq - trans_bw / 2.0, sfreq, true);
    let hi = firwin(n, h_freq + trans_bw / 2.0, sfreq, true);
    // delta − (hi − lo)
    let mut h: Vec<f64> = lo.iter().zip(&hi).map(|(l, h)| l - h).collect();
    h[n / 2] += 1.0;
    Ok(h)
}

/// Hamming-windowed sinc with a single cutoff.
///
/// `pass_zero = true` gives a low-pass with unit DC gain; `false` gives the
/// spectrally inverted high-pass. `cutoff_hz` is the −6 dB point.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N for linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);

    let win = hamming(n);
    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            // sin(π·fc·x) / (π·x) → fc as x → 0
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the kernel's frequency response at `f` Hz.
pub fn gain_at(h: &[f64], f: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * f / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &v)| {
        (re + v * (w * k as f64).cos(), im - v * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_length_is_odd() {
        for l_freq in [0.3, 0.5, 1.0, 2.0, 5.0] {
            let n = auto_filter_length(auto_trans_bandwidth(l_freq), 256.0);
            assert!(n % 2 == 1, "N={n} is even for l_freq={l_freq}");
        }
    }

    #[test]
    fn highpass_sum_near_zero() {
        let h = design_highpass(0.5, 256.0).unwrap();
        let s: f64 = h.iter().sum();
        assert!(s.abs() < 1e-9, "highpass sum = {s}");
    }

    #[test]
    fn highpass_known_length_256hz() {
        // At 256 Hz / 0.5 Hz MNE produces 1691 taps.
        assert_eq!(design_highpass(0.5, 256.0).unwrap().len(), 1691);
    }

    #[test]
    fn kernels_are_symmetric() {
        for h in [
            design_lowpass(35.0, 256.0).unwrap(),
            design_bandpass(0.5, 35.0, 256.0).unwrap(),
            design_bandstop(49.0, 51.0, 1.0, 256.0).unwrap(),
        ] {
            let n = h.len();
            for i in 0..n / 2 {
                approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn lowpass_passes_dc_and_blocks_high() {
        let h = design_lowpass(10.0, 128.0).unwrap();
        approx::assert_abs_diff_eq!(gain_at(&h, 0.0, 128.0), 1.0, epsilon = 1e-9);
        assert!(gain_at(&h, 30.0, 128.0) < 1e-2);
    }

    #[test]
    fn bandpass_shape() {
        let h = design_bandpass(1.0, 20.0, 128.0).unwrap();
        assert!(gain_at(&h, 0.0, 128.0) < 1e-6);
        approx::assert_abs_diff_eq!(gain_at(&h, 8.0, 128.0), 1.0, epsilon = 1e-2);
        assert!(gain_at(&h, 40.0, 128.0) < 1e-2);
    }

    #[test]
    fn bandstop_notches_line_frequency() {
        let h = design_bandstop(49.0, 51.0, 1.0, 250.0).unwrap();
        assert!(gain_at(&h, 50.0, 250.0) < 1e-2);
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, 250.0), 1.0, epsilon = 1e-2);
    }

    #[test]
    fn edges_above_nyquist_rejected() {
        assert!(design_lowpass(70.0, 128.0).is_err());
        assert!(design_bandpass(20.0, 10.0, 128.0).is_err());
        assert!(design_highpass(0.0, 128.0).is_err());
    }
}
