//! Optional pre-filtering of a channel group before windowed CCA.
//!
//! For one `[C, T]` group:
//!
//! 1. Notch at `line_hz` (band-stop `line_hz ± 1 Hz`, 1 Hz transitions), and
//!    at `2·line_hz` and `3·line_hz` when `harmonics` is on and the harmonic
//!    (plus its upper edge) stays below Nyquist.
//! 2. Band-pass `[hp, lp]`, or high-pass / low-pass alone when only one edge is
//!    configured. No edges → no band filter.
//!
//! Filtering is zero-phase and runs over the whole recording once, so window
//! boundaries never see a filter transient of their own.
use anyhow::{Context, Result};
use ndarray::Array2;

use crate::config::{BandConfig, PreprocessConfig};
use crate::filter::{
    apply_fir_zero_phase, design_bandpass, design_bandstop, design_highpass, design_lowpass,
};

/// Half-width of each notch in Hz.
pub const NOTCH_HALF_WIDTH: f64 = 1.0;

/// Notch centres actually applied at `sfreq`.
pub fn notch_frequencies(line_hz: f64, harmonics: bool, sfreq: f64) -> Vec<f64> {
    let nyq = sfreq / 2.0;
    let n = if harmonics { 3 } else { 1 };
    (1..=n)
        .map(|k| k as f64 * line_hz)
        .filter(|f| f + NOTCH_HALF_WIDTH + 0.5 < nyq)
        .collect()
}

/// Filter one channel group in place.
pub fn prefilter(
    data: &mut Array2<f64>,
    band: BandConfig,
    line_hz: Option<f64>,
    harmonics: bool,
    sfreq: f64,
) -> Result<()> {
    if let Some(line) = line_hz {
        for f in notch_frequencies(line, harmonics, sfreq) {
            let h = design_bandstop(f - NOTCH_HALF_WIDTH, f + NOTCH_HALF_WIDTH, 1.0, sfreq)
                .with_context(|| format!("notch at {f} Hz"))?;
            apply_fir_zero_phase(data, &h)?;
        }
    }

    let h = match (band.hp, band.lp) {
        (Some(hp), Some(lp)) => Some(design_bandpass(hp, lp, sfreq)),
        (Some(hp), None) => Some(design_highpass(hp, sfreq)),
        (None, Some(lp)) => Some(design_lowpass(lp, sfreq)),
        (None, None) => None,
    };
    if let Some(h) = h {
        let h = h.with_context(|| format!("band {:?}–{:?} Hz at {sfreq} Hz", band.hp, band.lp))?;
        apply_fir_zero_phase(data, &h)?;
    }
    Ok(())
}

/// Apply the configured pre-filter to both groups. Disabled → no-op.
pub fn prefilter_groups(
    eeg: &mut Array2<f64>,
    eog: &mut Array2<f64>,
    cfg: &PreprocessConfig,
    sfreq: f64,
) -> Result<()> {
    if !cfg.enabled {
        return Ok(());
    }
    prefilter(eeg, cfg.eeg, cfg.line_hz, cfg.harmonics, sfreq).context("EEG pre-filter")?;
    prefilter(eog, cfg.eog, cfg.line_hz, cfg.harmonics, sfreq).context("EOG pre-filter")?;
    tracing::debug!(sfreq, line_hz = ?cfg.line_hz, "pre-filter applied");
    Ok(())
}
