//! Time-resolved mode: a fresh CCA fit per sliding window.
//!
//! Inside every epoch, windows of `window_length` seconds start at
//! `epoch.start + i·step_length` for `i = 0..window_count(..)`. Each window
//! maps to samples `[round(t·sfreq), round((t + W)·sfreq))`; a window reaching
//! outside the recording is skipped and the next one is still tried. Each
//! fitted window yields one [`TimeResolvedSample`].
//!
//! The optional pre-filter runs on the whole recording before this step (see
//! [`crate::preprocess`]); windows are never filtered on their own.
use std::collections::BTreeMap;

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::cca::{fit_transform, FitError};
use crate::config::N_COMPONENTS;
use crate::epoch::{seconds_to_sample, window_starts, Epoch, SampleSpan};
use crate::error::{Outcome, SkipReason, SkipTally};
use crate::stage::SleepStage;

/// One row of a `<subject>_<stage>_cca_timeseries.csv` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeResolvedSample {
    /// Window start, seconds since recording start.
    pub time_sec: f64,
    pub cca_corr1: f64,
    pub cca_corr2: f64,
    pub subject: String,
    pub stage: SleepStage,
}

/// Sliding-window geometry in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub length: f64,
    pub step: f64,
}

/// Sample span of the window starting at `t` seconds.
pub fn window_span(stage: SleepStage, t: f64, window: WindowSpec, sfreq: f64, total: usize) -> Outcome<SampleSpan> {
    let start = seconds_to_sample(t, sfreq);
    let stop = seconds_to_sample(t + window.length, sfreq);
    if start < 0 || stop > total as i64 || start >= stop {
        return Err(SkipReason::SampleRangeInvalid { stage, start, stop, total });
    }
    Ok(SampleSpan { start: start as usize, stop: stop as usize })
}

/// Canonical correlations of one window of `[C, T]` groups.
pub fn fit_window(
    eeg: &Array2<f64>,
    eog: &Array2<f64>,
    span: SampleSpan,
) -> Result<[f64; N_COMPONENTS], FitError> {
    let x = eeg.slice(s![.., span.start..span.stop]);
    let y = eog.slice(s![.., span.start..span.stop]);
    let r = fit_transform(x.t(), y.t(), N_COMPONENTS)?.correlations();
    Ok([r[0], r[1]])
}

/// Run time-resolved mode on one recording.
///
/// Returns the window records grouped by stage (each group in epoch order,
/// then time order) and the tally of fitted/skipped windows.
pub fn run_subject(
    subject: &str,
    eeg: &Array2<f64>,
    eog: &Array2<f64>,
    sfreq: f64,
    epochs: &[Epoch],
    stages: &[SleepStage],
    window: WindowSpec,
) -> (BTreeMap<SleepStage, Vec<TimeResolvedSample>>, SkipTally) {
    let total = eeg.ncols().min(eog.ncols());
    let mut tally = SkipTally::new();
    let mut out: BTreeMap<SleepStage, Vec<TimeResolvedSample>> = BTreeMap::new();

    for epoch in epochs.iter().filter(|e| stages.contains(&e.stage)) {
        for t in window_starts(epoch, window.length, window.step) {
            let outcome = window_span(epoch.stage, t, window, sfreq, total).and_then(|span| {
                fit_window(eeg, eog, span).map_err(SkipReason::from)
            });
            match outcome {
                Ok([r1, r2]) => {
                    tally.produced += 1;
                    out.entry(epoch.stage).or_default().push(TimeResolvedSample {
                        time_sec: t,
                        cca_corr1: r1,
                        cca_corr2: r2,
                        subject: subject.to_string(),
                        stage: epoch.stage,
                    });
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::FitFailure(_) => tracing::warn!(
                            subject = subject,
                            stage = %epoch.stage,
                            time_sec = t,
                            "window CCA skipped: {reason}"
                        ),
                        _ => tracing::debug!(
                            subject = subject,
                            stage = %epoch.stage,
                            time_sec = t,
                            "window skipped: {reason}"
                        ),
                    }
                    tally.skip(&reason);
                }
            }
        }
    }
    (out, tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: WindowSpec = WindowSpec { length: 30.0, step: 15.0 };

    #[test]
    fn window_span_rounds_both_ends() {
        let sp = window_span(SleepStage::N2, 60.0, WINDOW, 100.0, 100_000).unwrap();
        assert_eq!(sp, SampleSpan { start: 6000, stop: 9000 });
        let sp = window_span(SleepStage::N2, 0.004, WindowSpec { length: 1.0, step: 1.0 }, 256.0, 1000).unwrap();
        assert_eq!(sp, SampleSpan { start: 1, stop: 257 });
    }

    #[test]
    fn window_past_end_is_skipped() {
        let r = window_span(SleepStage::R, 80.0, WINDOW, 100.0, 10_000);
        assert!(matches!(r, Err(SkipReason::SampleRangeInvalid { stop: 11_000, total: 10_000, .. })));
    }

    #[test]
    fn epochs_beyond_recording_skip_windows_but_not_the_rest() {
        // 100 s at 10 Hz; epoch covers 60..120 s, so only windows fully inside survive.
        let n = 1000;
        let eeg = Array2::from_shape_fn((2, n), |(c, t)| ((t * (c + 3)) as f64 * 0.37).sin());
        let eog = Array2::from_shape_fn((2, n), |(c, t)| ((t * (c + 5)) as f64 * 0.11).cos() + eeg[[0, t]]);
        let epoch = Epoch { stage: SleepStage::N3, start_sec: 60.0, stop_sec: 120.0 };
        let (by_stage, tally) = run_subject("s01", &eeg, &eog, 10.0, &[epoch], &SleepStage::ALL, WINDOW);

        let rows = &by_stage[&SleepStage::N3];
        let times: Vec<f64> = rows.iter().map(|r| r.time_sec).collect();
        assert_eq!(times, vec![60.0]);
        assert_eq!(tally.produced, 1);
        assert_eq!(tally.skipped["sample_range_invalid"], 2);
        assert!(rows[0].cca_corr1 >= rows[0].cca_corr2);
    }
}
