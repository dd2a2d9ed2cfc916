//! Clock-time annotations → recording-relative epochs → sample spans.
//!
//! Resolution rules for an annotation against the recording start `t0`:
//!
//! 1. Combine both clock times with the calendar date of `t0`.
//! 2. `stop < start`: the interval crosses midnight, so `stop += 24 h`.
//! 3. `start < t0`: the interval belongs to the day after `t0`'s date, so
//!    `start += 24 h` and `stop += 24 h`.
//! 4. Offsets are seconds since `t0`; intervals with `stop <= start` are
//!    rejected.
//!
//! Sample mapping rounds `seconds × sfreq` to the nearest integer (ties to
//! even), clips the stop to the recording length and rejects empty spans.
use chrono::{Duration, NaiveDateTime};

use crate::annotation::StageAnnotation;
use crate::error::{Outcome, SkipReason};
use crate::stage::SleepStage;

/// A stage interval in seconds relative to the recording start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    pub stage: SleepStage,
    pub start_sec: f64,
    pub stop_sec: f64,
}

/// Half-open sample range `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    pub start: usize,
    pub stop: usize,
}

impl SampleSpan {
    #[inline]
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let d = to - from;
    match d.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}

impl Epoch {
    /// Resolve a clock-time annotation against the recording start.
    pub fn resolve(annotation: &StageAnnotation, recording_start: NaiveDateTime) -> Outcome<Epoch> {
        let date = recording_start.date();
        let mut start = date.and_time(annotation.start);
        let mut stop = date.and_time(annotation.stop);

        if stop < start {
            stop += Duration::days(1);
        }
        if start < recording_start {
            start += Duration::days(1);
            stop += Duration::days(1);
        }

        let epoch = Epoch {
            stage: annotation.stage,
            start_sec: seconds_between(recording_start, start),
            stop_sec: seconds_between(recording_start, stop),
        };
        if epoch.stop_sec <= epoch.start_sec {
            return Err(SkipReason::DegenerateEpoch {
                stage: epoch.stage,
                start_sec: epoch.start_sec,
                stop_sec: epoch.stop_sec,
            });
        }
        Ok(epoch)
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.stop_sec - self.start_sec
    }

    /// Map to a sample span of a recording with `total` samples at `sfreq` Hz.
    pub fn to_sample_span(&self, sfreq: f64, total: usize) -> Outcome<SampleSpan> {
        let start = seconds_to_sample(self.start_sec, sfreq);
        let stop = seconds_to_sample(self.stop_sec, sfreq).min(total as i64);
        if start < 0 || start >= stop {
            return Err(SkipReason::SampleRangeInvalid { stage: self.stage, start, stop, total });
        }
        Ok(SampleSpan { start: start as usize, stop: stop as usize })
    }
}

/// `round(seconds × sfreq)` with ties to even.
#[inline]
pub fn seconds_to_sample(seconds: f64, sfreq: f64) -> i64 {
    (seconds * sfreq).round_ties_even() as i64
}

/// Resolve every annotation, keeping the per-row outcome.
pub fn resolve_epochs(
    annotations: &[StageAnnotation],
    recording_start: NaiveDateTime,
) -> Vec<Outcome<Epoch>> {
    annotations
        .iter()
        .map(|a| Epoch::resolve(a, recording_start))
        .collect()
}

/// Number of windows of length `window` stepped by `step` that fit inside a
/// span of `duration` seconds: `floor((duration - window) / step) + 1`, or 0.
pub fn window_count(duration: f64, window: f64, step: f64) -> usize {
    if duration < window || step <= 0.0 {
        return 0;
    }
    // Small slack so that e.g. (90 - 30) / 15 lands on 4.0, not 3.999….
    ((duration - window) / step + 1e-9).floor() as usize + 1
}

/// Window start times (seconds since recording start) for one epoch.
///
/// Starts are computed as `start + i·step` rather than by accumulation, so the
/// last window never drifts past the epoch end.
pub fn window_starts(epoch: &Epoch, window: f64, step: f64) -> impl Iterator<Item = f64> + '_ {
    let n = window_count(epoch.duration(), window, step);
    (0..n).map(move |i| epoch.start_sec + i as f64 * step)
}
