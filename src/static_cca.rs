//! Static mode: one CCA fit per sleep stage.
//!
//! For each stage, every sample span scored with that stage is concatenated
//! (in file order) into one EEG matrix and one EOG matrix, and a single
//! two-component CCA is fitted. Each fit yields
//!
//! - a [`StaticSummary`]: both canonical correlations plus mean, std
//!   (ddof = 0) and the 25th/50th/75th percentiles of every projection column;
//! - the projections decimated by `max(1, floor(sfreq / target_rate))`, for
//!   the distribution analysis.
use std::collections::BTreeMap;

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

use crate::cca::fit_transform;
use crate::config::N_COMPONENTS;
use crate::epoch::{Epoch, SampleSpan};
use crate::error::{Outcome, SkipTally};
use crate::stage::SleepStage;
use crate::stats::descriptive::{self, percentile_sorted};

/// Distribution of one canonical projection column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentStats {
    pub mean: f64,
    pub std: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
}

impl ComponentStats {
    pub fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: descriptive::mean(values),
            std: descriptive::std(values, 0),
            p25: percentile_sorted(&sorted, 25.0),
            median: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
        }
    }
}

/// One row of the static summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticSummary {
    pub subject: String,
    pub stage: SleepStage,
    /// Canonical correlation of each component pair.
    pub correlations: [f64; N_COMPONENTS],
    pub xc: [ComponentStats; N_COMPONENTS],
    pub yc: [ComponentStats; N_COMPONENTS],
}

/// A fitted stage: its summary and the decimated projections.
#[derive(Debug, Clone)]
pub struct StageProjection {
    pub summary: StaticSummary,
    /// `[n / factor, 2]`
    pub xc: Array2<f64>,
    /// `[n / factor, 2]`
    pub yc: Array2<f64>,
}

/// `max(1, floor(sfreq / target_rate))`.
pub fn decimation_factor(sfreq: f64, target_rate: f64) -> usize {
    ((sfreq / target_rate).floor() as usize).max(1)
}

/// Keep every `factor`-th row, starting at row 0. Matrices with at most
/// `factor` rows are returned whole.
pub fn decimate(m: &Array2<f64>, factor: usize) -> Array2<f64> {
    if m.nrows() > factor && factor > 1 {
        m.slice(s![..;factor, ..]).to_owned()
    } else {
        m.clone()
    }
}

/// Concatenate the spans of one group (`[C, T]`) into a `[n, C]` matrix.
pub fn gather(group: &Array2<f64>, spans: &[SampleSpan]) -> Array2<f64> {
    let views: Vec<ArrayView2<f64>> = spans
        .iter()
        .map(|sp| group.slice(s![.., sp.start..sp.stop]))
        .collect();
    match concatenate(Axis(1), &views) {
        Ok(m) => m.reversed_axes(),
        Err(_) => Array2::zeros((0, group.nrows())),
    }
}

/// Fit one stage on `[n, p]` EEG and `[n, q]` EOG samples.
///
/// Rows beyond the shorter of the two inputs are dropped.
pub fn fit_stage(
    subject: &str,
    stage: SleepStage,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    factor: usize,
) -> Outcome<StageProjection> {
    let n = x.nrows().min(y.nrows());
    let pair = fit_transform(x.slice(s![..n, ..]), y.slice(s![..n, ..]), N_COMPONENTS)?;
    let r = pair.correlations();

    let column_stats = |m: &Array2<f64>| -> [ComponentStats; N_COMPONENTS] {
        std::array::from_fn(|i| ComponentStats::of(&m.column(i).to_vec()))
    };
    let summary = StaticSummary {
        subject: subject.to_string(),
        stage,
        correlations: [r[0], r[1]],
        xc: column_stats(&pair.xc),
        yc: column_stats(&pair.yc),
    };
    Ok(StageProjection {
        summary,
        xc: decimate(&pair.xc, factor),
        yc: decimate(&pair.yc, factor),
    })
}

/// Run static mode on one recording.
///
/// `eeg`/`eog` are `[C, T]` at `sfreq`. Epochs whose sample span is invalid
/// are skipped; stages without any valid span are not fitted. Results come
/// back in stage order.
pub fn run_subject(
    subject: &str,
    eeg: &Array2<f64>,
    eog: &Array2<f64>,
    sfreq: f64,
    epochs: &[Epoch],
    stages: &[SleepStage],
    target_rate: f64,
) -> (Vec<StageProjection>, SkipTally) {
    let total = eeg.ncols().min(eog.ncols());
    let mut tally = SkipTally::new();

    let mut spans: BTreeMap<SleepStage, Vec<SampleSpan>> = BTreeMap::new();
    for epoch in epochs.iter().filter(|e| stages.contains(&e.stage)) {
        match epoch.to_sample_span(sfreq, total) {
            Ok(sp) => spans.entry(epoch.stage).or_default().push(sp),
            Err(reason) => {
                tracing::warn!(subject = subject, stage = %epoch.stage, start_sec = epoch.start_sec, "{reason}");
                tally.skip(&reason);
            }
        }
    }

    let factor = decimation_factor(sfreq, target_rate);
    let mut out = Vec::new();
    for &stage in stages {
        let Some(stage_spans) = spans.get(&stage) else {
            tracing::info!(subject = subject, stage = %stage, "no data for stage; not fitted");
            continue;
        };
        let x = gather(eeg, stage_spans);
        let y = gather(eog, stage_spans);
        match fit_stage(subject, stage, x.view(), y.view(), factor) {
            Ok(p) => {
                tally.produced += 1;
                tracing::debug!(
                    subject = subject,
                    stage = %stage,
                    n_samples = x.nrows(),
                    r1 = p.summary.correlations[0],
                    r2 = p.summary.correlations[1],
                    "stage fitted"
                );
                out.push(p);
            }
            Err(reason) => {
                tracing::warn!(subject = subject, stage = %stage, n_samples = x.nrows(), "CCA skipped: {reason}");
                tally.skip(&reason);
            }
        }
    }
    (out, tally)
}
