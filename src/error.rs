//! Per-unit skip reasons and their batch-level tally.
//!
//! Nothing below the file level aborts the pipeline. Every unit of work (an
//! annotation row, an epoch, a stage fit, a window fit, a statistical test)
//! yields an [`Outcome`]: the record it produced or the reason it was skipped.
//! Callers fold outcomes into a [`SkipTally`] and log one summary line per
//! subject instead of scattering warnings through the numeric code.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::cca::FitError;
use crate::stage::SleepStage;

/// Why one unit of work produced no record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("no companion annotation file {}", .0.display())]
    MissingCompanionFile(PathBuf),

    #[error("annotation line {line}: {reason}")]
    AnnotationParse { line: usize, reason: String },

    #[error("annotation line {line}: {label:?} is not a configured sleep stage")]
    UnknownStage { line: usize, label: String },

    #[error("{stage} epoch resolves to [{start_sec}, {stop_sec}) s")]
    DegenerateEpoch { stage: SleepStage, start_sec: f64, stop_sec: f64 },

    #[error("{stage} sample range [{start}, {stop}) invalid for {total} samples")]
    SampleRangeInvalid { stage: SleepStage, start: i64, stop: i64, total: usize },

    #[error("CCA fit failed: {0}")]
    FitFailure(#[from] FitError),

    #[error("{test} needs at least {needed} observations, got {got}")]
    InsufficientData { test: &'static str, needed: usize, got: usize },

    #[error("{test} failed: {reason}")]
    StatTestFailed { test: &'static str, reason: String },
}

impl SkipReason {
    /// Stable short name used as the tally key.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::MissingCompanionFile(_) => "missing_companion_file",
            SkipReason::AnnotationParse { .. } => "annotation_parse",
            SkipReason::UnknownStage { .. } => "unknown_stage",
            SkipReason::DegenerateEpoch { .. } => "degenerate_epoch",
            SkipReason::SampleRangeInvalid { .. } => "sample_range_invalid",
            SkipReason::FitFailure(_) => "fit_failure",
            SkipReason::InsufficientData { .. } => "insufficient_data",
            SkipReason::StatTestFailed { .. } => "stat_test_failed",
        }
    }
}

/// Result of one unit of work.
pub type Outcome<T> = Result<T, SkipReason>;

/// Counts of produced records and skipped units, keyed by [`SkipReason::kind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkipTally {
    pub produced: usize,
    pub skipped: BTreeMap<&'static str, usize>,
}

impl SkipTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome, passing the value through.
    pub fn record<T>(&mut self, outcome: Outcome<T>) -> Option<T> {
        match outcome {
            Ok(v) => {
                self.produced += 1;
                Some(v)
            }
            Err(reason) => {
                self.skip(&reason);
                None
            }
        }
    }

    pub fn skip(&mut self, reason: &SkipReason) {
        *self.skipped.entry(reason.kind()).or_insert(0) += 1;
    }

    pub fn n_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn merge(&mut self, other: &SkipTally) {
        self.produced += other.produced;
        for (k, n) in &other.skipped {
            *self.skipped.entry(*k).or_insert(0) += n;
        }
    }

    /// Fold a sequence of outcomes into the produced values and their tally.
    pub fn collect<T, I>(outcomes: I) -> (Vec<T>, SkipTally)
    where
        I: IntoIterator<Item = Outcome<T>>,
    {
        let mut tally = SkipTally::new();
        let values = outcomes
            .into_iter()
            .filter_map(|o| tally.record(o))
            .collect();
        (values, tally)
    }

    /// One summary line: `"<unit>: N produced, M skipped (reasons)"`.
    pub fn log_summary(&self, subject: &str, unit: &str) {
        if self.n_skipped() == 0 {
            tracing::info!(subject = subject, "{unit}: {} produced", self.produced);
        } else {
            tracing::warn!(subject = subject, "{unit}: {self}");
        }
    }
}

impl fmt::Display for SkipTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} produced, {} skipped", self.produced, self.n_skipped())?;
        if !self.skipped.is_empty() {
            let reasons: Vec<String> = self
                .skipped
                .iter()
                .map(|(k, n)| format!("{k}={n}"))
                .collect();
            write!(f, " (reasons: {})", reasons.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_counts_each_kind() {
        let outcomes: Vec<Outcome<u32>> = vec![
            Ok(1),
            Err(SkipReason::FitFailure(FitError::TooFewSamples { n_samples: 3, n_features: 6 })),
            Ok(2),
            Err(SkipReason::FitFailure(FitError::NonFinite)),
            Err(SkipReason::InsufficientData { test: "adf", needed: 10, got: 4 }),
        ];
        let (values, tally) = SkipTally::collect(outcomes);
        assert_eq!(values, vec![1, 2]);
        assert_eq!(tally.produced, 2);
        assert_eq!(tally.skipped["fit_failure"], 2);
        assert_eq!(tally.skipped["insufficient_data"], 1);
        assert_eq!(tally.n_skipped(), 3);
    }

    #[test]
    fn display_lists_reasons() {
        let mut tally = SkipTally::new();
        tally.record::<()>(Ok(()));
        tally.skip(&SkipReason::AnnotationParse { line: 4, reason: "bad time".into() });
        assert_eq!(tally.to_string(), "1 produced, 1 skipped (reasons: annotation_parse=1)");
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = SkipTally::new();
        a.record::<()>(Ok(()));
        a.skip(&SkipReason::FitFailure(FitError::NonFinite));
        let mut b = SkipTally::new();
        b.skip(&SkipReason::FitFailure(FitError::NonFinite));
        a.merge(&b);
        assert_eq!(a.produced, 1);
        assert_eq!(a.skipped["fit_failure"], 2);
    }
}
