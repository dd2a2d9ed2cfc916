//! Analysis of the time-resolved outputs.
//!
//! Every table is computed from the pooled `*_cca_timeseries.csv` rows:
//! stage summaries, time-binned mean trajectories, per subject×stage
//! entropy and moments, a seeded subject subset, an ANOVA across stages and
//! ADF/KPSS stationarity of each subject×stage×component series.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{AnovaRow, CorrelationSummaryRow, StageCorrelations};
use crate::config::TimeCcaConfig;
use crate::error::{SkipReason, SkipTally};
use crate::io;
use crate::stage::SleepStage;
use crate::stats::stationarity::MIN_OBSERVATIONS;
use crate::stats::{adf, descriptive, histogram_entropy, kpss, StationarityError};
use crate::time_resolved::TimeResolvedSample;

pub const STAGEWISE_SUMMARY_FILE: &str = "stagewise_summary.csv";
pub const TRAJECTORY_FILE: &str = "mean_cca_trajectory_by_stage.csv";
pub const ENTROPY_FILE: &str = "entropy_by_subject_stage.csv";
pub const SUBSET_FILE: &str = "subset_trajectories.csv";
pub const ANOVA_FILE: &str = "time_anova.csv";
pub const STATIONARITY_FILE: &str = "stationarity_results.csv";

/// Mean correlations of one stage within one time bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub stage: SleepStage,
    /// Inclusive, seconds.
    pub bin_start: f64,
    /// Exclusive, seconds.
    pub bin_end: f64,
    pub cca_corr1: f64,
    pub cca_corr2: f64,
}

/// Entropy and moments of one subject×stage series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyRow {
    pub subject: String,
    pub stage: SleepStage,
    pub cca_corr1_entropy: f64,
    pub cca_corr1_mean: f64,
    pub cca_corr1_std: f64,
    pub cca_corr1_skew: f64,
    pub cca_corr1_kurtosis: f64,
    pub cca_corr2_entropy: f64,
    pub cca_corr2_mean: f64,
    pub cca_corr2_std: f64,
    pub cca_corr2_skew: f64,
    pub cca_corr2_kurtosis: f64,
}

/// ADF/KPSS outcome for one subject×stage×component series.
///
/// A test that failed to run leaves its p-value empty and its flag false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityRow {
    pub subject: String,
    pub stage: SleepStage,
    /// `cca_corr1` or `cca_corr2`.
    pub component: String,
    pub adf_pval: Option<f64>,
    pub adf_stationary: bool,
    pub kpss_pval: Option<f64>,
    pub kpss_stationary: bool,
}

/// Everything the time-resolved analysis produces.
#[derive(Debug, Clone, Default)]
pub struct TimeAnalysis {
    pub stagewise_summary: Vec<CorrelationSummaryRow>,
    pub trajectories: Vec<TrajectoryRow>,
    pub entropy: Vec<EntropyRow>,
    pub subset: Vec<TimeResolvedSample>,
    pub anova: Vec<AnovaRow>,
    pub stationarity: Vec<StationarityRow>,
    pub tests: SkipTally,
}

/// Index of the half-open bin `[k·width, (k+1)·width)` holding `t`.
pub fn time_bin(t: f64, width: f64) -> i64 {
    (t / width).floor() as i64
}

/// Mean correlations per stage and time bin, in stage then bin order.
pub fn mean_trajectories(rows: &[TimeResolvedSample], width: f64) -> Vec<TrajectoryRow> {
    let mut acc: BTreeMap<(SleepStage, i64), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in rows {
        let (c1, c2) = acc.entry((r.stage, time_bin(r.time_sec, width))).or_default();
        c1.push(r.cca_corr1);
        c2.push(r.cca_corr2);
    }
    acc.into_iter()
        .map(|((stage, k), (c1, c2))| TrajectoryRow {
            stage,
            bin_start: k as f64 * width,
            bin_end: (k + 1) as f64 * width,
            cca_corr1: descriptive::mean(&c1),
            cca_corr2: descriptive::mean(&c2),
        })
        .collect()
}

/// Rows grouped by subject then stage, each group sorted by `time_sec`.
fn series_by_subject_stage(rows: &[TimeResolvedSample]) -> BTreeMap<(&str, SleepStage), Vec<&TimeResolvedSample>> {
    let mut out: BTreeMap<(&str, SleepStage), Vec<&TimeResolvedSample>> = BTreeMap::new();
    for r in rows {
        out.entry((r.subject.as_str(), r.stage)).or_default().push(r);
    }
    for series in out.values_mut() {
        series.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec));
    }
    out
}

fn component_values(series: &[&TimeResolvedSample]) -> [Vec<f64>; 2] {
    [
        series.iter().map(|r| r.cca_corr1).filter(|v| v.is_finite()).collect(),
        series.iter().map(|r| r.cca_corr2).filter(|v| v.is_finite()).collect(),
    ]
}

/// Entropy, mean, std (ddof 1), skewness and kurtosis per subject×stage.
pub fn entropy_table(rows: &[TimeResolvedSample]) -> Vec<EntropyRow> {
    series_by_subject_stage(rows)
        .into_iter()
        .map(|((subject, stage), series)| {
            let [c1, c2] = component_values(&series);
            EntropyRow {
                subject: subject.to_string(),
                stage,
                cca_corr1_entropy: histogram_entropy(&c1),
                cca_corr1_mean: descriptive::mean(&c1),
                cca_corr1_std: descriptive::std(&c1, 1),
                cca_corr1_skew: descriptive::skewness(&c1),
                cca_corr1_kurtosis: descriptive::kurtosis(&c1),
                cca_corr2_entropy: histogram_entropy(&c2),
                cca_corr2_mean: descriptive::mean(&c2),
                cca_corr2_std: descriptive::std(&c2, 1),
                cca_corr2_skew: descriptive::skewness(&c2),
                cca_corr2_kurtosis: descriptive::kurtosis(&c2),
            }
        })
        .collect()
}

/// Draw `n` distinct subjects with a seeded RNG. Fewer available → all of them.
pub fn sample_subjects(rows: &[TimeResolvedSample], n: usize, seed: u64) -> BTreeSet<String> {
    let all: Vec<&str> = rows
        .iter()
        .map(|r| r.subject.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    all.choose_multiple(&mut rng, n).map(|s| s.to_string()).collect()
}

/// Stationarity rows for every series with at least
/// [`MIN_OBSERVATIONS`] values; shorter series are tallied as skipped.
pub fn stationarity_table(rows: &[TimeResolvedSample], tally: &mut SkipTally) -> Vec<StationarityRow> {
    let mut out = Vec::new();
    for ((subject, stage), series) in series_by_subject_stage(rows) {
        for (component, values) in ["cca_corr1", "cca_corr2"].into_iter().zip(component_values(&series)) {
            if values.len() < MIN_OBSERVATIONS {
                let reason = SkipReason::InsufficientData { test: "adf/kpss", needed: MIN_OBSERVATIONS, got: values.len() };
                tracing::debug!(subject = subject, stage = %stage, component, "{reason}");
                tally.skip(&reason);
                continue;
            }
            // a failed test keeps the row with an empty p-value and a false flag
            let mut failed = |test: &'static str, e: StationarityError| {
                let reason = SkipReason::StatTestFailed { test, reason: e.to_string() };
                tracing::warn!(subject = subject, stage = %stage, component, "{reason}");
                tally.skip(&reason);
            };
            let adf = adf(&values).map_err(|e| failed("ADF", e)).ok();
            let kpss = kpss(&values).map_err(|e| failed("KPSS", e)).ok();
            if adf.is_some() && kpss.is_some() {
                tally.produced += 1;
            }
            out.push(StationarityRow {
                subject: subject.to_string(),
                stage,
                component: component.to_string(),
                adf_pval: adf.map(|r| r.p_value),
                adf_stationary: adf.is_some_and(|r| r.is_stationary()),
                kpss_pval: kpss.map(|r| r.p_value),
                kpss_stationary: kpss.is_some_and(|r| r.is_stationary()),
            });
        }
    }
    out
}

/// Analyse pooled time-resolved rows.
pub fn analyze(rows: &[TimeResolvedSample], cfg: &TimeCcaConfig) -> TimeAnalysis {
    let mut out = TimeAnalysis::default();
    let corr = StageCorrelations::from_rows(rows.iter().map(|r| (r.stage, r.cca_corr1, r.cca_corr2)));
    out.stagewise_summary = corr.summary();
    out.anova = corr.anova(&mut out.tests);
    out.trajectories = mean_trajectories(rows, cfg.time_bin);
    out.entropy = entropy_table(rows);

    let picked = sample_subjects(rows, cfg.sampled_subjects, cfg.sample_seed);
    tracing::info!(subjects = ?picked, "subset trajectories");
    out.subset = rows.iter().filter(|r| picked.contains(&r.subject)).cloned().collect();

    out.stationarity = stationarity_table(rows, &mut out.tests);
    out
}

/// Run the time-resolved analysis and write its tables to `cfg.results_dir`.
pub fn run(cfg: &TimeCcaConfig) -> Result<TimeAnalysis> {
    let rows = io::read_all_time_series(&cfg.output_dir)?;
    if rows.is_empty() {
        bail!("no time-resolved series in {}", cfg.output_dir.display());
    }
    tracing::info!(rows = rows.len(), "time-resolved series loaded");

    let out = analyze(&rows, cfg);
    let dir = &cfg.results_dir;
    io::write_rows(&dir.join(STAGEWISE_SUMMARY_FILE), &out.stagewise_summary)?;
    io::write_rows(&dir.join(TRAJECTORY_FILE), &out.trajectories)?;
    io::write_rows(&dir.join(ENTROPY_FILE), &out.entropy)?;
    io::write_rows(&dir.join(SUBSET_FILE), &out.subset)?;
    io::write_rows(&dir.join(ANOVA_FILE), &out.anova)?;
    io::write_rows(&dir.join(STATIONARITY_FILE), &out.stationarity)?;
    tracing::info!(dir = %dir.display(), series = out.entropy.len(), "time-resolved analysis written");
    out.tests.log_summary("all", "time-resolved tests");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample(subject: &str, stage: SleepStage, t: f64, r1: f64, r2: f64) -> TimeResolvedSample {
        TimeResolvedSample { time_sec: t, cca_corr1: r1, cca_corr2: r2, subject: subject.into(), stage }
    }

    #[test]
    fn bins_are_half_open() {
        assert_eq!(time_bin(0.0, 600.0), 0);
        assert_eq!(time_bin(599.9, 600.0), 0);
        assert_eq!(time_bin(600.0, 600.0), 1);
    }

    #[test]
    fn trajectories_average_within_bins() {
        let rows = vec![
            sample("a", SleepStage::N2, 0.0, 0.8, 0.2),
            sample("b", SleepStage::N2, 300.0, 0.6, 0.4),
            sample("a", SleepStage::N2, 600.0, 0.5, 0.1),
            sample("a", SleepStage::W, 30.0, 0.9, 0.3),
        ];
        let t = mean_trajectories(&rows, 600.0);
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].stage, SleepStage::W);
        assert_eq!((t[1].bin_start, t[1].bin_end), (0.0, 600.0));
        assert_abs_diff_eq!(t[1].cca_corr1, 0.7, epsilon = 1e-12);
        assert_eq!((t[2].bin_start, t[2].bin_end), (600.0, 1200.0));
        assert_abs_diff_eq!(t[2].cca_corr2, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn subject_draw_is_seeded_and_bounded() {
        let rows: Vec<_> = (0..8).map(|i| sample(&format!("s{i}"), SleepStage::N1, 0.0, 0.5, 0.5)).collect();
        let a = sample_subjects(&rows, 3, 42);
        assert_eq!(a.len(), 3);
        assert_eq!(a, sample_subjects(&rows, 3, 42));
        assert_eq!(sample_subjects(&rows, 20, 1).len(), 8);
    }

    #[test]
    fn short_series_skip_stationarity() {
        let mut rows: Vec<_> = (0..12)
            .map(|i| sample("long", SleepStage::N3, i as f64 * 15.0, 0.5 + 0.01 * ((i * 7) % 5) as f64, 0.3))
            .collect();
        rows.extend((0..4).map(|i| sample("short", SleepStage::N3, i as f64 * 15.0, 0.5, 0.3)));
        let mut tally = SkipTally::new();
        let table = stationarity_table(&rows, &mut tally);
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|r| r.subject == "long"));
        assert_eq!(tally.skipped["insufficient_data"], 2);
    }

    #[test]
    fn flat_trajectory_keeps_row_and_counts_failed_tests() {
        let rows: Vec<_> = (0..15)
            .map(|i| sample("flat", SleepStage::N2, i as f64 * 15.0, 0.6, 0.25))
            .collect();
        let mut tally = SkipTally::new();
        let table = stationarity_table(&rows, &mut tally);
        assert_eq!(table.len(), 2);
        for row in &table {
            assert_eq!(row.adf_pval, None);
            assert_eq!(row.kpss_pval, None);
            assert!(!row.adf_stationary && !row.kpss_stationary);
        }
        // ADF and KPSS for each of the two components
        assert_eq!(tally.skipped["stat_test_failed"], 4);
        assert_eq!(tally.produced, 0);
    }

    #[test]
    fn entropy_rows_per_subject_stage() {
        let rows = vec![
            sample("a", SleepStage::N2, 0.0, 0.81, 0.2),
            sample("a", SleepStage::N2, 15.0, 0.83, 0.4),
            sample("a", SleepStage::R, 0.0, 0.5, 0.1),
        ];
        let e = entropy_table(&rows);
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].stage, SleepStage::N2);
        assert_abs_diff_eq!(e[0].cca_corr1_mean, 0.82, epsilon = 1e-12);
        // both values in one bin → near-zero entropy
        assert!(e[0].cca_corr1_entropy < 1e-6);
        assert!(e[1].cca_corr1_std.is_nan());
    }
}
