//! Stage-level analysis of the CCA outputs.
//!
//! Both steps read only what the CCA steps wrote to disk, so they can be
//! rerun on their own:
//!
//! ```text
//! static_cca.output_dir ──► static_mode::run ──► static_cca.results_dir
//!   eeg_eog_cca_summary_stats.csv                  cca_correlation_summary.csv
//!   *_Xc/Yc_downsampled.csv                        static_anova.csv
//!                                                  canonical_projection_summary_by_stage.csv
//!                                                  explained_variance_by_stage.csv
//!
//! time_cca.output_dir ──► time_mode::run ──► time_cca.results_dir
//!   *_cca_timeseries.csv                           stagewise_summary.csv
//!                                                  mean_cca_trajectory_by_stage.csv
//!                                                  entropy_by_subject_stage.csv
//!                                                  subset_trajectories.csv
//!                                                  time_anova.csv
//!                                                  stationarity_results.csv
//! ```
//!
//! Tests that cannot run (too few groups or observations) are logged and
//! leave no row behind.

pub mod static_mode;
pub mod time_mode;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SkipTally;
use crate::stage::SleepStage;
use crate::stats::{descriptive, one_way_anova};

/// One row of `static_anova.csv` / `time_anova.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaRow {
    pub variable: String,
    pub n_groups: usize,
    pub f_stat: f64,
    pub p_value: f64,
}

/// ANOVA of `variable` across the stage groups, or `None` (logged) when
/// fewer than two stages have enough observations.
pub fn stage_anova(
    variable: &str,
    groups: &BTreeMap<SleepStage, Vec<f64>>,
    tally: &mut SkipTally,
) -> Option<AnovaRow> {
    let values: Vec<&Vec<f64>> = groups.values().collect();
    match one_way_anova(&values) {
        Ok(r) => {
            tally.produced += 1;
            tracing::info!(variable, f_stat = r.f_stat, p_value = r.p_value, "ANOVA across stages");
            Some(AnovaRow { variable: variable.to_string(), n_groups: r.n_groups, f_stat: r.f_stat, p_value: r.p_value })
        }
        Err(reason) => {
            tracing::warn!(variable, "ANOVA skipped: {reason}");
            tally.skip(&reason);
            None
        }
    }
}

/// Per-stage mean/std/count of both correlation columns
/// (`cca_correlation_summary.csv`, `stagewise_summary.csv`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummaryRow {
    pub stage: SleepStage,
    pub cca_corr1_mean: f64,
    pub cca_corr1_std: f64,
    pub cca_corr1_count: usize,
    pub cca_corr2_mean: f64,
    pub cca_corr2_std: f64,
    pub cca_corr2_count: usize,
}

/// Both correlation columns split by stage.
#[derive(Debug, Clone, Default)]
pub struct StageCorrelations {
    pub corr1: BTreeMap<SleepStage, Vec<f64>>,
    pub corr2: BTreeMap<SleepStage, Vec<f64>>,
}

impl StageCorrelations {
    pub fn from_rows<I: IntoIterator<Item = (SleepStage, f64, f64)>>(rows: I) -> Self {
        let mut out = Self::default();
        for (stage, r1, r2) in rows {
            if r1.is_finite() {
                out.corr1.entry(stage).or_default().push(r1);
            }
            if r2.is_finite() {
                out.corr2.entry(stage).or_default().push(r2);
            }
        }
        out
    }

    /// Sample std (ddof 1); a stage with one value gets NaN.
    pub fn summary(&self) -> Vec<CorrelationSummaryRow> {
        let empty = Vec::new();
        let stages: std::collections::BTreeSet<SleepStage> =
            self.corr1.keys().chain(self.corr2.keys()).copied().collect();
        stages
            .into_iter()
            .map(|stage| {
                let c1 = self.corr1.get(&stage).unwrap_or(&empty);
                let c2 = self.corr2.get(&stage).unwrap_or(&empty);
                CorrelationSummaryRow {
                    stage,
                    cca_corr1_mean: descriptive::mean(c1),
                    cca_corr1_std: descriptive::std(c1, 1),
                    cca_corr1_count: c1.len(),
                    cca_corr2_mean: descriptive::mean(c2),
                    cca_corr2_std: descriptive::std(c2, 1),
                    cca_corr2_count: c2.len(),
                }
            })
            .collect()
    }

    /// ANOVA rows for `cca_corr1` then `cca_corr2`.
    pub fn anova(&self, tally: &mut SkipTally) -> Vec<AnovaRow> {
        [("cca_corr1", &self.corr1), ("cca_corr2", &self.corr2)]
            .into_iter()
            .filter_map(|(name, groups)| stage_anova(name, groups, tally))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn summary_groups_by_stage_with_sample_std() {
        let sc = StageCorrelations::from_rows([
            (SleepStage::N2, 0.8, 0.4),
            (SleepStage::N2, 0.6, 0.2),
            (SleepStage::W, 0.9, f64::NAN),
        ]);
        let rows = sc.summary();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].stage, SleepStage::W);
        assert_eq!(rows[0].cca_corr2_count, 0);
        assert_eq!(rows[1].stage, SleepStage::N2);
        assert_abs_diff_eq!(rows[1].cca_corr1_mean, 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[1].cca_corr1_std, 0.02_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn anova_needs_two_groups() {
        let sc = StageCorrelations::from_rows([(SleepStage::N2, 0.8, 0.4), (SleepStage::N2, 0.6, 0.2)]);
        let mut tally = SkipTally::new();
        assert!(sc.anova(&mut tally).is_empty());
        assert_eq!(tally.skipped["insufficient_data"], 2);
    }
}
