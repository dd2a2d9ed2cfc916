//! Analysis of the static-mode outputs.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{stage_anova, AnovaRow, CorrelationSummaryRow, StageCorrelations};
use crate::config::{StaticCcaConfig, N_COMPONENTS};
use crate::error::SkipTally;
use crate::io::{self, Side, STATIC_SUMMARY_FILE};
use crate::stage::SleepStage;
use crate::stats::Moments;

pub const CORRELATION_SUMMARY_FILE: &str = "cca_correlation_summary.csv";
pub const ANOVA_FILE: &str = "static_anova.csv";
pub const PROJECTION_SUMMARY_FILE: &str = "canonical_projection_summary_by_stage.csv";
pub const EXPLAINED_VARIANCE_FILE: &str = "explained_variance_by_stage.csv";

/// Pooled distribution of one projection column within one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSummaryRow {
    /// `Xc_1`, `Xc_2`, `Yc_1` or `Yc_2`.
    pub projection: String,
    pub stage: SleepStage,
    pub mean: f64,
    /// Population std (ddof 0).
    pub std: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedVarianceRow {
    pub subject: String,
    pub stage: SleepStage,
    /// 1-based component index.
    pub component: usize,
    #[serde(rename = "explained_variance_Xc")]
    pub xc: f64,
    #[serde(rename = "explained_variance_Yc")]
    pub yc: f64,
}

/// Everything the static analysis produces.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalysis {
    pub correlation_summary: Vec<CorrelationSummaryRow>,
    pub anova: Vec<AnovaRow>,
    pub projection_summary: Vec<ProjectionSummaryRow>,
    pub explained_variance: Vec<ExplainedVarianceRow>,
    /// Produced/skipped statistical tests.
    pub tests: SkipTally,
}

/// Share of each column's population variance in the total.
///
/// All NaN when the total variance is zero.
pub fn explained_variance_ratio(m: &Array2<f64>) -> Vec<f64> {
    if m.nrows() == 0 {
        return vec![f64::NAN; m.ncols()];
    }
    let var = m.var_axis(Axis(0), 0.0);
    let total = var.sum();
    if total == 0.0 {
        return vec![f64::NAN; var.len()];
    }
    var.iter().map(|v| v / total).collect()
}

/// Explained-variance rows of one subject×stage, or `None` when the two
/// projections have different lengths.
pub fn explained_variance(
    subject: &str,
    stage: SleepStage,
    xc: &Array2<f64>,
    yc: &Array2<f64>,
) -> Option<Vec<ExplainedVarianceRow>> {
    if xc.nrows() != yc.nrows() {
        return None;
    }
    let ex = explained_variance_ratio(xc);
    let ey = explained_variance_ratio(yc);
    Some(
        (0..N_COMPONENTS.min(ex.len()).min(ey.len()))
            .map(|i| ExplainedVarianceRow {
                subject: subject.to_string(),
                stage,
                component: i + 1,
                xc: ex[i],
                yc: ey[i],
            })
            .collect(),
    )
}

type Projections = BTreeMap<(String, SleepStage), [Option<Array2<f64>>; 2]>;

/// Read every projection file in `dir`; unreadable files are logged and skipped.
fn load_projections(dir: &Path) -> Result<Projections> {
    let mut out: Projections = BTreeMap::new();
    for f in io::list_projection_files(dir)? {
        match io::read_projection(&f.path) {
            Ok(m) => {
                let slot = out.entry((f.subject, f.stage)).or_default();
                slot[f.side as usize] = Some(m);
            }
            Err(e) => tracing::warn!(file = %f.path.display(), "skipping projection file: {e:#}"),
        }
    }
    Ok(out)
}

/// Projection values pooled over subjects: `name → stage → values`.
fn pool_projections(projections: &Projections) -> BTreeMap<String, BTreeMap<SleepStage, Vec<f64>>> {
    let mut pooled: BTreeMap<String, BTreeMap<SleepStage, Vec<f64>>> = BTreeMap::new();
    for ((_, stage), sides) in projections {
        for (side, m) in [Side::Xc, Side::Yc].into_iter().zip(sides) {
            let Some(m) = m else { continue };
            for (name, col) in side.columns().into_iter().zip(m.columns()) {
                pooled
                    .entry(name)
                    .or_default()
                    .entry(*stage)
                    .or_default()
                    .extend(col.iter().copied().filter(|v| v.is_finite()));
            }
        }
    }
    pooled
}

/// Decimated projection values in `output_dir`, pooled over subjects:
/// `Xc_1`..`Yc_2` → stage → values.
pub fn pooled_projections(output_dir: &Path) -> Result<BTreeMap<String, BTreeMap<SleepStage, Vec<f64>>>> {
    Ok(pool_projections(&load_projections(output_dir)?))
}

/// Analyse the static outputs found in `output_dir`.
pub fn analyze(output_dir: &Path) -> Result<StaticAnalysis> {
    let summary_path = output_dir.join(STATIC_SUMMARY_FILE);
    let rows = io::read_static_correlations(&summary_path)
        .with_context(|| format!("static summary {}", summary_path.display()))?;
    tracing::info!(rows = rows.len(), "static summary loaded");

    let mut out = StaticAnalysis::default();
    let corr = StageCorrelations::from_rows(rows.iter().map(|r| (r.stage, r.cca_corr1, r.cca_corr2)));
    out.correlation_summary = corr.summary();
    out.anova = corr.anova(&mut out.tests);

    let projections = load_projections(output_dir)?;
    if projections.is_empty() {
        tracing::warn!(dir = %output_dir.display(), "no projection files found");
    }
    for (name, by_stage) in pool_projections(&projections) {
        for (stage, values) in &by_stage {
            let m = Moments::of(values, 0);
            out.projection_summary.push(ProjectionSummaryRow {
                projection: name.clone(),
                stage: *stage,
                mean: m.mean,
                std: m.std,
                skewness: m.skewness,
                kurtosis: m.kurtosis,
                count: m.count,
            });
        }
        out.anova.extend(stage_anova(&name, &by_stage, &mut out.tests));
    }

    for ((subject, stage), sides) in &projections {
        let [Some(xc), Some(yc)] = sides else {
            tracing::debug!(subject = subject.as_str(), stage = %stage, "projection pair incomplete");
            continue;
        };
        match explained_variance(subject, *stage, xc, yc) {
            Some(rows) => out.explained_variance.extend(rows),
            None => tracing::warn!(
                subject = subject.as_str(),
                stage = %stage,
                xc_rows = xc.nrows(),
                yc_rows = yc.nrows(),
                "projection lengths differ; explained variance skipped"
            ),
        }
    }
    Ok(out)
}

/// Run the static analysis and write its tables to `cfg.results_dir`.
pub fn run(cfg: &StaticCcaConfig) -> Result<StaticAnalysis> {
    let out = analyze(&cfg.output_dir)?;
    let dir = &cfg.results_dir;
    io::write_rows(&dir.join(CORRELATION_SUMMARY_FILE), &out.correlation_summary)?;
    io::write_rows(&dir.join(ANOVA_FILE), &out.anova)?;
    io::write_rows(&dir.join(PROJECTION_SUMMARY_FILE), &out.projection_summary)?;
    io::write_rows(&dir.join(EXPLAINED_VARIANCE_FILE), &out.explained_variance)?;
    tracing::info!(
        dir = %dir.display(),
        stages = out.correlation_summary.len(),
        anova_rows = out.anova.len(),
        "static analysis written"
    );
    out.tests.log_summary("all", "static tests");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn explained_variance_shares_sum_to_one() {
        let xc = array![[1.0, 0.0], [-1.0, 1.0], [1.0, 0.0], [-1.0, -1.0]];
        let r = explained_variance_ratio(&xc);
        assert_abs_diff_eq!(r[0] + r[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r[0], 1.0 / 1.5, epsilon = 1e-12);
    }

    #[test]
    fn explained_variance_of_constant_projection_is_nan() {
        let c = Array2::from_elem((5, 2), 3.0);
        assert!(explained_variance_ratio(&c).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn mismatched_projection_lengths_skip_the_pair() {
        let a = Array2::<f64>::zeros((4, 2));
        let b = Array2::<f64>::zeros((5, 2));
        assert!(explained_variance("s", SleepStage::N1, &a, &b).is_none());
    }
}
