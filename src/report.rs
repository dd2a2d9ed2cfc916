//! Report figures (SVG, `plotters`).
//!
//! | File                                  | Source table                                |
//! |---------------------------------------|---------------------------------------------|
//! | `figure1_static_cca_boxplots.svg`     | `eeg_eog_cca_summary_stats.csv`             |
//! | `figure2_time_resolved_boxplots.svg`  | `subset_trajectories.csv`                   |
//! | `figure3_cca_trajectories.svg`        | `mean_cca_trajectory_by_stage.csv`          |
//! | `figure4_entropy_boxplots.svg`        | `entropy_by_subject_stage.csv`              |
//! | `{Xc,Yc}_{1,2}_kde.svg`               | `*_{Xc,Yc}_downsampled.csv`                 |
//! | `{Xc,Yc}_{1,2}_boxplot.svg`           | `*_{Xc,Yc}_downsampled.csv`                 |
//!
//! Figures 1–4 have two panels, ρ₁ on the left and ρ₂ on the right. The
//! projection figures pool every subject's decimated projection by stage.
//! Figures only read step outputs; nothing here feeds back into the pipeline.
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::analysis::static_mode;
use crate::analysis::time_mode::{self, EntropyRow, TrajectoryRow};
use crate::config::PipelineConfig;
use crate::io::{self, STATIC_SUMMARY_FILE};
use crate::stage::SleepStage;
use crate::stats::descriptive::{self, percentile_sorted};
use crate::stats::GaussianKde;
use crate::time_resolved::TimeResolvedSample;

const PANEL_SIZE: (u32, u32) = (1200, 500);
const BOX_HALF_WIDTH: f64 = 0.3;
const KDE_GRID: usize = 256;

/// Five-number summary with Tukey whiskers (1.5 IQR) and the mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub whisker_lo: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_hi: f64,
    pub mean: f64,
}

impl BoxStats {
    /// `None` when `values` has no finite entry.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return None;
        }
        v.sort_by(f64::total_cmp);
        let q1 = percentile_sorted(&v, 25.0);
        let q3 = percentile_sorted(&v, 75.0);
        let iqr = q3 - q1;
        let lo_fence = q1 - 1.5 * iqr;
        let hi_fence = q3 + 1.5 * iqr;
        Some(Self {
            whisker_lo: v.iter().copied().find(|x| *x >= lo_fence).unwrap_or(q1),
            q1,
            median: percentile_sorted(&v, 50.0),
            q3,
            whisker_hi: v.iter().rev().copied().find(|x| *x <= hi_fence).unwrap_or(q3),
            mean: descriptive::mean(&v),
        })
    }
}

type Panel<'a> = DrawingArea<SVGBackend<'a>, Shift>;

fn boxplot_panel(
    area: &Panel<'_>,
    title: &str,
    y_desc: &str,
    y_range: Range<f64>,
    groups: &BTreeMap<SleepStage, Vec<f64>>,
) -> Result<()> {
    let stages: Vec<SleepStage> = groups.keys().copied().collect();
    let n = stages.len().max(1);
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_range)?;

    let label = |x: &f64| {
        let i = x.round();
        if (x - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        stages.get(i as usize).map(|s| s.to_string()).unwrap_or_default()
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&label)
        .y_desc(y_desc)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for (i, values) in groups.values().enumerate() {
        let Some(b) = BoxStats::of(values) else { continue };
        let x = i as f64;
        let color = Palette99::pick(i);
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - BOX_HALF_WIDTH, b.q1), (x + BOX_HALF_WIDTH, b.q3)],
            color.mix(0.4).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x - BOX_HALF_WIDTH, b.q1), (x + BOX_HALF_WIDTH, b.q3)],
            BLACK.stroke_width(1),
        )))?;
        let segments = [
            [(x - BOX_HALF_WIDTH, b.median), (x + BOX_HALF_WIDTH, b.median)],
            [(x, b.q3), (x, b.whisker_hi)],
            [(x, b.q1), (x, b.whisker_lo)],
            [(x - BOX_HALF_WIDTH / 2.0, b.whisker_hi), (x + BOX_HALF_WIDTH / 2.0, b.whisker_hi)],
            [(x - BOX_HALF_WIDTH / 2.0, b.whisker_lo), (x + BOX_HALF_WIDTH / 2.0, b.whisker_lo)],
        ];
        chart.draw_series(segments.into_iter().map(|s| PathElement::new(s.to_vec(), BLACK)))?;
        chart.draw_series(std::iter::once(TriangleMarker::new((x, b.mean), 5, GREEN.filled())))?;
    }
    Ok(())
}

fn two_panel_boxplots(
    path: &Path,
    titles: [&str; 2],
    y_desc: &str,
    y_range: Range<f64>,
    groups: [BTreeMap<SleepStage, Vec<f64>>; 2],
) -> Result<()> {
    let root = SVGBackend::new(path, PANEL_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    for ((area, title), g) in panels.iter().zip(titles).zip(&groups) {
        boxplot_panel(area, title, y_desc, y_range.clone(), g)?;
    }
    root.present().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn split_by_stage<T>(rows: &[T], key: impl Fn(&T) -> (SleepStage, f64, f64)) -> [BTreeMap<SleepStage, Vec<f64>>; 2] {
    let mut out: [BTreeMap<SleepStage, Vec<f64>>; 2] = Default::default();
    for r in rows {
        let (stage, a, b) = key(r);
        out[0].entry(stage).or_default().push(a);
        out[1].entry(stage).or_default().push(b);
    }
    out
}

/// Figure 1: static correlations by stage.
pub fn static_boxplots(summary_csv: &Path, out: &Path) -> Result<()> {
    let rows = io::read_static_correlations(summary_csv)?;
    let groups = split_by_stage(&rows, |r| (r.stage, r.cca_corr1, r.cca_corr2));
    two_panel_boxplots(out, ["Static CCA: ρ1", "Static CCA: ρ2"], "Correlation", 0.0..1.0, groups)
}

/// Figure 2: window correlations of the sampled subjects by stage.
pub fn time_resolved_boxplots(subset_csv: &Path, out: &Path) -> Result<()> {
    let rows: Vec<TimeResolvedSample> = io::read_rows(subset_csv)?;
    let groups = split_by_stage(&rows, |r| (r.stage, r.cca_corr1, r.cca_corr2));
    two_panel_boxplots(out, ["Time-Resolved CCA: ρ1", "Time-Resolved CCA: ρ2"], "Correlation", 0.0..1.0, groups)
}

/// Figure 4: per subject×stage entropy by stage.
pub fn entropy_boxplots(entropy_csv: &Path, out: &Path) -> Result<()> {
    let rows: Vec<EntropyRow> = io::read_rows(entropy_csv)?;
    let groups = split_by_stage(&rows, |r| (r.stage, r.cca_corr1_entropy, r.cca_corr2_entropy));
    two_panel_boxplots(out, ["Entropy: ρ1", "Entropy: ρ2"], "Entropy", 0.0..3.0, groups)
}

/// Figure 3: binned mean trajectory of each stage.
pub fn trajectory_lines(trajectory_csv: &Path, out: &Path) -> Result<()> {
    let rows: Vec<TrajectoryRow> = io::read_rows(trajectory_csv)?;
    let mut by_stage: BTreeMap<SleepStage, Vec<&TrajectoryRow>> = BTreeMap::new();
    for r in &rows {
        by_stage.entry(r.stage).or_default().push(r);
    }
    let t_max = rows.iter().map(|r| r.bin_end / 3600.0).fold(1.0_f64, f64::max);

    let root = SVGBackend::new(out, (1400, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));
    let titles = ["Mean Trajectory: ρ1", "Mean Trajectory: ρ2"];
    for (component, (area, title)) in panels.iter().zip(titles).enumerate() {
        let mut chart = ChartBuilder::on(area)
            .caption(title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..t_max, 0.0..1.0)?;
        chart
            .configure_mesh()
            .x_desc("Time since recording start (h)")
            .y_desc("Correlation")
            .light_line_style(BLACK.mix(0.05))
            .draw()?;

        for (i, (stage, series)) in by_stage.iter().enumerate() {
            let color = Palette99::pick(i).to_rgba();
            let points = series.iter().map(|r| {
                let mid = (r.bin_start + r.bin_end) / 2.0 / 3600.0;
                (mid, if component == 0 { r.cca_corr1 } else { r.cca_corr2 })
            });
            chart
                .draw_series(LineSeries::new(points, color.stroke_width(2)))?
                .label(stage.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    root.present().with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}

/// Span of every box's whiskers and mean, padded by 5 %.
fn whisker_range(groups: &BTreeMap<SleepStage, Vec<f64>>) -> Range<f64> {
    let (lo, hi) = groups
        .values()
        .filter_map(|v| BoxStats::of(v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), b| {
            (lo.min(b.whisker_lo).min(b.mean), hi.max(b.whisker_hi).max(b.mean))
        });
    if !(lo.is_finite() && hi.is_finite()) {
        return -1.0..1.0;
    }
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 1.0 };
    (lo - pad)..(hi + pad)
}

/// Boxplot of one projection's pooled values by stage.
pub fn projection_boxplot(name: &str, by_stage: &BTreeMap<SleepStage, Vec<f64>>, out: &Path) -> Result<()> {
    let root = SVGBackend::new(out, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let title = format!("Boxplot of {name} across stages");
    boxplot_panel(&root, &title, "Projection value", whisker_range(by_stage), by_stage)?;
    root.present().with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}

/// Density of one projection's pooled values, one filled curve per stage.
///
/// Each stage is normalised on its own. Stages with fewer than two values or
/// no spread are left out.
pub fn projection_density(name: &str, by_stage: &BTreeMap<SleepStage, Vec<f64>>, out: &Path) -> Result<()> {
    let kdes: Vec<(usize, SleepStage, GaussianKde)> = by_stage
        .iter()
        .enumerate()
        .filter_map(|(i, (stage, v))| GaussianKde::fit(v).map(|k| (i, *stage, k)))
        .collect();
    let (lo, hi) = kdes.iter().map(|(_, _, k)| k.support()).fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), (a, b)| (lo.min(a), hi.max(b)),
    );
    let (lo, hi) = if lo < hi { (lo, hi) } else { (-1.0, 1.0) };
    let curves: Vec<(usize, SleepStage, Vec<(f64, f64)>)> =
        kdes.iter().map(|(i, stage, k)| (*i, *stage, k.evaluate(lo, hi, KDE_GRID))).collect();
    let y_max = curves
        .iter()
        .flat_map(|(_, _, c)| c.iter().map(|p| p.1))
        .fold(0.0_f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

    let root = SVGBackend::new(out, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Density of {name} across stages"), ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0.0..y_max)?;
    chart
        .configure_mesh()
        .x_desc("Projection value")
        .y_desc("Density")
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for (i, stage, curve) in curves {
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(
                AreaSeries::new(curve, 0.0, color.mix(0.3)).border_style(color.stroke_width(2)),
            )?
            .label(stage.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present().with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}

/// Density and boxplot figures for each projection column found in
/// `output_dir`. Projections with no usable stage are skipped with a warning.
pub fn projection_figures(output_dir: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    let pooled = static_mode::pooled_projections(output_dir)?;
    let mut written = Vec::new();
    for (name, by_stage) in &pooled {
        if by_stage.values().all(|v| v.is_empty()) {
            tracing::warn!(projection = name.as_str(), "no data; projection figures not drawn");
            continue;
        }
        let boxplot = dir.join(format!("{name}_boxplot.svg"));
        projection_boxplot(name, by_stage, &boxplot).with_context(|| format!("rendering {name} boxplot"))?;
        written.push(boxplot);

        if by_stage.values().any(|v| GaussianKde::fit(v).is_some()) {
            let kde = dir.join(format!("{name}_kde.svg"));
            projection_density(name, by_stage, &kde).with_context(|| format!("rendering {name} density"))?;
            written.push(kde);
        } else {
            tracing::warn!(projection = name.as_str(), "no stage has spread; density not drawn");
        }
    }
    Ok(written)
}

/// Render every figure whose source table exists. Returns the written paths.
pub fn generate_figures(cfg: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let dir = &cfg.report.figures_dir;
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let time_dir = &cfg.time_cca.results_dir;

    type Render = fn(&Path, &Path) -> Result<()>;
    let jobs: [(PathBuf, &str, Render); 4] = [
        (cfg.static_cca.output_dir.join(STATIC_SUMMARY_FILE), "figure1_static_cca_boxplots.svg", static_boxplots),
        (time_dir.join(time_mode::SUBSET_FILE), "figure2_time_resolved_boxplots.svg", time_resolved_boxplots),
        (time_dir.join(time_mode::TRAJECTORY_FILE), "figure3_cca_trajectories.svg", trajectory_lines),
        (time_dir.join(time_mode::ENTROPY_FILE), "figure4_entropy_boxplots.svg", entropy_boxplots),
    ];

    let mut written = Vec::new();
    for (source, name, render) in jobs {
        if !source.is_file() {
            tracing::warn!(source = %source.display(), "table missing; {name} not drawn");
            continue;
        }
        let out = dir.join(name);
        render(&source, &out).with_context(|| format!("rendering {name}"))?;
        tracing::info!(figure = %out.display(), "figure saved");
        written.push(out);
    }

    let static_dir = &cfg.static_cca.output_dir;
    if static_dir.is_dir() {
        let figures = projection_figures(static_dir, dir)?;
        tracing::info!(count = figures.len(), "projection figures saved");
        written.extend(figures);
    } else {
        tracing::warn!(dir = %static_dir.display(), "no static outputs; projection figures not drawn");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn box_stats_clip_whiskers_to_fences() {
        let b = BoxStats::of(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert_abs_diff_eq!(b.q1, 2.25, epsilon = 1e-12);
        assert_abs_diff_eq!(b.q3, 4.75, epsilon = 1e-12);
        assert_eq!(b.whisker_lo, 1.0);
        assert_eq!(b.whisker_hi, 5.0);
        assert!(BoxStats::of(&[f64::NAN]).is_none());
    }

    #[test]
    fn static_figure_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("summary.csv");
        std::fs::write(
            &csv,
            "subject,stage,cca_corr1,cca_corr2\na,N2,0.8,0.3\nb,N2,0.7,0.2\na,W,0.9,0.5\n",
        )
        .unwrap();
        let out = dir.path().join("fig.svg");
        static_boxplots(&csv, &out).unwrap();
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn projection_figures_per_column() {
        let dir = tempfile::tempdir().unwrap();
        let m = ndarray::Array2::from_shape_fn((40, 2), |(t, c)| ((t * (c + 3)) as f64 * 0.37).sin());
        for (subject, stage) in [("a", SleepStage::N2), ("b", SleepStage::N2), ("a", SleepStage::R)] {
            for side in [io::Side::Xc, io::Side::Yc] {
                let path = dir.path().join(io::projection_file_name(subject, stage, side));
                io::write_projection(&path, side, &m).unwrap();
            }
        }
        let figs = dir.path().join("figs");
        std::fs::create_dir_all(&figs).unwrap();
        let written = projection_figures(dir.path(), &figs).unwrap();
        assert_eq!(written.len(), 8);
        for name in ["Xc_1", "Xc_2", "Yc_1", "Yc_2"] {
            for kind in ["kde", "boxplot"] {
                let svg = std::fs::read_to_string(figs.join(format!("{name}_{kind}.svg"))).unwrap();
                assert!(svg.contains("<svg"), "{name}_{kind}");
            }
        }
    }

    #[test]
    fn flat_projection_gets_boxplot_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut by_stage = BTreeMap::new();
        by_stage.insert(SleepStage::N3, vec![0.5; 10]);
        let out = dir.path().join("flat.svg");
        projection_boxplot("Xc_1", &by_stage, &out).unwrap();
        assert!(out.is_file());
        assert!(by_stage.values().all(|v| GaussianKde::fit(v).is_none()));
        assert_eq!(whisker_range(&by_stage), -0.5..1.5);
    }
}
