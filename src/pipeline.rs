//! Step orchestration.
//!
//! ```text
//! run_pipeline(cfg)
//!   ├─ run.run_static_cca            → run_static_cca
//!   ├─ run.run_static_analysis       → analysis::static_mode::run
//!   ├─ run.run_time_resolved_cca     → run_time_resolved_cca
//!   ├─ run.run_time_resolved_analysis→ analysis::time_mode::run
//!   └─ run.generate_figures          → report::generate_figures
//! ```
//!
//! Recordings are processed one at a time; a recording's signal matrices are
//! dropped before the next file is opened. A recording that fails to load is
//! logged and recorded in the step's JSON report, and the batch goes on.
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use crate::annotation::read_annotation_file;
use crate::config::{ChannelGroups, DataConfig, PipelineConfig};
use crate::edf::open_raw;
use crate::epoch::{resolve_epochs, Epoch};
use crate::error::SkipTally;
use crate::io::{self, Recording, RunReport, SubjectReport, Side};
use crate::preprocess::prefilter_groups;
use crate::time_resolved::WindowSpec;
use crate::{analysis, report, static_cca, time_resolved};

pub const STATIC_REPORT_FILE: &str = "static_cca_report.json";
pub const TIME_REPORT_FILE: &str = "time_resolved_cca_report.json";

/// One recording in memory: both channel groups and its resolved epochs.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub subject: String,
    /// `[C_eeg, T]`
    pub eeg: Array2<f64>,
    /// `[C_eog, T]`
    pub eog: Array2<f64>,
    pub sfreq: f64,
    pub epochs: Vec<Epoch>,
}

/// Read both channel groups and the annotation file of one recording.
///
/// The returned tally counts annotation rows turned into epochs and the rows
/// that were skipped.
pub fn load_recording(
    rec: &Recording,
    channels: &ChannelGroups,
    data: &DataConfig,
) -> Result<(LoadedRecording, SkipTally)> {
    let raw = open_raw(&rec.recording)?;
    let eeg = raw.read_channels(&channels.eeg).context("EEG group")?;
    let eog = raw.read_channels(&channels.eog).context("EOG group")?;
    if (eeg.sfreq - eog.sfreq).abs() > 1e-9 {
        bail!("EEG ({} Hz) and EOG ({} Hz) sample rates differ", eeg.sfreq, eog.sfreq);
    }

    let rows = read_annotation_file(&rec.annotation, &data.sleep_stages, &data.time_formats)?;
    let mut tally = SkipTally::new();
    let mut annotations = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            Ok(a) => annotations.push(a),
            Err(reason) => {
                tracing::debug!(subject = rec.subject.as_str(), "{reason}");
                tally.skip(&reason);
            }
        }
    }
    let mut epochs = Vec::with_capacity(annotations.len());
    for outcome in resolve_epochs(&annotations, raw.start()) {
        match outcome {
            Ok(e) => {
                tally.produced += 1;
                epochs.push(e);
            }
            Err(reason) => {
                tracing::warn!(subject = rec.subject.as_str(), "{reason}");
                tally.skip(&reason);
            }
        }
    }
    tracing::info!(
        subject = rec.subject.as_str(),
        sfreq = eeg.sfreq,
        n_samples = eeg.data.ncols(),
        eeg = ?eeg.labels,
        eog = ?eog.labels,
        epochs = epochs.len(),
        "recording loaded"
    );

    Ok((
        LoadedRecording {
            subject: rec.subject.clone(),
            sfreq: eeg.sfreq,
            eeg: eeg.data,
            eog: eog.data,
            epochs,
        },
        tally,
    ))
}

/// Discover recordings, logging and reporting those without a companion.
fn discover(data: &DataConfig, report: &mut RunReport) -> Result<Vec<Recording>> {
    let found = io::discover_recordings(&data.data_dir, &data.recording_ext, &data.annotation_ext)?;
    let mut recordings = Vec::with_capacity(found.len());
    for f in found {
        match f {
            Ok(r) => recordings.push(r),
            Err(reason) => {
                tracing::debug!("{reason}");
                report.skipped_recordings.push(reason.to_string());
            }
        }
    }
    tracing::info!(
        dir = %data.data_dir.display(),
        recordings = recordings.len(),
        skipped = report.skipped_recordings.len(),
        "recordings discovered"
    );
    Ok(recordings)
}

/// Run `per_recording` over every discovered recording and write the report.
fn for_each_recording<F>(
    cfg: &PipelineConfig,
    step: &str,
    channels: &ChannelGroups,
    report_path: &Path,
    mut per_recording: F,
) -> Result<RunReport>
where
    F: FnMut(LoadedRecording) -> Result<SkipTally>,
{
    let mut report = RunReport::new(step);
    for rec in discover(&cfg.data, &mut report)? {
        let _span = tracing::info_span!("recording", subject = rec.subject.as_str()).entered();
        let outcome = load_recording(&rec, channels, &cfg.data).and_then(|(loaded, epochs)| {
            epochs.log_summary(&rec.subject, "epochs");
            Ok((epochs, per_recording(loaded)?))
        });
        let subject = match outcome {
            Ok((epochs, outputs)) => SubjectReport { subject: rec.subject.clone(), epochs, outputs, error: None },
            Err(e) => {
                tracing::error!(subject = rec.subject.as_str(), "recording skipped: {e:#}");
                SubjectReport { subject: rec.subject.clone(), error: Some(format!("{e:#}")), ..SubjectReport::default() }
            }
        };
        report.add(subject);
    }
    report.write(report_path)?;
    if report.n_usable() == 0 {
        bail!("{step}: no usable recordings in {}", cfg.data.data_dir.display());
    }
    tracing::info!(step, usable = report.n_usable(), outputs = %report.outputs, "step finished");
    Ok(report)
}

/// Static CCA over every recording: projection files plus the summary table.
pub fn run_static_cca(cfg: &PipelineConfig) -> Result<RunReport> {
    let out_dir = &cfg.static_cca.output_dir;
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let channels = cfg.static_channels();
    let stages = &cfg.data.sleep_stages;
    let mut summaries = Vec::new();

    let report = for_each_recording(cfg, "static_cca", &channels, &out_dir.join(STATIC_REPORT_FILE), |rec| {
        let (fits, tally) = static_cca::run_subject(
            &rec.subject,
            &rec.eeg,
            &rec.eog,
            rec.sfreq,
            &rec.epochs,
            stages,
            cfg.static_cca.target_rate,
        );
        let mut rows = Vec::with_capacity(fits.len());
        for fit in fits {
            let s = &fit.summary;
            io::write_projection(&out_dir.join(io::projection_file_name(&s.subject, s.stage, Side::Xc)), Side::Xc, &fit.xc)?;
            io::write_projection(&out_dir.join(io::projection_file_name(&s.subject, s.stage, Side::Yc)), Side::Yc, &fit.yc)?;
            rows.push(fit.summary);
        }
        // only recordings whose projections were all written reach the summary
        summaries.extend(rows);
        tally.log_summary(&rec.subject, "stage fits");
        Ok(tally)
    })?;

    let path = out_dir.join(io::STATIC_SUMMARY_FILE);
    io::write_static_summaries(&path, &summaries)?;
    tracing::info!(path = %path.display(), rows = summaries.len(), "static summary written");
    Ok(report)
}

/// Time-resolved CCA over every recording: one series file per subject×stage.
pub fn run_time_resolved_cca(cfg: &PipelineConfig) -> Result<RunReport> {
    let out_dir = &cfg.time_cca.output_dir;
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let channels = cfg.time_channels();
    let window = WindowSpec { length: cfg.time_cca.window_length, step: cfg.time_cca.step_length };

    for_each_recording(cfg, "time_resolved_cca", &channels, &out_dir.join(TIME_REPORT_FILE), |mut rec| {
        prefilter_groups(&mut rec.eeg, &mut rec.eog, &cfg.preprocess, rec.sfreq)?;
        let (by_stage, tally) = time_resolved::run_subject(
            &rec.subject,
            &rec.eeg,
            &rec.eog,
            rec.sfreq,
            &rec.epochs,
            &cfg.data.sleep_stages,
            window,
        );
        for (stage, rows) in &by_stage {
            io::write_time_series(&out_dir.join(io::timeseries_file_name(&rec.subject, *stage)), rows)?;
        }
        tally.log_summary(&rec.subject, "windows");
        Ok(tally)
    })
}

/// Run every step enabled in `cfg.run`, in pipeline order.
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<()> {
    let run = &cfg.run;
    if run.run_static_cca {
        tracing::info!("static CCA");
        run_static_cca(cfg).context("static CCA")?;
    }
    if run.run_static_analysis {
        tracing::info!("static analysis");
        analysis::static_mode::run(&cfg.static_cca).context("static analysis")?;
    }
    if run.run_time_resolved_cca {
        tracing::info!("time-resolved CCA");
        run_time_resolved_cca(cfg).context("time-resolved CCA")?;
    }
    if run.run_time_resolved_analysis {
        tracing::info!("time-resolved analysis");
        analysis::time_mode::run(&cfg.time_cca).context("time-resolved analysis")?;
    }
    if run.generate_figures {
        tracing::info!("figures");
        let written = report::generate_figures(cfg).context("figures")?;
        tracing::info!(figures = written.len(), dir = %cfg.report.figures_dir.display(), "figures done");
    }
    Ok(())
}
