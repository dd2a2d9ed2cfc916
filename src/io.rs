//! File-system I/O: recording discovery, result CSVs and the run report.
//!
//! Output layout:
//!
//! ```text
//! <static_cca.output_dir>/
//!   <subject>_<stage>_Xc_downsampled.csv     Xc_1,Xc_2
//!   <subject>_<stage>_Yc_downsampled.csv     Yc_1,Yc_2
//!   eeg_eog_cca_summary_stats.csv            subject,stage,cca_corr1,cca_corr2,Xc1_mean,…
//! <time_cca.output_dir>/
//!   <subject>_<stage>_cca_timeseries.csv     time_sec,cca_corr1,cca_corr2,subject,stage
//! ```
//!
//! Subject ids may contain underscores; file names are split on the last
//! separators only.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::N_COMPONENTS;
use crate::error::{SkipReason, SkipTally};
use crate::stage::SleepStage;
use crate::static_cca::{ComponentStats, StaticSummary};
use crate::time_resolved::TimeResolvedSample;

/// Name of the static summary table inside `static_cca.output_dir`.
pub const STATIC_SUMMARY_FILE: &str = "eeg_eog_cca_summary_stats.csv";

const XC_SUFFIX: &str = "_Xc_downsampled.csv";
const YC_SUFFIX: &str = "_Yc_downsampled.csv";
const TIMESERIES_SUFFIX: &str = "_cca_timeseries.csv";

// ── Discovery ────────────────────────────────────────────────────────────────

/// A recording and its companion annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// File stem of the recording, used as subject id in every output.
    pub subject: String,
    pub recording: PathBuf,
    pub annotation: PathBuf,
}

/// Every `*.<recording_ext>` in `dir`, sorted by file name, paired with
/// `<stem>.<annotation_ext>`.
///
/// Recordings without a companion come back as `MissingCompanionFile`.
pub fn discover_recordings(
    dir: &Path,
    recording_ext: &str,
    annotation_ext: &str,
) -> Result<Vec<Result<Recording, SkipReason>>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == recording_ext))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|recording| {
            let subject = recording.file_stem()?.to_string_lossy().into_owned();
            let annotation = recording.with_extension(annotation_ext);
            Some(if annotation.is_file() {
                Ok(Recording { subject, recording, annotation })
            } else {
                Err(SkipReason::MissingCompanionFile(annotation))
            })
        })
        .collect())
}

// ── Generic CSV ──────────────────────────────────────────────────────────────

/// Write serde rows with a header line. Creates parent directories.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        w.serialize(row).with_context(|| format!("writing {}", path.display()))?;
    }
    w.flush()?;
    Ok(())
}

/// Read every row of a headed CSV file. Extra columns are ignored.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut r = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    r.deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{} row {}", path.display(), i + 1)))
        .collect()
}

// ── Time-resolved series ─────────────────────────────────────────────────────

pub fn timeseries_file_name(subject: &str, stage: SleepStage) -> String {
    format!("{subject}_{stage}{TIMESERIES_SUFFIX}")
}

/// `(subject, stage)` from a `<subject>_<stage>_cca_timeseries.csv` name.
pub fn parse_timeseries_file_name(name: &str) -> Option<(String, SleepStage)> {
    let base = name.strip_suffix(TIMESERIES_SUFFIX)?;
    let (subject, stage) = base.rsplit_once('_')?;
    Some((subject.to_string(), stage.parse().ok()?))
}

pub fn write_time_series(path: &Path, rows: &[TimeResolvedSample]) -> Result<()> {
    write_rows(path, rows)
}

pub fn read_time_series(path: &Path) -> Result<Vec<TimeResolvedSample>> {
    read_rows(path)
}

/// Load every `*_cca_timeseries.csv` under `dir`, in file-name order.
pub fn read_all_time_series(dir: &Path) -> Result<Vec<TimeResolvedSample>> {
    let mut out = Vec::new();
    for path in files_with_suffix(dir, TIMESERIES_SUFFIX)? {
        out.extend(read_time_series(&path)?);
    }
    Ok(out)
}

fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().ends_with(suffix)))
        .collect();
    paths.sort();
    Ok(paths)
}

// ── Static projections ───────────────────────────────────────────────────────

/// Which side of the CCA a projection file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Xc,
    Yc,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Xc => "Xc",
            Side::Yc => "Yc",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Side::Xc => XC_SUFFIX,
            Side::Yc => YC_SUFFIX,
        }
    }

    /// Column names `Xc_1, Xc_2`.
    pub fn columns(self) -> [String; N_COMPONENTS] {
        std::array::from_fn(|i| format!("{}_{}", self.as_str(), i + 1))
    }
}

pub fn projection_file_name(subject: &str, stage: SleepStage, side: Side) -> String {
    format!("{subject}_{stage}{}", side.suffix())
}

/// `(subject, stage, side)` from a projection file name.
pub fn parse_projection_file_name(name: &str) -> Option<(String, SleepStage, Side)> {
    let (base, side) = if let Some(b) = name.strip_suffix(XC_SUFFIX) {
        (b, Side::Xc)
    } else {
        (name.strip_suffix(YC_SUFFIX)?, Side::Yc)
    };
    let (subject, stage) = base.rsplit_once('_')?;
    Some((subject.to_string(), stage.parse().ok()?, side))
}

/// Write an `[n, 2]` projection with `Xc_1,Xc_2` (or `Yc_…`) headers.
pub fn write_projection(path: &Path, side: Side, m: &Array2<f64>) -> Result<()> {
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(side.columns())?;
    for row in m.rows() {
        w.write_record(row.iter().map(|v| v.to_string()))?;
    }
    w.flush()?;
    Ok(())
}

/// Read a projection file back into `[n, k]`.
pub fn read_projection(path: &Path) -> Result<Array2<f64>> {
    let mut r = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let k = r.headers()?.len();
    let mut values = Vec::new();
    for (i, rec) in r.records().enumerate() {
        let rec = rec.with_context(|| format!("{} row {}", path.display(), i + 1))?;
        if rec.len() != k {
            bail!("{} row {}: {} fields, expected {k}", path.display(), i + 1, rec.len());
        }
        for field in rec.iter() {
            values.push(
                field
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("{} row {}: {field:?}", path.display(), i + 1))?,
            );
        }
    }
    let n = if k == 0 { 0 } else { values.len() / k };
    Ok(Array2::from_shape_vec((n, k), values)?)
}

/// A projection file found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionFile {
    pub subject: String,
    pub stage: SleepStage,
    pub side: Side,
    pub path: PathBuf,
}

/// Every well-named projection file under `dir`, sorted by name.
pub fn list_projection_files(dir: &Path) -> Result<Vec<ProjectionFile>> {
    let mut out = Vec::new();
    for path in files_with_suffix(dir, "_downsampled.csv")? {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match parse_projection_file_name(&name) {
            Some((subject, stage, side)) => out.push(ProjectionFile { subject, stage, side, path }),
            None => tracing::warn!(file = %name, "skipping unexpected projection file name"),
        }
    }
    Ok(out)
}

// ── Static summary table ─────────────────────────────────────────────────────

const STAT_NAMES: [&str; 5] = ["mean", "std", "25p", "median", "75p"];

fn stat_values(s: &ComponentStats) -> [f64; 5] {
    [s.mean, s.std, s.p25, s.median, s.p75]
}

/// Header of the static summary table.
pub fn static_summary_header() -> Vec<String> {
    let mut h: Vec<String> = ["subject", "stage", "cca_corr1", "cca_corr2"].map(String::from).to_vec();
    for side in ["Xc", "Yc"] {
        for comp in 1..=N_COMPONENTS {
            h.extend(STAT_NAMES.iter().map(|s| format!("{side}{comp}_{s}")));
        }
    }
    h
}

pub fn write_static_summaries(path: &Path, rows: &[StaticSummary]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(static_summary_header())?;
    for r in rows {
        let mut rec = vec![r.subject.clone(), r.stage.to_string()];
        rec.extend(r.correlations.iter().map(f64::to_string));
        for stats in r.xc.iter().chain(r.yc.iter()) {
            rec.extend(stat_values(stats).iter().map(f64::to_string));
        }
        w.write_record(&rec)?;
    }
    w.flush()?;
    Ok(())
}

/// The correlation columns of a static summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCorrelationRow {
    pub subject: String,
    pub stage: SleepStage,
    pub cca_corr1: f64,
    pub cca_corr2: f64,
}

pub fn read_static_correlations(path: &Path) -> Result<Vec<StaticCorrelationRow>> {
    read_rows(path)
}

// ── Run report ───────────────────────────────────────────────────────────────

/// Outcome of one recording within a step.
///
/// `epochs` counts annotation rows resolved into epochs; `outputs` counts the
/// step's own units (stage fits or windows).
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectReport {
    pub subject: String,
    pub epochs: SkipTally,
    pub outputs: SkipTally,
    /// Set when the whole recording failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON summary written next to a step's outputs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub step: String,
    pub subjects: Vec<SubjectReport>,
    pub skipped_recordings: Vec<String>,
    pub epochs: SkipTally,
    pub outputs: SkipTally,
}

impl RunReport {
    pub fn new(step: &str) -> Self {
        Self { step: step.to_string(), ..Self::default() }
    }

    pub fn add(&mut self, subject: SubjectReport) {
        self.epochs.merge(&subject.epochs);
        self.outputs.merge(&subject.outputs);
        self.subjects.push(subject);
    }

    /// Recordings without a file-level error that produced at least one output.
    pub fn n_usable(&self) -> usize {
        self.subjects.iter().filter(|s| s.error.is_none() && s.outputs.produced > 0).count()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip_with_underscored_subjects() {
        let n = projection_file_name("apples_0102", SleepStage::N3, Side::Yc);
        assert_eq!(n, "apples_0102_N3_Yc_downsampled.csv");
        assert_eq!(
            parse_projection_file_name(&n),
            Some(("apples_0102".to_string(), SleepStage::N3, Side::Yc))
        );
        let t = timeseries_file_name("s_1", SleepStage::R);
        assert_eq!(t, "s_1_R_cca_timeseries.csv");
        assert_eq!(parse_timeseries_file_name(&t), Some(("s_1".to_string(), SleepStage::R)));
        assert_eq!(parse_projection_file_name("s1_REM_Xc_downsampled.csv"), None);
        assert_eq!(parse_projection_file_name("notes.csv"), None);
    }

    #[test]
    fn summary_header_layout() {
        let h = static_summary_header();
        assert_eq!(h.len(), 4 + 4 * 5);
        assert_eq!(&h[..5], &["subject", "stage", "cca_corr1", "cca_corr2", "Xc1_mean"]);
        assert_eq!(h[8], "Xc1_75p");
        assert_eq!(h.last().map(String::as_str), Some("Yc2_75p"));
    }

    #[test]
    fn discovery_pairs_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["b.edf", "b.annot", "a.edf", "a.annot", "c.edf", "notes.txt"] {
            fs::write(dir.path().join(f), b"").unwrap();
        }
        let found = discover_recordings(dir.path(), "edf", "annot").unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].as_ref().unwrap().subject, "a");
        assert_eq!(found[1].as_ref().unwrap().subject, "b");
        assert!(matches!(found[2], Err(SkipReason::MissingCompanionFile(_))));
    }
}
