/// Shared helpers: synthetic recordings, annotation files and configs.
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

use sleepcca::config::PipelineConfig;
use sleepcca::write_edf;

pub const SFREQ: f64 = 100.0;
pub const EEG: [&str; 4] = ["C3_M2", "C4_M1", "O1_M2", "O2_M1"];
pub const EOG: [&str; 2] = ["LOC", "ROC"];

#[allow(unused)]
/// 20 minutes of recording starting at 23:55:00.
pub const DURATION_SECS: usize = 1200;

/// 2024-03-01 23:55:00.
pub fn recording_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(23, 55, 0)
        .unwrap()
}

/// `[C, T]` EEG and EOG groups sharing two latent sources plus independent noise.
pub fn coupled_groups(n: usize, seed: u64) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut noise = move || rng.gen::<f64>() - 0.5;
    let s1: Vec<f64> = (0..n).map(|t| (t as f64 * 0.071).sin() + 0.5 * noise()).collect();
    let s2: Vec<f64> = (0..n).map(|t| (t as f64 * 0.013).cos() + 0.5 * noise()).collect();

    let eeg_mix = [[1.0, 0.3], [0.8, -0.5], [0.2, 1.0], [-0.4, 0.7]];
    let eog_mix = [[0.9, 0.1], [-0.2, 1.1]];
    let eeg = Array2::from_shape_fn((4, n), |(c, t)| eeg_mix[c][0] * s1[t] + eeg_mix[c][1] * s2[t]);
    let eog = Array2::from_shape_fn((2, n), |(c, t)| eog_mix[c][0] * s1[t] + eog_mix[c][1] * s2[t]);
    let eeg = eeg.mapv(|v| v * 50.0) + Array2::from_shape_simple_fn((4, n), &mut noise).mapv(|v| v * 20.0);
    let eog = eog.mapv(|v| v * 80.0) + Array2::from_shape_simple_fn((2, n), &mut noise).mapv(|v| v * 30.0);
    (eeg, eog)
}

#[allow(unused)]
/// Write `<dir>/<subject>.edf` with the four EEG and two EOG channels.
pub fn write_recording(dir: &Path, subject: &str, seconds: usize, seed: u64) -> PathBuf {
    let n = seconds * SFREQ as usize;
    let (eeg, eog) = coupled_groups(n, seed);
    write_groups(dir, subject, &eeg, &eog)
}

#[allow(unused)]
/// Like [`write_recording`] but with both EOG channels held at 0 µV.
pub fn write_flat_eog_recording(dir: &Path, subject: &str, seconds: usize, seed: u64) -> PathBuf {
    let n = seconds * SFREQ as usize;
    let (eeg, _) = coupled_groups(n, seed);
    write_groups(dir, subject, &eeg, &Array2::zeros((2, n)))
}

fn write_groups(dir: &Path, subject: &str, eeg: &Array2<f64>, eog: &Array2<f64>) -> PathBuf {
    let data = ndarray::concatenate(ndarray::Axis(0), &[eeg.view(), eog.view()]).unwrap();
    let labels: Vec<&str> = EEG.iter().chain(EOG.iter()).copied().collect();
    let path = dir.join(format!("{subject}.edf"));
    write_edf(&path, recording_start(), SFREQ, &labels, &data).unwrap();
    path
}

#[allow(unused)]
/// Write an annotation file: a header line, then one
/// `stage\tx\ty\tstart\tstop\tz` row per `(stage, start, stop)`.
pub fn write_annotation(dir: &Path, subject: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
    let mut text = String::from("Sleep Stage\tPosition\tTime [hh:mm:ss]\tStart\tEnd\tDuration[s]\n");
    for (stage, start, stop) in rows {
        text.push_str(&format!("{stage}\tSupine\t-\t{start}\t{stop}\t0\n"));
    }
    let path = dir.join(format!("{subject}.annot"));
    std::fs::write(&path, text).unwrap();
    path
}

#[allow(unused)]
/// A night covering every stage, one midnight crossing, one malformed row,
/// one non-stage label and one interval running past the end of the recording.
pub fn standard_night() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        ("W", "23:55:00", "23:57:00"),
        ("N1", "23:57:00", "23:59:00"),
        ("N2", "23:59:00", "00:03:00"),
        ("N3", "00:03:00", "00:08:00"),
        ("R", "00:08:00", "00:12:00"),
        ("N2", "00:12:00", "not-a-time"),
        ("MT", "00:12:00", "00:13:00"),
        ("N2", "00:14:00", "00:20:00"),
    ]
}

#[allow(unused)]
/// Config with every directory under `root` and figures off.
pub fn test_config(root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.data.data_dir = root.join("data");
    cfg.static_cca.output_dir = root.join("static_cca");
    cfg.static_cca.results_dir = root.join("static_cca_analysis");
    cfg.time_cca.output_dir = root.join("time_resolved_cca");
    cfg.time_cca.results_dir = root.join("time_resolved_cca_analysis");
    cfg.report.figures_dir = root.join("figs");
    cfg.run.generate_figures = false;
    cfg
}
