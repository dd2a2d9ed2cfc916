//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter of the analysis. It is
//! read once from a TOML file and then passed by reference into each step;
//! nothing reads configuration from global state.
//!
//! Every section carries `#[serde(default)]`, so a config file only needs the
//! keys it changes:
//!
//! ```toml
//! [data]
//! data_dir = "data/apples"
//! eeg_channels = ["C3_M2", "C4_M1"]
//!
//! [time_cca]
//! window_length = 20.0
//! step_length = 10.0
//!
//! [run]
//! generate_figures = false
//! ```
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::stage::SleepStage;

/// Number of canonical components fitted per side.
pub const N_COMPONENTS: usize = 2;

/// Top-level configuration for the full analysis pipeline.
///
/// All fields are `pub`, so a config can also be built in code with
/// struct-update syntax:
///
/// ```
/// use sleepcca::config::{PipelineConfig, TimeCcaConfig};
///
/// let cfg = PipelineConfig {
///     time_cca: TimeCcaConfig { window_length: 20.0, ..TimeCcaConfig::default() },
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub static_cca: StaticCcaConfig,
    pub time_cca: TimeCcaConfig,
    pub preprocess: PreprocessConfig,
    pub report: ReportConfig,
    pub run: RunFlags,
}

/// Input discovery and channel selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Folder holding `<subject>.<recording_ext>` / `<subject>.<annotation_ext>` pairs.
    ///
    /// Default: `data/apples`.
    pub data_dir: PathBuf,

    /// Default: `edf`.
    pub recording_ext: String,

    /// Default: `annot`.
    pub annotation_ext: String,

    /// EEG channel group (the `X` side of every fit).
    ///
    /// Default: `["C3_M2", "C4_M1", "O1_M2", "O2_M1"]`.
    pub eeg_channels: Vec<String>,

    /// EOG channel group (the `Y` side of every fit).
    ///
    /// Default: `["LOC", "ROC"]`.
    pub eog_channels: Vec<String>,

    /// Stage labels kept from the annotation files; rows with any other label
    /// are skipped.
    ///
    /// Default: all five stages.
    pub sleep_stages: Vec<SleepStage>,

    /// `chrono` formats tried in order for the start/stop clock columns.
    ///
    /// Default: `["%H:%M:%S", "%H:%M:%S%.f"]`.
    pub time_formats: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/apples"),
            recording_ext: "edf".into(),
            annotation_ext: "annot".into(),
            eeg_channels: ["C3_M2", "C4_M1", "O1_M2", "O2_M1"].map(String::from).to_vec(),
            eog_channels: ["LOC", "ROC"].map(String::from).to_vec(),
            sleep_stages: SleepStage::ALL.to_vec(),
            time_formats: vec!["%H:%M:%S".into(), "%H:%M:%S%.f".into()],
        }
    }
}

/// Static (one fit per stage) mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticCcaConfig {
    /// Per-subject projection CSVs and the summary table.
    ///
    /// Default: `data/static_cca`.
    pub output_dir: PathBuf,

    /// Stage-level tables derived from `output_dir`.
    ///
    /// Default: `data/static_cca_analysis`.
    pub results_dir: PathBuf,

    /// Output rate (Hz) of the exported projection time series.
    ///
    /// Projections are decimated by `max(1, floor(sfreq / target_rate))`.
    ///
    /// Default: `1.0` Hz.
    pub target_rate: f64,

    /// Overrides `data.eeg_channels` for this mode when set.
    pub eeg_channels: Option<Vec<String>>,

    /// Overrides `data.eog_channels` for this mode when set.
    pub eog_channels: Option<Vec<String>>,
}

impl Default for StaticCcaConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/static_cca"),
            results_dir: PathBuf::from("data/static_cca_analysis"),
            target_rate: 1.0,
            eeg_channels: None,
            eog_channels: None,
        }
    }
}

/// Time-resolved (sliding window) mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeCcaConfig {
    /// Default: `data/time_resolved_cca`.
    pub output_dir: PathBuf,

    /// Default: `data/time_resolved_cca_analysis`.
    pub results_dir: PathBuf,

    /// Window length in seconds.
    ///
    /// Default: `30.0` s.
    pub window_length: f64,

    /// Window step in seconds; `step_length < window_length` gives overlap.
    ///
    /// Default: `15.0` s.
    pub step_length: f64,

    /// Width of the trajectory time bins in seconds.
    ///
    /// Default: `600.0` s.
    pub time_bin: f64,

    /// Subjects drawn for `subset_trajectories.csv`.
    ///
    /// Default: `3`.
    pub sampled_subjects: usize,

    /// Seed of the subject draw, so reruns pick the same subjects.
    ///
    /// Default: `42`.
    pub sample_seed: u64,

    pub eeg_channels: Option<Vec<String>>,
    pub eog_channels: Option<Vec<String>>,
}

impl Default for TimeCcaConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/time_resolved_cca"),
            results_dir: PathBuf::from("data/time_resolved_cca_analysis"),
            window_length: 30.0,
            step_length: 15.0,
            time_bin: 600.0,
            sampled_subjects: 3,
            sample_seed: 42,
            eeg_channels: None,
            eog_channels: None,
        }
    }
}

/// Band edges for one channel group. Either edge may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandConfig {
    /// Highpass edge in Hz.
    pub hp: Option<f64>,
    /// Lowpass edge in Hz.
    pub lp: Option<f64>,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self { hp: Some(0.3), lp: Some(35.0) }
    }
}

/// Optional pre-filtering applied once to the whole recording before the
/// time-resolved windows are cut.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    /// Default: `false`.
    pub enabled: bool,

    /// Power-line frequency for the notch; `None` disables the notch.
    ///
    /// Default: `50.0` Hz.
    pub line_hz: Option<f64>,

    /// Also notch 2× and 3× the line frequency when below Nyquist.
    ///
    /// Default: `true`.
    pub harmonics: bool,

    /// Default: 0.3–35 Hz.
    pub eeg: BandConfig,

    /// Default: 0.3–35 Hz.
    pub eog: BandConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            line_hz: Some(50.0),
            harmonics: true,
            eeg: BandConfig::default(),
            eog: BandConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Default: `report/figs`.
    pub figures_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { figures_dir: PathBuf::from("report/figs") }
    }
}

/// Which pipeline steps run. Steps always execute in the order listed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunFlags {
    pub run_static_cca: bool,
    pub run_static_analysis: bool,
    pub run_time_resolved_cca: bool,
    pub run_time_resolved_analysis: bool,
    pub generate_figures: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            run_static_cca: true,
            run_static_analysis: true,
            run_time_resolved_cca: true,
            run_time_resolved_analysis: true,
            generate_figures: true,
        }
    }
}

/// EEG/EOG channel names used by one mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroups {
    pub eeg: Vec<String>,
    pub eog: Vec<String>,
}

impl PipelineConfig {
    /// Read and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the invariants every step relies on.
    pub fn validate(&self) -> Result<()> {
        if self.data.sleep_stages.is_empty() {
            bail!("data.sleep_stages is empty");
        }
        if self.data.time_formats.is_empty() {
            bail!("data.time_formats is empty");
        }
        for (mode, groups) in [("static_cca", self.static_channels()), ("time_cca", self.time_channels())] {
            for (side, names) in [("EEG", &groups.eeg), ("EOG", &groups.eog)] {
                if names.len() < N_COMPONENTS {
                    bail!(
                        "{mode}: {side} group needs at least {N_COMPONENTS} channels for a \
                         {N_COMPONENTS}-component fit (got {})",
                        names.len()
                    );
                }
            }
        }
        if !(self.static_cca.target_rate > 0.0) {
            bail!("static_cca.target_rate must be > 0 (got {})", self.static_cca.target_rate);
        }
        let t = &self.time_cca;
        if !(t.window_length > 0.0) || !(t.step_length > 0.0) {
            bail!(
                "time_cca.window_length and step_length must be > 0 (got {} / {})",
                t.window_length,
                t.step_length
            );
        }
        if !(t.time_bin > 0.0) {
            bail!("time_cca.time_bin must be > 0 (got {})", t.time_bin);
        }
        for (group, band) in [("eeg", self.preprocess.eeg), ("eog", self.preprocess.eog)] {
            if let (Some(hp), Some(lp)) = (band.hp, band.lp) {
                if hp >= lp {
                    bail!("preprocess.{group}: hp ({hp}) must be below lp ({lp})");
                }
            }
            if band.hp.is_some_and(|f| f <= 0.0) || band.lp.is_some_and(|f| f <= 0.0) {
                bail!("preprocess.{group}: band edges must be > 0");
            }
        }
        Ok(())
    }

    /// Channel groups for static mode (mode override, else `data`).
    pub fn static_channels(&self) -> ChannelGroups {
        ChannelGroups {
            eeg: self.static_cca.eeg_channels.clone().unwrap_or_else(|| self.data.eeg_channels.clone()),
            eog: self.static_cca.eog_channels.clone().unwrap_or_else(|| self.data.eog_channels.clone()),
        }
    }

    /// Channel groups for time-resolved mode (mode override, else `data`).
    pub fn time_channels(&self) -> ChannelGroups {
        ChannelGroups {
            eeg: self.time_cca.eeg_channels.clone().unwrap_or_else(|| self.data.eeg_channels.clone()),
            eog: self.time_cca.eog_channels.clone().unwrap_or_else(|| self.data.eog_channels.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.time_cca.window_length, 30.0);
        assert_eq!(cfg.time_cca.step_length, 15.0);
        assert_eq!(cfg.data.sleep_stages.len(), 5);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [data]
            eeg_channels = ["C3_M2", "C4_M1"]
            sleep_stages = ["N2", "N3"]

            [time_cca]
            step_length = 10.0

            [run]
            generate_figures = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data.eeg_channels, vec!["C3_M2".to_string(), "C4_M1".to_string()]);
        assert_eq!(cfg.data.sleep_stages, vec![SleepStage::N2, SleepStage::N3]);
        assert_eq!(cfg.data.eog_channels, vec!["LOC".to_string(), "ROC".to_string()]);
        assert_eq!(cfg.time_cca.step_length, 10.0);
        assert_eq!(cfg.time_cca.window_length, 30.0);
        assert!(!cfg.run.generate_figures);
        assert!(cfg.run.run_static_cca);
    }

    #[test]
    fn mode_channel_override() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [time_cca]
            eog_channels = ["E1_M2", "E2_M2"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.time_channels().eog, vec!["E1_M2".to_string(), "E2_M2".to_string()]);
        assert_eq!(cfg.static_channels().eog, vec!["LOC".to_string(), "ROC".to_string()]);
    }

    #[test]
    fn single_channel_group_rejected() {
        let err = PipelineConfig::from_toml_str("[time_cca]\neog_channels = [\"LOC\"]\n").unwrap_err();
        assert!(format!("{err:#}").contains("time_cca: EOG"), "{err:#}");
        assert!(PipelineConfig::from_toml_str("[data]\neeg_channels = [\"C3_M2\"]\n").is_err());
        assert!(PipelineConfig::from_toml_str("[static_cca]\neeg_channels = []\n").is_err());
    }

    #[test]
    fn unknown_stage_label_rejected() {
        assert!(PipelineConfig::from_toml_str("[data]\nsleep_stages = [\"REM\"]\n").is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(PipelineConfig::from_toml_str("[time_cca]\nwindow = 30.0\n").is_err());
    }

    #[test]
    fn zero_step_rejected() {
        assert!(PipelineConfig::from_toml_str("[time_cca]\nstep_length = 0.0\n").is_err());
    }

    #[test]
    fn inverted_band_rejected() {
        let text = "[preprocess.eeg]\nhp = 40.0\nlp = 35.0\n";
        assert!(PipelineConfig::from_toml_str(text).is_err());
    }
}
