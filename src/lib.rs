//! # sleepcca: EEG/EOG canonical correlation across sleep stages
//!
//! `sleepcca` measures how strongly the EEG and EOG channel groups of a
//! polysomnography recording co-vary in each sleep stage. It fits a
//! two-component canonical correlation analysis (CCA) once per stage
//! (static mode) and on a sliding window inside every scored epoch
//! (time-resolved mode), then summarises the correlations per stage.
//!
//! ## Pipeline overview
//!
//! ```text
//! <subject>.edf + <subject>.annot
//!   │
//!   ├─ edf::open_raw()              native EDF reader, EEG + EOG groups [C, T]
//!   ├─ annotation                   tab-separated rows → StageAnnotation
//!   ├─ epoch                        clock times → seconds since start (midnight rollover)
//!   │
//!   ├─ static_cca                   all spans of a stage concatenated → 1 fit per stage
//!   │     └─→ <subject>_<stage>_{Xc,Yc}_downsampled.csv, eeg_eog_cca_summary_stats.csv
//!   │
//!   ├─ preprocess (optional)        notch + band-pass on the whole recording
//!   ├─ time_resolved                30 s windows every 15 s → 1 fit per window
//!   │     └─→ <subject>_<stage>_cca_timeseries.csv
//!   │
//!   ├─ analysis                     stage summaries, ANOVA, entropy, ADF/KPSS
//!   └─ report                       SVG figures
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use sleepcca::{run_pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! let cfg = PipelineConfig::from_file(Path::new("config.toml")).unwrap();
//! run_pipeline(&cfg).unwrap();
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use sleepcca::cca::fit_transform;
//! use sleepcca::edf::open_raw;
//! use sleepcca::epoch::Epoch;
//! use sleepcca::stage::SleepStage;
//! use ndarray::s;
//!
//! let raw = open_raw("data/apples/s01.edf").unwrap();
//! let eeg = raw.read_channels(&["C3_M2".into(), "C4_M1".into()]).unwrap();
//! let eog = raw.read_channels(&["LOC".into(), "ROC".into()]).unwrap();
//!
//! let epoch = Epoch { stage: SleepStage::N2, start_sec: 180.0, stop_sec: 420.0 };
//! let span = epoch.to_sample_span(eeg.sfreq, eeg.data.ncols()).unwrap();
//!
//! let x = eeg.data.slice(s![.., span.start..span.stop]);
//! let y = eog.data.slice(s![.., span.start..span.stop]);
//! let pair = fit_transform(x.t(), y.t(), 2).unwrap();
//! println!("canonical correlations: {:?}", pair.correlations());
//! ```

pub mod analysis;
pub mod annotation;
pub mod cca;
pub mod config;
pub mod edf;
pub mod epoch;
pub mod error;
pub mod filter;
pub mod io;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod stage;
pub mod static_cca;
pub mod stats;
pub mod time_resolved;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{ChannelGroups, PipelineConfig, N_COMPONENTS};

// labels, parsing, segmentation
pub use annotation::{parse_annotations, read_annotation_file, StageAnnotation};
pub use epoch::{resolve_epochs, window_count, window_starts, Epoch, SampleSpan};
pub use stage::SleepStage;

// per-unit outcomes
pub use error::{Outcome, SkipReason, SkipTally};

// recording reader / writer
pub use edf::{open_raw, write_edf, ChannelData, RawEdf};

// CCA primitive
pub use cca::{fit_transform, pearson, CanonicalPair, FitError};

// modes
pub use static_cca::{StageProjection, StaticSummary};
pub use time_resolved::{TimeResolvedSample, WindowSpec};

// orchestration
pub use pipeline::{run_pipeline, run_static_cca, run_time_resolved_cca};
