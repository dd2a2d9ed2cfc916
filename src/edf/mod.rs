//! EDF recording reader.
//!
//! Reads the header and the physical samples of selected channels from
//! `.edf` polysomnography recordings; enough of EDF/EDF+ to feed the CCA
//! steps, not a general-purpose implementation.
//!
//! # Quick start
//! ```no_run
//! use sleepcca::edf::open_raw;
//!
//! let raw = open_raw("data/apples/subject01.edf").unwrap();
//! println!("start {} · {:.0} s", raw.start(), raw.duration_secs());
//! let eeg = raw.read_channels(&["C3_M2".into(), "C4_M1".into()]).unwrap();
//! println!("{:?} @ {} Hz", eeg.data.dim(), eeg.sfreq);
//! ```
pub mod header;
pub mod raw;
pub mod write;

pub use header::{EdfHeader, SignalHeader, ANNOTATION_LABEL};
pub use raw::{open_raw, ChannelData, RawEdf};
pub use write::write_edf;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array2;

    #[test]
    fn write_then_read_preserves_signal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.edf");
        let start = NaiveDate::from_ymd_opt(2021, 5, 4).unwrap().and_hms_opt(22, 30, 15).unwrap();
        let sfreq = 128.0;
        let data = Array2::from_shape_fn((3, 128 * 4), |(c, t)| {
            ((t as f64 / sfreq) * 2.0 * std::f64::consts::PI * (c as f64 + 1.0)).sin() * 40.0
        });
        write_edf(&path, start, sfreq, &["C3_M2", "LOC", "ROC"], &data).unwrap();

        let raw = open_raw(&path).unwrap();
        assert_eq!(raw.start(), start);
        assert_eq!(raw.n_records, 4);
        assert_eq!(raw.header.signals.len(), 3);

        let got = raw.read_channels(&["ROC".into(), "c3_m2".into()]).unwrap();
        assert_eq!(got.data.dim(), (2, 512));
        assert_eq!(got.sfreq, 128.0);
        assert_eq!(got.labels, vec!["ROC".to_string(), "C3_M2".to_string()]);
        // 16-bit quantisation over an 80 uV range: step ≈ 1.2e-3.
        for t in 0..512 {
            approx::assert_abs_diff_eq!(got.data[[0, t]], data[[2, t]], epsilon = 2e-3);
            approx::assert_abs_diff_eq!(got.data[[1, t]], data[[0, t]], epsilon = 2e-3);
        }
    }

    #[test]
    fn missing_channel_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.edf");
        let start = NaiveDate::from_ymd_opt(2021, 5, 4).unwrap().and_hms_opt(22, 0, 0).unwrap();
        write_edf(&path, start, 64.0, &["LOC"], &Array2::zeros((1, 64))).unwrap();
        let raw = open_raw(&path).unwrap();
        assert!(raw.read_channels(&["ROC".into()]).is_err());
    }
}
