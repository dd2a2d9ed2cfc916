//! EDF / EDF+ header parsing.
//!
//! # On-disk layout
//! ```text
//! fixed header (256 bytes, ASCII, space-padded)
//!   8  version            "0"
//!  80  patient id
//!  80  recording id
//!   8  start date         dd.mm.yy
//!   8  start time         hh.mm.ss
//!   8  header bytes       256 × (ns + 1)
//!  44  reserved           "EDF+C" / "EDF+D" for EDF+
//!   8  n data records     -1 if unknown
//!   8  record duration    seconds
//!   4  ns                 number of signals
//!
//! signal headers (256 bytes per signal, field-major: all labels, then all
//! transducers, …)
//!  16  label          80  transducer      8  physical dimension
//!   8  physical min    8  physical max    8  digital min
//!   8  digital max    80  prefilter       8  samples per record
//!  32  reserved
//! ```
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Size of the fixed header and of each signal header.
pub const BLOCK: usize = 256;

/// Label of the EDF+ annotation pseudo-signal.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Widths of the per-signal header fields, in file order.
pub(crate) const SIGNAL_FIELD_WIDTHS: [usize; 10] = [16, 80, 8, 8, 8, 8, 8, 80, 8, 32];

/// One signal (channel) description.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dim: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl SignalHeader {
    /// Physical units per digital step.
    #[inline]
    pub fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min) as f64
    }

    /// Digital → physical value.
    #[inline]
    pub fn to_physical(&self, digital: i16) -> f64 {
        (digital as i32 - self.digital_min) as f64 * self.gain() + self.physical_min
    }

    #[inline]
    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }

    /// Sampling rate in Hz for a given record duration.
    #[inline]
    pub fn sfreq(&self, record_duration: f64) -> f64 {
        self.samples_per_record as f64 / record_duration
    }
}

/// Parsed file header.
#[derive(Debug, Clone, PartialEq)]
pub struct EdfHeader {
    pub version: String,
    pub patient: String,
    pub recording: String,
    /// Absolute start of the recording (local wall-clock time).
    pub start: NaiveDateTime,
    pub header_bytes: usize,
    /// `EDF+C`, `EDF+D` or empty for plain EDF.
    pub reserved: String,
    /// Number of data records; `None` when the file says `-1`.
    pub n_records: Option<usize>,
    pub record_duration: f64,
    pub signals: Vec<SignalHeader>,
}

impl EdfHeader {
    /// Bytes in one data record (all signals, 2 bytes per sample).
    pub fn record_bytes(&self) -> usize {
        self.signals.iter().map(|s| s.samples_per_record * 2).sum()
    }

    /// Byte offset of signal `idx` inside a data record.
    pub fn signal_offset(&self, idx: usize) -> usize {
        self.signals[..idx].iter().map(|s| s.samples_per_record * 2).sum()
    }

    /// Index of the signal named `name`.
    ///
    /// Exact match first, then a match ignoring case and spaces
    /// (`"fp 1"` finds `"Fp1"`). Annotation signals never match.
    pub fn find_signal(&self, name: &str) -> Option<usize> {
        let norm = |s: &str| s.replace(' ', "").to_lowercase();
        let candidates = || self.signals.iter().enumerate().filter(|(_, s)| !s.is_annotation());
        candidates()
            .find(|(_, s)| s.label == name)
            .or_else(|| candidates().find(|(_, s)| norm(&s.label) == norm(name)))
            .map(|(i, _)| i)
    }
}

fn ascii_field(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect::<String>().trim().to_string()
}

fn number_field<T: std::str::FromStr>(raw: &[u8], what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s = ascii_field(raw);
    s.parse::<T>()
        .with_context(|| format!("EDF header field {what}: cannot parse {s:?}"))
}

/// Parse `dd.mm.yy` + `hh.mm.ss`. Two-digit years 85–99 are 19xx, the rest 20xx.
pub fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime> {
    let parts = |s: &str| -> Result<Vec<u32>> {
        s.split(['.', ':'])
            .map(|p| p.trim().parse::<u32>().map_err(anyhow::Error::from))
            .collect()
    };
    let d = parts(date).with_context(|| format!("EDF start date {date:?}"))?;
    let t = parts(time).with_context(|| format!("EDF start time {time:?}"))?;
    if d.len() != 3 || t.len() != 3 {
        bail!("EDF start date/time malformed: {date:?} {time:?}");
    }
    let year = (if d[2] >= 85 { 1900 + d[2] } else { 2000 + d[2] }) as i32;
    let date = NaiveDate::from_ymd_opt(year, d[1], d[0])
        .with_context(|| format!("EDF start date out of range: {date:?}"))?;
    let time = NaiveTime::from_hms_opt(t[0], t[1], t[2])
        .with_context(|| format!("EDF start time out of range: {time:?}"))?;
    Ok(date.and_time(time))
}

/// Parse the fixed 256-byte block. Returns the header with `signals` empty and
/// the signal count.
pub fn parse_fixed(raw: &[u8]) -> Result<(EdfHeader, usize)> {
    if raw.len() < BLOCK {
        bail!("EDF fixed header too short: {} bytes", raw.len());
    }
    let version = ascii_field(&raw[0..8]);
    if version != "0" {
        bail!("not an EDF file (version field {version:?})");
    }
    let start = parse_start(&ascii_field(&raw[168..176]), &ascii_field(&raw[176..184]))?;
    let header_bytes: usize = number_field(&raw[184..192], "header bytes")?;
    let reserved = ascii_field(&raw[192..236]);
    let n_records: i64 = number_field(&raw[236..244], "number of records")?;
    let record_duration: f64 = number_field(&raw[244..252], "record duration")?;
    let ns: usize = number_field(&raw[252..256], "number of signals")?;

    if ns == 0 {
        bail!("EDF file declares zero signals");
    }
    if header_bytes != BLOCK * (ns + 1) {
        bail!("EDF header size {header_bytes} inconsistent with {ns} signals");
    }
    if !(record_duration > 0.0) {
        bail!("EDF record duration must be > 0 (got {record_duration})");
    }

    Ok((
        EdfHeader {
            version,
            patient: ascii_field(&raw[8..88]),
            recording: ascii_field(&raw[88..168]),
            start,
            header_bytes,
            reserved,
            n_records: usize::try_from(n_records).ok(),
            record_duration,
            signals: Vec::new(),
        },
        ns,
    ))
}

/// Parse the `ns × 256` signal header block.
pub fn parse_signals(raw: &[u8], ns: usize) -> Result<Vec<SignalHeader>> {
    if raw.len() < ns * BLOCK {
        bail!("EDF signal headers truncated: {} bytes for {ns} signals", raw.len());
    }
    // Field-major layout: field f of signal i starts at offset(f) + i * width(f).
    let mut field_start = [0usize; 10];
    let mut acc = 0;
    for (f, w) in SIGNAL_FIELD_WIDTHS.iter().enumerate() {
        field_start[f] = acc;
        acc += w * ns;
    }
    let field = |f: usize, i: usize| {
        let w = SIGNAL_FIELD_WIDTHS[f];
        let s = field_start[f] + i * w;
        &raw[s..s + w]
    };

    (0..ns)
        .map(|i| {
            let sig = SignalHeader {
                label: ascii_field(field(0, i)),
                transducer: ascii_field(field(1, i)),
                physical_dim: ascii_field(field(2, i)),
                physical_min: number_field(field(3, i), "physical min")?,
                physical_max: number_field(field(4, i), "physical max")?,
                digital_min: number_field(field(5, i), "digital min")?,
                digital_max: number_field(field(6, i), "digital max")?,
                prefilter: ascii_field(field(7, i)),
                samples_per_record: number_field(field(8, i), "samples per record")?,
            };
            if sig.digital_max <= sig.digital_min {
                bail!("signal {:?}: digital max must exceed digital min", sig.label);
            }
            Ok(sig)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_year_pivot() {
        let t = parse_start("02.08.19", "23.55.00").unwrap();
        assert_eq!(t, NaiveDate::from_ymd_opt(2019, 8, 2).unwrap().and_hms_opt(23, 55, 0).unwrap());
        let t = parse_start("31.12.99", "00.00.01").unwrap();
        assert_eq!(t.date(), NaiveDate::from_ymd_opt(1999, 12, 31).unwrap());
    }

    #[test]
    fn bad_start_rejected() {
        assert!(parse_start("32.01.20", "00.00.00").is_err());
        assert!(parse_start("01.01", "00.00.00").is_err());
    }

    #[test]
    fn physical_scaling() {
        let s = SignalHeader {
            label: "C3_M2".into(),
            transducer: String::new(),
            physical_dim: "uV".into(),
            physical_min: -500.0,
            physical_max: 500.0,
            digital_min: -32768,
            digital_max: 32767,
            prefilter: String::new(),
            samples_per_record: 256,
        };
        approx::assert_abs_diff_eq!(s.to_physical(-32768), -500.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(s.to_physical(32767), 500.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(s.sfreq(1.0), 256.0);
    }
}
