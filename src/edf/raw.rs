//! Raw EDF data reader.
//!
//! # Algorithm
//! 1. Read the fixed header and the signal headers.
//! 2. Derive the record count from the file size when the header says `-1`
//!    (and trust the file size over the header when the file is truncated).
//! 3. For a set of channel names, resolve signal indices and read every data
//!    record once, decoding only the picked signals into a `[n_chan, n_times]`
//!    array of physical values.
//!
//! EDF+D (discontinuous) files are read as if the records were contiguous.
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use ndarray::Array2;

use super::header::{parse_fixed, parse_signals, EdfHeader, BLOCK};

/// An opened EDF recording (header only; data is read on demand).
#[derive(Debug, Clone)]
pub struct RawEdf {
    pub header: EdfHeader,
    /// Number of complete data records present in the file.
    pub n_records: usize,
    pub path: PathBuf,
}

/// Channels read from a recording, all at one sampling rate.
#[derive(Debug, Clone)]
pub struct ChannelData {
    /// `[n_chan, n_times]` physical values.
    pub data: Array2<f64>,
    pub labels: Vec<String>,
    pub sfreq: f64,
}

impl RawEdf {
    /// Absolute recording start.
    #[inline]
    pub fn start(&self) -> NaiveDateTime {
        self.header.start
    }

    /// Total duration in seconds.
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.n_records as f64 * self.header.record_duration
    }

    /// Resolve channel names to signal indices, failing on the first missing name.
    pub fn pick(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.header.find_signal(n).with_context(|| {
                    let available: Vec<&str> =
                        self.header.signals.iter().map(|s| s.label.as_str()).collect();
                    format!("channel {n:?} not in {} (available: {available:?})", self.path.display())
                })
            })
            .collect()
    }

    /// Read the named channels in full.
    ///
    /// All picked channels must share one sampling rate.
    pub fn read_channels(&self, names: &[String]) -> Result<ChannelData> {
        let picks = self.pick(names)?;
        if picks.is_empty() {
            bail!("no channels requested");
        }
        let spr = self.header.signals[picks[0]].samples_per_record;
        for &p in &picks[1..] {
            let s = &self.header.signals[p];
            if s.samples_per_record != spr {
                bail!(
                    "channel {:?} has {} samples/record but {:?} has {spr}; mixed rates are not supported",
                    s.label,
                    s.samples_per_record,
                    self.header.signals[picks[0]].label
                );
            }
        }

        let n_times = self.n_records * spr;
        let mut out = Array2::<f64>::zeros((picks.len(), n_times));
        let offsets: Vec<usize> = picks.iter().map(|&p| self.header.signal_offset(p)).collect();

        let file = File::open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.header.header_bytes as u64))?;

        let mut record = vec![0u8; self.header.record_bytes()];
        for r in 0..self.n_records {
            reader
                .read_exact(&mut record)
                .with_context(|| format!("reading data record {r} of {}", self.path.display()))?;
            for (row, (&p, &off)) in picks.iter().zip(&offsets).enumerate() {
                let sig = &self.header.signals[p];
                let bytes = &record[off..off + spr * 2];
                let base = r * spr;
                for (k, b) in bytes.chunks_exact(2).enumerate() {
                    out[[row, base + k]] = sig.to_physical(i16::from_le_bytes([b[0], b[1]]));
                }
            }
        }

        Ok(ChannelData {
            data: out,
            labels: picks.iter().map(|&p| self.header.signals[p].label.clone()).collect(),
            sfreq: self.header.signals[picks[0]].sfreq(self.header.record_duration),
        })
    }
}

/// Open an EDF file and parse its header without reading samples.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawEdf> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let file_len = file.metadata()?.len() as usize;
    let mut reader = BufReader::new(file);

    let mut fixed = [0u8; BLOCK];
    reader
        .read_exact(&mut fixed)
        .with_context(|| format!("reading EDF header of {}", path.display()))?;
    let (mut header, ns) = parse_fixed(&fixed)?;

    let mut sig_block = vec![0u8; ns * BLOCK];
    reader
        .read_exact(&mut sig_block)
        .with_context(|| format!("reading EDF signal headers of {}", path.display()))?;
    header.signals = parse_signals(&sig_block, ns)?;

    let record_bytes = header.record_bytes();
    if record_bytes == 0 {
        bail!("EDF data records are empty in {}", path.display());
    }
    let on_disk = file_len.saturating_sub(header.header_bytes) / record_bytes;
    let n_records = match header.n_records {
        Some(n) if n <= on_disk => n,
        Some(n) => {
            tracing::warn!(
                path = %path.display(),
                declared = n,
                present = on_disk,
                "EDF file truncated; reading the records present"
            );
            on_disk
        }
        None => on_disk,
    };

    Ok(RawEdf { header, n_records, path: path.to_path_buf() })
}
