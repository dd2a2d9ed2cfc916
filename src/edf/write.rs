//! Minimal EDF writer.
//!
//! Writes plain EDF (no annotation signal) with one-second data records and
//! a single sampling rate, quantising each channel to 16 bits over its own
//! `[min, max]` range. Used to produce fixtures and demo recordings.
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use ndarray::Array2;

use super::header::{BLOCK, SIGNAL_FIELD_WIDTHS};

const DIG_MIN: i32 = -32768;
const DIG_MAX: i32 = 32767;

fn put(buf: &mut Vec<u8>, s: &str, width: usize) {
    let mut bytes: Vec<u8> = s.bytes().take(width).collect();
    bytes.resize(width, b' ');
    buf.extend_from_slice(&bytes);
}

/// Format a number into at most `width` ASCII characters.
fn num(v: f64, width: usize) -> String {
    let s = format!("{v}");
    if s.len() <= width {
        return s;
    }
    let mut p = width.saturating_sub(2);
    loop {
        let t = format!("{v:.p$}");
        if t.len() <= width || p == 0 {
            return t;
        }
        p -= 1;
    }
}

/// Write `data` (`[n_chan, n_times]`, physical units) as an EDF file.
///
/// `n_times` must be a whole number of seconds at `sfreq`, and `sfreq` must
/// be an integer. Trailing samples that do not fill a record are dropped.
pub fn write_edf(
    path: &Path,
    start: NaiveDateTime,
    sfreq: f64,
    labels: &[&str],
    data: &Array2<f64>,
) -> Result<()> {
    let (n_ch, n_t) = data.dim();
    if labels.len() != n_ch {
        bail!("{} labels for {n_ch} channels", labels.len());
    }
    if sfreq.fract() != 0.0 || sfreq <= 0.0 {
        bail!("write_edf needs an integer sampling rate (got {sfreq})");
    }
    let spr = sfreq as usize;
    let n_records = n_t / spr;

    // Per-channel physical range; flat channels get a symmetric unit range.
    let ranges: Vec<(f64, f64)> = data
        .rows()
        .into_iter()
        .map(|row| {
            let lo = row.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if (hi - lo).abs() < 1e-12 || !lo.is_finite() || !hi.is_finite() {
                (lo.min(0.0) - 1.0, hi.max(0.0) + 1.0)
            } else {
                (lo, hi)
            }
        })
        .collect();

    let mut buf: Vec<u8> = Vec::with_capacity(BLOCK * (n_ch + 1) + n_records * spr * n_ch * 2);
    put(&mut buf, "0", 8);
    put(&mut buf, "X X X X", 80);
    put(&mut buf, &format!("Startdate {} X X X", start.format("%d-%b-%Y").to_string().to_uppercase()), 80);
    put(&mut buf, &start.format("%d.%m.%y").to_string(), 8);
    put(&mut buf, &start.format("%H.%M.%S").to_string(), 8);
    put(&mut buf, &(BLOCK * (n_ch + 1)).to_string(), 8);
    put(&mut buf, "", 44);
    put(&mut buf, &n_records.to_string(), 8);
    put(&mut buf, "1", 8);
    put(&mut buf, &n_ch.to_string(), 4);

    let w = SIGNAL_FIELD_WIDTHS;
    for l in labels {
        put(&mut buf, l, w[0]);
    }
    for _ in 0..n_ch {
        put(&mut buf, "AgAgCl electrode", w[1]);
    }
    for _ in 0..n_ch {
        put(&mut buf, "uV", w[2]);
    }
    for &(lo, _) in &ranges {
        put(&mut buf, &num(lo, w[3]), w[3]);
    }
    for &(_, hi) in &ranges {
        put(&mut buf, &num(hi, w[4]), w[4]);
    }
    for _ in 0..n_ch {
        put(&mut buf, &DIG_MIN.to_string(), w[5]);
    }
    for _ in 0..n_ch {
        put(&mut buf, &DIG_MAX.to_string(), w[6]);
    }
    for _ in 0..n_ch {
        put(&mut buf, "", w[7]);
    }
    for _ in 0..n_ch {
        put(&mut buf, &spr.to_string(), w[8]);
    }
    for _ in 0..n_ch {
        put(&mut buf, "", w[9]);
    }

    // Quantise with the ranges as they will be read back (the header text may
    // round them).
    let parsed: Vec<(f64, f64)> = ranges
        .iter()
        .map(|&(lo, hi)| {
            let lo = num(lo, w[3]).parse::<f64>().unwrap_or(lo);
            let hi = num(hi, w[4]).parse::<f64>().unwrap_or(hi);
            (lo, hi)
        })
        .collect();
    let span = (DIG_MAX - DIG_MIN) as f64;
    for r in 0..n_records {
        for (ch, &(lo, hi)) in parsed.iter().enumerate() {
            for k in 0..spr {
                let v = data[[ch, r * spr + k]];
                let d = ((v - lo) / (hi - lo) * span + DIG_MIN as f64).round();
                let d = d.clamp(DIG_MIN as f64, DIG_MAX as f64) as i16;
                buf.extend_from_slice(&d.to_le_bytes());
            }
        }
    }

    let mut f = std::fs::File::create(path)
        .with_context(|| format!("create {}", path.display()))?;
    f.write_all(&buf)?;
    Ok(())
}
