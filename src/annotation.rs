//! Stage-annotation file parser.
//!
//! The scoring export is tab-separated with a header row and exactly six
//! fields per row:
//!
//! ```text
//! stage  <ignored>  <ignored>  start_clock  stop_clock  <ignored>
//! ```
//!
//! Clock times are wall-clock `HH:MM:SS[.ffffff]` without a date; they are
//! resolved against the recording start in [`crate::epoch`]. Parsing is
//! best-effort: a bad row becomes a [`SkipReason`] and the rest of the file is
//! still read. Row order is not assumed.
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;

use crate::error::{Outcome, SkipReason};
use crate::stage::SleepStage;

/// Fields per annotation row.
pub const FIELDS_PER_ROW: usize = 6;

/// One scored interval, still in clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageAnnotation {
    pub stage: SleepStage,
    pub start: NaiveTime,
    pub stop: NaiveTime,
}

/// Parse a clock time with the first format in `formats` that accepts it.
pub fn parse_clock(s: &str, formats: &[String]) -> Option<NaiveTime> {
    formats
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// Parse one data row. `line` is the 1-based line number used in skip reasons.
pub fn parse_row(
    row: &str,
    line: usize,
    stages: &[SleepStage],
    formats: &[String],
) -> Outcome<StageAnnotation> {
    let fields: Vec<&str> = row.split('\t').collect();
    if fields.len() != FIELDS_PER_ROW {
        return Err(SkipReason::AnnotationParse {
            line,
            reason: format!("expected {FIELDS_PER_ROW} tab-separated fields, found {}", fields.len()),
        });
    }
    let label = fields[0];
    let stage = match label.parse::<SleepStage>() {
        Ok(s) if stages.contains(&s) => s,
        _ => return Err(SkipReason::UnknownStage { line, label: label.to_string() }),
    };
    let clock = |s: &str| {
        parse_clock(s, formats).ok_or_else(|| SkipReason::AnnotationParse {
            line,
            reason: format!("unparsable clock time {s:?}"),
        })
    };
    Ok(StageAnnotation { stage, start: clock(fields[3])?, stop: clock(fields[4])? })
}

/// Parse the full text of an annotation file.
///
/// The first line is a header and is always skipped; blank lines are ignored.
/// Returns one outcome per remaining row, in file order.
pub fn parse_annotations(
    text: &str,
    stages: &[SleepStage],
    formats: &[String],
) -> Vec<Outcome<StageAnnotation>> {
    text.lines()
        .enumerate()
        .skip(1)
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, row)| !row.is_empty())
        .map(|(line, row)| parse_row(row, line, stages, formats))
        .collect()
}

/// Read an annotation file from disk and parse it.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, since
/// scoring software exports in a variety of legacy encodings.
pub fn read_annotation_file(
    path: &Path,
    stages: &[SleepStage],
    formats: &[String],
) -> Result<Vec<Outcome<StageAnnotation>>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading annotation file {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_annotations(&text, stages, formats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> Vec<String> {
        vec!["%H:%M:%S".into(), "%H:%M:%S%.f".into()]
    }

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn parses_valid_row() {
        let a = parse_row("N2\tx\ty\t23:58:00\t00:02:00\tz", 2, &SleepStage::ALL, &formats()).unwrap();
        assert_eq!(a.stage, SleepStage::N2);
        assert_eq!(a.start, hms(23, 58, 0));
        assert_eq!(a.stop, hms(0, 2, 0));
    }

    #[test]
    fn fractional_seconds_accepted() {
        let a = parse_row("R\t-\t-\t01:00:00.500000\t01:00:30\t-", 2, &SleepStage::ALL, &formats()).unwrap();
        assert_eq!(a.start, NaiveTime::from_hms_micro_opt(1, 0, 0, 500_000).unwrap());
    }

    #[test]
    fn wrong_field_count_is_skip() {
        let r = parse_row("N2\tx\t23:58:00\t00:02:00\tz", 7, &SleepStage::ALL, &formats());
        assert!(matches!(r, Err(SkipReason::AnnotationParse { line: 7, .. })));
    }

    #[test]
    fn unconfigured_stage_is_skip() {
        let stages = [SleepStage::N2];
        let r = parse_row("N3\tx\ty\t01:00:00\t01:00:30\tz", 3, &stages, &formats());
        assert!(matches!(r, Err(SkipReason::UnknownStage { line: 3, .. })));
        let r = parse_row("MT\tx\ty\t01:00:00\t01:00:30\tz", 4, &SleepStage::ALL, &formats());
        assert!(matches!(r, Err(SkipReason::UnknownStage { .. })));
    }

    #[test]
    fn bad_time_is_skip() {
        let r = parse_row("W\tx\ty\t25:00:00\t01:00:30\tz", 5, &SleepStage::ALL, &formats());
        assert!(matches!(r, Err(SkipReason::AnnotationParse { line: 5, .. })));
    }

    #[test]
    fn header_skipped_and_bad_rows_do_not_abort() {
        let text = "Sleep Stage\tPosition\tTime [hh:mm:ss]\tStart\tStop\tDuration\n\
                    W\ta\tb\t22:00:00\t22:00:30\t30\n\
                    garbage line\n\
                    \n\
                    N1\ta\tb\t22:00:30\t22:01:00\t30\r\n";
        let out = parse_annotations(text, &SleepStage::ALL, &formats());
        assert_eq!(out.len(), 3);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
        assert_eq!(out[2].as_ref().unwrap().stage, SleepStage::N1);
    }
}
