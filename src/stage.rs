//! Sleep-stage labels.
//!
//! The annotation files use the AASM short labels `W`, `N1`, `N2`, `N3`, `R`.
//! Anything else (movement, arousal, `?`, …) is not a sleep stage and is
//! dropped by the annotation parser.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One scored sleep stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    W,
    N1,
    N2,
    N3,
    R,
}

impl SleepStage {
    /// All stages in hypnogram order.
    pub const ALL: [SleepStage; 5] = [
        SleepStage::W,
        SleepStage::N1,
        SleepStage::N2,
        SleepStage::N3,
        SleepStage::R,
    ];

    /// Label as written in annotation files and output file names.
    pub fn as_str(self) -> &'static str {
        match self {
            SleepStage::W => "W",
            SleepStage::N1 => "N1",
            SleepStage::N2 => "N2",
            SleepStage::N3 => "N3",
            SleepStage::R => "R",
        }
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a label is not one of the five stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sleep stage label {0:?}")]
pub struct UnknownStageLabel(pub String);

impl FromStr for SleepStage {
    type Err = UnknownStageLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "W" => Ok(SleepStage::W),
            "N1" => Ok(SleepStage::N1),
            "N2" => Ok(SleepStage::N2),
            "N3" => Ok(SleepStage::N3),
            "R" => Ok(SleepStage::R),
            other => Err(UnknownStageLabel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for stage in SleepStage::ALL {
            assert_eq!(stage.as_str().parse::<SleepStage>().unwrap(), stage);
        }
    }

    #[test]
    fn non_stage_labels_rejected() {
        assert!("REM".parse::<SleepStage>().is_err());
        assert!("n2".parse::<SleepStage>().is_err());
        assert!("".parse::<SleepStage>().is_err());
    }
}
