//! Interval records handed to the timeline renderer
//!
//! Each interval covers a stretch of time the radio spent in one mode and
//! carries a human-readable text ending in the duration in milliseconds.

mod writer;

use serde::{Deserialize, Serialize};

use crate::bus::Timestamp;

pub use writer::{IntervalWriter, OutputFormat};

/// Label of an emitted interval, as understood by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntervalLabel {
    Match,
    /// Wake pulse up to the next chip-select assertion
    WakeA,
    /// Wakeup closed by a host mode command
    WakeB,
    /// Wakeup closed by a transaction too short to carry status
    NdWake,
    SleepEnd,
    StbyRc,
    StbyXosc,
    /// FS closed by a host command
    Fs,
    /// FS left autonomously
    FsEnd,
    RxEnd,
    TxEnd,
    SniffEnd,
}

impl std::fmt::Display for IntervalLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntervalLabel::Match => "match",
            IntervalLabel::WakeA => "wakeA",
            IntervalLabel::WakeB => "wakeB",
            IntervalLabel::NdWake => "ndWake",
            IntervalLabel::SleepEnd => "sleepEnd",
            IntervalLabel::StbyRc => "stbyRc",
            IntervalLabel::StbyXosc => "stbyXosc",
            IntervalLabel::Fs => "fs",
            IntervalLabel::FsEnd => "fsEnd",
            IntervalLabel::RxEnd => "rxEnd",
            IntervalLabel::TxEnd => "txEnd",
            IntervalLabel::SniffEnd => "sniffEnd",
        };
        f.pad(name)
    }
}

/// One labeled stretch of the mode timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeInterval {
    pub label: IntervalLabel,
    /// Start, seconds on the capture clock
    pub start: Timestamp,
    /// End, seconds on the capture clock
    pub end: Timestamp,
    pub text: String,
}

impl ModeInterval {
    /// Build an interval whose text is `<prefix><duration>ms<suffix>`
    pub fn new(
        label: IntervalLabel,
        start: Timestamp,
        end: Timestamp,
        prefix: &str,
        suffix: &str,
    ) -> Self {
        let duration_ms = (end - start) * 1000.0;
        Self {
            label,
            start,
            end,
            text: format!("{prefix}{duration_ms:.5}ms{suffix}"),
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        (self.end - self.start) * 1000.0
    }
}

impl std::fmt::Display for ModeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<8} {:.9}..{:.9} {}",
            self.label, self.start, self.end, self.text
        )
    }
}
