//! Non-fatal decoder diagnostics
//!
//! Nothing seen on the bus stops the decoder. Anything unexpected is logged
//! and counted, and decoding continues with the best current guess.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bus::SequenceError;
use crate::radio::{DecodeError, RadioMode};

/// Broad class of an [`Anomaly`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Bus events out of order
    Sequencing,
    /// Out-of-range field on the wire
    Decode,
    /// Decoder state does not match what the traffic implies
    State,
    /// Reported by the SPI framer
    Framing,
}

/// Something unexpected on the bus or in the inferred mode timeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Anomaly {
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("wake observed while in {0}, not SLEEP")]
    WakeOutsideSleep(RadioMode),

    #[error("wake from STBY_XOSC, host assumed the radio was asleep")]
    WakeFromStandbyXosc,

    #[error("leaving STBY_RC but its start time was never set")]
    StandbyRcExitUnsetStart,

    #[error("unhandled {command} while in {mode} (transaction {transaction})")]
    UnhandledTransition {
        command: &'static str,
        mode: RadioMode,
        transaction: u64,
    },

    #[error("framing error reported by the SPI decoder")]
    Framing,
}

impl Anomaly {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            Anomaly::Sequence(_) => AnomalyKind::Sequencing,
            Anomaly::Decode(_) => AnomalyKind::Decode,
            Anomaly::WakeOutsideSleep(_)
            | Anomaly::WakeFromStandbyXosc
            | Anomaly::StandbyRcExitUnsetStart
            | Anomaly::UnhandledTransition { .. } => AnomalyKind::State,
            Anomaly::Framing => AnomalyKind::Framing,
        }
    }
}

/// Running anomaly totals, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyCounts {
    pub sequencing: u64,
    pub decode: u64,
    pub state: u64,
    pub framing: u64,
}

impl AnomalyCounts {
    /// Log an anomaly and count it
    pub fn record(&mut self, anomaly: impl Into<Anomaly>) {
        let anomaly = anomaly.into();
        let kind = anomaly.kind();
        warn!(?kind, "{anomaly}");

        match kind {
            AnomalyKind::Sequencing => self.sequencing += 1,
            AnomalyKind::Decode => self.decode += 1,
            AnomalyKind::State => self.state += 1,
            AnomalyKind::Framing => self.framing += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.sequencing + self.decode + self.state + self.framing
    }
}
