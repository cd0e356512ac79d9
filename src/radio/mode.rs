//! Radio operating modes as seen from the host side of the bus

use serde::{Deserialize, Serialize};

use super::DecodeError;

/// Operating mode of the transceiver, as inferred by the decoder
///
/// `None` is only ever the initial value, before the first status word
/// has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioMode {
    None,
    Sleep,
    /// Host toggled chip-select to pull the radio out of sleep
    Wakeup,
    StandbyRc,
    StandbyXosc,
    /// Frequency synthesizer running
    FreqSynth,
    Rx,
    Tx,
    /// Wi-Fi or GNSS scan in progress
    Sniff,
}

impl Default for RadioMode {
    fn default() -> Self {
        Self::None
    }
}

impl RadioMode {
    /// Map the 3-bit chip mode field of Stat2 onto a mode
    pub fn from_chip_mode(chip_mode: u8) -> Result<Self, DecodeError> {
        match chip_mode {
            0 => Ok(Self::Sleep),
            1 => Ok(Self::StandbyRc),
            2 => Ok(Self::StandbyXosc),
            3 => Ok(Self::FreqSynth),
            4 => Ok(Self::Rx),
            5 => Ok(Self::Tx),
            6 => Ok(Self::Sniff),
            invalid => Err(DecodeError::UnknownChipMode(invalid)),
        }
    }

    /// Chip mode the device reports while it stays in this mode.
    ///
    /// Only the modes the radio can leave on its own have one; a mismatch
    /// means the device has moved on without being told to.
    pub fn expected_chip_mode(self) -> Option<u8> {
        match self {
            Self::StandbyXosc => Some(2),
            Self::FreqSynth => Some(3),
            Self::Rx => Some(4),
            Self::Tx => Some(5),
            Self::Sniff => Some(6),
            _ => None,
        }
    }
}

impl std::fmt::Display for RadioMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RadioMode::None => "NONE",
            RadioMode::Sleep => "SLEEP",
            RadioMode::Wakeup => "WAKEUP",
            RadioMode::StandbyRc => "STBY_RC",
            RadioMode::StandbyXosc => "STBY_XOSC",
            RadioMode::FreqSynth => "FS",
            RadioMode::Rx => "RX",
            RadioMode::Tx => "TX",
            RadioMode::Sniff => "SNIFF",
        };
        f.write_str(name)
    }
}
