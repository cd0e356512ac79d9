//! Stat1/Stat2 decoding
//!
//! Every command response starts with two status bytes:
//! - Stat1: bit 0 interrupt active, bits 3:1 command status, bits 7:4 reserved
//! - Stat2: bit 0 boot loader, bits 3:1 chip mode, bits 7:4 reset status

use serde::{Deserialize, Serialize};

/// Outcome of the previous command, from Stat1 bits 3:1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// CMD_FAIL
    Fail,
    /// CMD_PERR
    ParameterError,
    /// CMD_OK
    Ok,
    /// CMD_DAT: the response carries data, not telemetry
    Data,
    Reserved(u8),
}

impl From<u8> for CommandStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Fail,
            1 => Self::ParameterError,
            2 => Self::Ok,
            3 => Self::Data,
            other => Self::Reserved(other),
        }
    }
}

/// Decoded Stat1/Stat2 pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusWord {
    pub int_active: bool,
    pub cmd_status: CommandStatus,
    pub boot_loader: bool,
    /// Raw chip mode, 0..=7. Only 0..=6 are defined.
    pub chip_mode: u8,
    pub reset_status: u8,
}

impl StatusWord {
    /// Decode the first two MISO bytes of a transaction.
    ///
    /// Returns `None` when fewer than two bytes were clocked out.
    pub fn decode(miso: &[u8]) -> Option<Self> {
        let (stat1, stat2) = match miso {
            [stat1, stat2, ..] => (*stat1, *stat2),
            _ => return None,
        };

        Some(Self {
            int_active: stat1 & 0b1 != 0,
            cmd_status: CommandStatus::from((stat1 >> 1) & 0x7),
            boot_loader: stat2 & 0b1 != 0,
            chip_mode: (stat2 >> 1) & 0x7,
            reset_status: (stat2 >> 4) & 0xF,
        })
    }

    /// Whether Stat2 reflects the current operating mode.
    ///
    /// On CMD_DAT responses the device is streaming data and the mode
    /// field carries nothing fresh.
    pub fn has_mode_telemetry(&self) -> bool {
        self.cmd_status != CommandStatus::Data
    }
}
