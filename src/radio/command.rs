//! Host command classification
//!
//! Opcodes are the first two MOSI bytes, big-endian. Only the commands
//! that affect the operating mode are recognised; everything else is
//! carried through as a bare opcode.

use super::{DecodeError, RadioMode};

pub const SET_RX: u16 = 0x0209;
pub const SET_TX: u16 = 0x020A;
pub const SET_STANDBY: u16 = 0x011C;
pub const SET_SLEEP: u16 = 0x011B;
pub const SET_DIO_IRQ_PARAMS: u16 = 0x0113;
pub const GNSS_SCAN: u16 = 0x040B;
pub const WIFI_SCAN_TIME_LIMIT: u16 = 0x0301;

/// Oscillator selected by SetStandby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandbyConfig {
    Rc,
    Xosc,
}

impl TryFrom<u8> for StandbyConfig {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rc),
            1 => Ok(Self::Xosc),
            invalid => Err(DecodeError::UnknownStandbyConfig(invalid)),
        }
    }
}

/// SetSleep configuration byte
///
/// - Bit 0: retain RAM/config across sleep
/// - Bit 1: wake up on RTC timeout
/// - Bits 7:2: reserved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SleepConfig {
    pub retention: bool,
    pub rtc_wakeup: bool,
}

impl From<u8> for SleepConfig {
    fn from(value: u8) -> Self {
        Self {
            retention: value & 0b01 != 0,
            rtc_wakeup: value & 0b10 != 0,
        }
    }
}

impl SleepConfig {
    /// Space-terminated tokens describing the sleep flags, empty when neither is set
    pub fn tokens(&self) -> String {
        let mut tokens = String::new();
        if self.retention {
            tokens.push_str("retention ");
        }
        if self.rtc_wakeup {
            tokens.push_str("rtc-wakeup ");
        }
        tokens
    }
}

/// A recognised host command, with whatever argument the decoder needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetRx,
    SetTx,
    SetStandby(StandbyConfig),
    SetSleep(SleepConfig),
    SetDioIrqParams,
    GnssScan,
    WifiScanTimeLimit,
}

impl Command {
    fn parse(opcode: u16, args: &[u8]) -> Result<Option<Self>, DecodeError> {
        let command = match opcode {
            SET_RX => Self::SetRx,
            SET_TX => Self::SetTx,
            SET_STANDBY => {
                let cfg = args
                    .first()
                    .ok_or(DecodeError::MissingArgument("setStandby"))?;
                Self::SetStandby(StandbyConfig::try_from(*cfg)?)
            }
            SET_SLEEP => {
                let cfg = args
                    .first()
                    .ok_or(DecodeError::MissingArgument("setSleep"))?;
                Self::SetSleep(SleepConfig::from(*cfg))
            }
            SET_DIO_IRQ_PARAMS => Self::SetDioIrqParams,
            GNSS_SCAN => Self::GnssScan,
            WIFI_SCAN_TIME_LIMIT => Self::WifiScanTimeLimit,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Name shown in interval text, e.g. `cmd=setRx`
    pub fn display_name(&self) -> &'static str {
        match self {
            Command::SetRx => "setRx",
            Command::SetTx => "setTx",
            Command::SetStandby(_) => "setStandby",
            Command::SetSleep(_) => "setSleep",
            Command::SetDioIrqParams => "setDioIrqParams",
            Command::GnssScan => "GnssScan",
            Command::WifiScanTimeLimit => "WifiScanTimeLimit",
        }
    }

    /// Mode the host is asking the radio to enter, if any
    pub fn requested_mode(&self) -> Option<RadioMode> {
        match self {
            Command::SetRx => Some(RadioMode::Rx),
            Command::SetTx => Some(RadioMode::Tx),
            Command::SetStandby(StandbyConfig::Rc) => Some(RadioMode::StandbyRc),
            Command::SetStandby(StandbyConfig::Xosc) => Some(RadioMode::StandbyXosc),
            Command::SetSleep(_) => Some(RadioMode::Sleep),
            Command::GnssScan | Command::WifiScanTimeLimit => Some(RadioMode::Sniff),
            Command::SetDioIrqParams => None,
        }
    }
}

/// The host side of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRequest {
    pub opcode: u16,
    /// `None` for opcodes the decoder does not track
    pub command: Option<Command>,
}

impl CommandRequest {
    pub fn requested_mode(&self) -> Option<RadioMode> {
        self.command.and_then(|command| command.requested_mode())
    }
}

/// Classify the MOSI bytes of a transaction.
///
/// Returns `Ok(None)` when there are not enough bytes for an opcode.
pub fn classify(mosi: &[u8]) -> Result<Option<CommandRequest>, DecodeError> {
    let (opcode, args) = match mosi {
        [hi, lo, args @ ..] => (u16::from_be_bytes([*hi, *lo]), args),
        _ => return Ok(None),
    };

    let command = Command::parse(opcode, args)?;
    Ok(Some(CommandRequest { opcode, command }))
}
