//! LR11xx protocol knowledge
//!
//! Everything the decoder knows about the radio's command set lives here:
//! - Status byte layout returned on the first two MISO bytes
//! - The handful of opcodes that change the operating mode
//! - The chip mode to operating mode mapping

mod command;
mod mode;
mod status;

pub use command::{classify, Command, SleepConfig};
pub use mode::RadioMode;
pub use status::StatusWord;

/// A field on the wire held a value outside its enumerated range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("SetStandby with unknown config byte {0:#04x}")]
    UnknownStandbyConfig(u8),

    #[error("unknown chip mode {0}")]
    UnknownChipMode(u8),

    #[error("{0} is missing its config byte")]
    MissingArgument(&'static str),
}
