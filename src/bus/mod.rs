//! Bus side of the decoder
//!
//! Turns the SPI framer's event stream into complete transactions:
//! - `event`: the framer's frame types
//! - `assembler`: NSS-delimited byte reassembly
//! - `reader`: JSON Lines capture input

mod assembler;
mod event;
mod reader;

pub use assembler::{SequenceError, Transaction, TransactionAssembler};
pub use event::{BusEvent, Timestamp};
pub use reader::{CaptureReader, CaptureSource};
