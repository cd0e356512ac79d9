//! Per-transaction byte reassembly
//!
//! Collects the bytes clocked between an NSS falling edge and the next
//! rising edge into two parallel buffers.

use tracing::debug;

use super::Timestamp;

/// Bytes exchanged during one chip-select window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    /// Host to device
    pub mosi: Vec<u8>,
    /// Device to host, same length as `mosi`
    pub miso: Vec<u8>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// Bus events that arrived out of order
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SequenceError {
    #[error("byte clocked outside a chip-select window (mosi={mosi:#04x}, miso={miso:#04x})")]
    ByteOutsideTransaction { mosi: u8, miso: u8 },

    #[error("chip-select released at {time:.9} without being asserted")]
    EndWithoutBegin { time: Timestamp },

    #[error("chip-select asserted at {time:.9} inside an open transaction, {discarded} bytes dropped")]
    NestedBegin { time: Timestamp, discarded: usize },
}

/// Builds one [`Transaction`] at a time
#[derive(Debug, Default)]
pub struct TransactionAssembler {
    pending: Option<Transaction>,
}

impl TransactionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a chip-select window is currently open
    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Open a new transaction at the NSS falling edge.
    ///
    /// A transaction that was still open is discarded and reported.
    pub fn begin(&mut self, time: Timestamp) -> Result<(), SequenceError> {
        let previous = self.pending.replace(Transaction {
            start_time: time,
            ..Transaction::default()
        });

        match previous {
            Some(stale) => Err(SequenceError::NestedBegin {
                time,
                discarded: stale.mosi.len(),
            }),
            None => Ok(()),
        }
    }

    /// Append one byte pair in wire order
    pub fn push(&mut self, mosi: u8, miso: u8) -> Result<(), SequenceError> {
        let pending = self
            .pending
            .as_mut()
            .ok_or(SequenceError::ByteOutsideTransaction { mosi, miso })?;

        pending.mosi.push(mosi);
        pending.miso.push(miso);
        Ok(())
    }

    /// Close the transaction at the NSS rising edge and hand it over
    pub fn end(&mut self, time: Timestamp) -> Result<Transaction, SequenceError> {
        let mut transaction = self
            .pending
            .take()
            .ok_or(SequenceError::EndWithoutBegin { time })?;

        transaction.end_time = time;
        debug!(
            bytes = transaction.mosi.len(),
            start = transaction.start_time,
            end = time,
            "transaction complete"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembles_in_wire_order() {
        let mut assembler = TransactionAssembler::new();
        assembler.begin(1.0).unwrap();
        assembler.push(0x02, 0x00).unwrap();
        assembler.push(0x09, 0x08).unwrap();
        assembler.push(0xAA, 0x55).unwrap();

        let transaction = assembler.end(1.002).unwrap();
        assert_eq!(transaction.mosi, vec![0x02, 0x09, 0xAA]);
        assert_eq!(transaction.miso, vec![0x00, 0x08, 0x55]);
        assert_eq!(transaction.mosi.len(), transaction.miso.len());
        assert_eq!(transaction.start_time, 1.0);
        assert_eq!(transaction.end_time, 1.002);
        assert!(!assembler.is_open());
    }

    #[test]
    fn test_buffers_reset_between_transactions() {
        let mut assembler = TransactionAssembler::new();
        assembler.begin(0.0).unwrap();
        assembler.push(0x01, 0x02).unwrap();
        assembler.end(0.1).unwrap();

        assembler.begin(0.2).unwrap();
        let transaction = assembler.end(0.3).unwrap();
        assert!(transaction.mosi.is_empty());
        assert!(transaction.miso.is_empty());
    }

    #[test]
    fn test_byte_outside_window() {
        let mut assembler = TransactionAssembler::new();
        assert_eq!(
            assembler.push(0x12, 0x34),
            Err(SequenceError::ByteOutsideTransaction { mosi: 0x12, miso: 0x34 })
        );
        assert!(!assembler.is_open());
    }

    #[test]
    fn test_end_without_begin() {
        let mut assembler = TransactionAssembler::new();
        assert_eq!(
            assembler.end(2.0),
            Err(SequenceError::EndWithoutBegin { time: 2.0 })
        );
    }

    #[test]
    fn test_nested_begin_discards_partial() {
        let mut assembler = TransactionAssembler::new();
        assembler.begin(0.0).unwrap();
        assembler.push(0x01, 0x00).unwrap();
        assembler.push(0x1C, 0x00).unwrap();

        assert_eq!(
            assembler.begin(0.5),
            Err(SequenceError::NestedBegin { time: 0.5, discarded: 2 })
        );

        // the new window is open and empty
        assembler.push(0x02, 0x00).unwrap();
        let transaction = assembler.end(0.6).unwrap();
        assert_eq!(transaction.mosi, vec![0x02]);
        assert_eq!(transaction.start_time, 0.5);
    }
}
