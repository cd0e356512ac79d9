//! Mode tracking
//!
//! Reconstructs the radio's operating-mode timeline from bus traffic:
//! - `tracker`: the mode state machine and its ordered transition rules
//! - `machine`: drives the tracker from the bus event stream
//! - `anomaly`: non-fatal diagnostics raised along the way

mod anomaly;
mod machine;
mod tracker;

pub use machine::{DecoderStatus, StateMachine};
