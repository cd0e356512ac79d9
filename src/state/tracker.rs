//! Radio operating-mode tracker
//!
//! Infers the radio's operating mode from the host commands and the
//! status words the device returns, and closes out an interval each time
//! the mode changes. Two clocks drive it: the NSS falling edge (the device
//! is about to answer) and the end of each complete transaction.
//!
//! Per transaction with a usable status word, rules run in this order,
//! and the order matters:
//! 1. The device left a self-terminating mode on its own (FS, RX, TX,
//!    STBY_XOSC, SNIFF)
//! 2. The host commanded a new mode; this wins and ends the step
//! 3. The device left STBY_RC on its own
//! 4. STBY_XOSC left without step 1 noticing
//! 5. First status ever seen starts the timeline
//! 6. The mode is resynchronised to the reported chip mode

use tracing::debug;

use crate::bus::{Timestamp, Transaction};
use crate::events::{IntervalLabel, ModeInterval};
use crate::radio::{self, Command, RadioMode, SleepConfig, StatusWord};

use super::anomaly::{Anomaly, AnomalyCounts};

/// Start time of a mode that has not been observed yet
const UNSET: Timestamp = 0.0;

/// Everything the decoder believes about the radio
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModeTrackerState {
    pub current_mode: RadioMode,
    /// When `current_mode` began
    pub mode_started_at: Timestamp,
    /// Latched by the last SetSleep, consumed by the matching `sleepEnd`
    pub sleep_config: SleepConfig,
}

impl ModeTrackerState {
    /// Close the current mode at `end` and start the next stretch there
    fn close(
        &mut self,
        label: IntervalLabel,
        end: Timestamp,
        prefix: &str,
        suffix: &str,
    ) -> ModeInterval {
        let interval = ModeInterval::new(label, self.mode_started_at, end, prefix, suffix);
        self.mode_started_at = end;
        interval
    }

    fn enter(&mut self, mode: RadioMode, at: Timestamp) {
        debug!(from = %self.current_mode, to = %mode, at, "mode change");
        self.current_mode = mode;
        self.mode_started_at = at;
    }

    /// Rule 1: the device dropped out of a mode it leaves by itself
    fn autonomous_exit(&mut self, chip_mode: u8, nss_fall_time: Timestamp) -> Option<ModeInterval> {
        let expected = self.current_mode.expected_chip_mode()?;
        if chip_mode == expected {
            return None;
        }

        let (label, prefix) = match self.current_mode {
            RadioMode::FreqSynth => (IntervalLabel::FsEnd, "FS "),
            RadioMode::Rx => (IntervalLabel::RxEnd, "RX "),
            RadioMode::Tx => (IntervalLabel::TxEnd, "TX "),
            RadioMode::StandbyXosc => (IntervalLabel::StbyXosc, "STBY_XOSC "),
            RadioMode::Sniff => (IntervalLabel::SniffEnd, "SNIFF "),
            _ => return None,
        };
        Some(self.close(label, nss_fall_time, prefix, ""))
    }

    /// Rule 2: the host asked for `requested`
    fn enter_commanded(
        &mut self,
        command: Command,
        requested: RadioMode,
        end_time: Timestamp,
        transaction: u64,
        anomalies: &mut AnomalyCounts,
    ) -> Option<ModeInterval> {
        let suffix = format!(" cmd={}", command.display_name());

        let closed = match self.current_mode {
            RadioMode::StandbyXosc => {
                Some(self.close(IntervalLabel::StbyXosc, end_time, "STBY_XOSC ", &suffix))
            }
            RadioMode::StandbyRc => {
                Some(self.close(IntervalLabel::StbyRc, end_time, "STBY_RC ", &suffix))
            }
            RadioMode::FreqSynth => Some(self.close(IntervalLabel::Fs, end_time, "FS ", &suffix)),
            RadioMode::Rx => Some(self.close(IntervalLabel::RxEnd, end_time, "RX ", &suffix)),
            RadioMode::Wakeup => Some(self.close(
                IntervalLabel::WakeB,
                end_time,
                "___ cmd-stdby-wake ___",
                "",
            )),
            mode => {
                anomalies.record(Anomaly::UnhandledTransition {
                    command: command.display_name(),
                    mode,
                    transaction,
                });
                None
            }
        };

        if let Command::SetSleep(config) = command {
            self.sleep_config = config;
        }
        self.enter(requested, end_time);
        closed
    }

    /// Rule 3: the device left STBY_RC by itself
    fn standby_rc_exit(
        &mut self,
        chip_mode: u8,
        nss_fall_time: Timestamp,
        anomalies: &mut AnomalyCounts,
    ) -> Option<ModeInterval> {
        if self.current_mode != RadioMode::StandbyRc || chip_mode == 1 {
            return None;
        }

        if self.mode_started_at == UNSET {
            anomalies.record(Anomaly::StandbyRcExitUnsetStart);
            // nothing to close, but the next stretch still starts here
            self.mode_started_at = nss_fall_time;
            return None;
        }
        Some(self.close(IntervalLabel::StbyRc, nss_fall_time, "STBY_RC ", ""))
    }

    /// Rule 4: STBY_XOSC left without rule 1 closing it
    fn standby_xosc_reentry(&mut self, chip_mode: u8, nss_fall_time: Timestamp) {
        if self.current_mode == RadioMode::StandbyXosc && chip_mode != 2 {
            self.mode_started_at = nss_fall_time;
        }
    }

    /// Rule 5: nothing to close yet, start the timeline here
    fn startup(&mut self, nss_fall_time: Timestamp) {
        if self.current_mode == RadioMode::None {
            debug!(at = nss_fall_time, "first status observed, timeline starts");
            self.mode_started_at = nss_fall_time;
        }
    }

    /// Rule 6: trust what the device says it is doing
    fn resync(&mut self, chip_mode: u8, anomalies: &mut AnomalyCounts) {
        match RadioMode::from_chip_mode(chip_mode) {
            Ok(mode) if mode != self.current_mode => {
                debug!(from = %self.current_mode, to = %mode, "resync to chip mode");
                self.current_mode = mode;
            }
            Ok(_) => {}
            Err(e) => anomalies.record(e),
        }
    }
}

/// Drives [`ModeTrackerState`] from NSS edges and completed transactions
#[derive(Debug, Default)]
pub struct ModeTracker {
    state: ModeTrackerState,
    /// Last NSS falling edge
    nss_fall_time: Timestamp,
    transactions: u64,
    last_status: Option<StatusWord>,
    anomalies: AnomalyCounts,
}

impl ModeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ModeTrackerState {
        &self.state
    }

    /// Completed transactions seen so far
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    pub fn last_status(&self) -> Option<StatusWord> {
        self.last_status
    }

    pub fn anomalies(&self) -> AnomalyCounts {
        self.anomalies
    }

    /// Log and count an anomaly found outside the tracker
    pub fn report(&mut self, anomaly: impl Into<Anomaly>) {
        self.anomalies.record(anomaly);
    }

    /// NSS falling edge
    pub fn on_begin(&mut self, time: Timestamp) -> Option<ModeInterval> {
        self.nss_fall_time = time;

        (self.state.current_mode == RadioMode::Wakeup)
            .then(|| self.state.close(IntervalLabel::WakeA, time, "wakeup ", ""))
    }

    /// A framing error from upstream; counted, state untouched
    pub fn on_framing_error(&mut self) {
        self.anomalies.record(Anomaly::Framing);
    }

    /// A complete transaction, at its NSS rising edge
    pub fn on_transaction(&mut self, transaction: &Transaction) -> Option<ModeInterval> {
        self.transactions += 1;

        match transaction.mosi.len() {
            0 => self.on_wake(),
            1..=2 => self.on_short_transaction(transaction.end_time),
            _ => self.on_command(transaction),
        }
    }

    /// NSS pulsed with no bytes: the host is waking the radio
    fn on_wake(&mut self) -> Option<ModeInterval> {
        let nss_fall_time = self.nss_fall_time;

        let interval = match self.state.current_mode {
            RadioMode::Sleep => {
                let config = std::mem::take(&mut self.state.sleep_config);
                let prefix = format!("SLEEP {}", config.tokens());
                Some(self.state.close(IntervalLabel::SleepEnd, nss_fall_time, &prefix, ""))
            }
            RadioMode::StandbyXosc => {
                self.anomalies.record(Anomaly::WakeFromStandbyXosc);
                Some(self.state.close(IntervalLabel::StbyXosc, nss_fall_time, "STBY_XOSC ", ""))
            }
            mode => {
                self.anomalies.record(Anomaly::WakeOutsideSleep(mode));
                None
            }
        };

        self.state.enter(RadioMode::Wakeup, nss_fall_time);
        interval
    }

    /// One or two bytes: an opcode at most, no Stat2 to look at
    fn on_short_transaction(&mut self, end_time: Timestamp) -> Option<ModeInterval> {
        (self.state.current_mode == RadioMode::Wakeup)
            .then(|| self.state.close(IntervalLabel::NdWake, end_time, "wake ", ""))
    }

    fn on_command(&mut self, transaction: &Transaction) -> Option<ModeInterval> {
        let nss_fall_time = self.nss_fall_time;

        let commanded = match radio::classify(&transaction.mosi) {
            Ok(Some(request)) => {
                debug!(
                    opcode = %format_args!("{:#06x}", request.opcode),
                    command = ?request.command,
                    "host command"
                );
                request.command.zip(request.requested_mode())
            }
            Ok(None) => None,
            Err(e) => {
                self.anomalies.record(e);
                None
            }
        };

        let decoded = StatusWord::decode(&transaction.miso);
        if decoded.is_some() {
            self.last_status = decoded;
        }
        let status = decoded.filter(StatusWord::has_mode_telemetry);

        let autonomous = status.and_then(|status| {
            self.state.autonomous_exit(status.chip_mode, nss_fall_time)
        });

        if let Some((command, requested)) = commanded {
            let closed = self.state.enter_commanded(
                command,
                requested,
                transaction.end_time,
                self.transactions,
                &mut self.anomalies,
            );
            return closed.or(autonomous);
        }

        let status = status?;
        let standby_rc = self
            .state
            .standby_rc_exit(status.chip_mode, nss_fall_time, &mut self.anomalies);
        self.state.standby_xosc_reentry(status.chip_mode, nss_fall_time);
        self.state.startup(nss_fall_time);
        self.state.resync(status.chip_mode, &mut self.anomalies);

        autonomous.or(standby_rc)
    }
}
