//! Decoder driver
//!
//! Feeds bus events through the transaction assembler and the mode tracker,
//! strictly in arrival order, one event at a time.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bus::{BusEvent, Timestamp, TransactionAssembler};
use crate::events::ModeInterval;
use crate::radio::{RadioMode, StatusWord};

use super::anomaly::AnomalyCounts;
use super::tracker::ModeTracker;

/// Point-in-time view of the decoder, published after every transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoderStatus {
    pub mode: RadioMode,
    pub mode_started_at: Timestamp,
    pub transactions: u64,
    pub intervals: u64,
    pub anomalies: AnomalyCounts,
    pub last_status: Option<StatusWord>,
}

impl DecoderStatus {
    /// Log the decode totals, at the end of a capture or on shutdown
    pub fn log_summary(&self, message: &str) {
        info!(
            transactions = self.transactions,
            intervals = self.intervals,
            anomalies = self.anomalies.total(),
            sequencing = self.anomalies.sequencing,
            decode = self.anomalies.decode,
            state = self.anomalies.state,
            framing = self.anomalies.framing,
            mode = %self.mode,
            "{message}"
        );
    }
}

/// The decoder: bus events in, mode intervals out
pub struct StateMachine {
    assembler: TransactionAssembler,
    tracker: ModeTracker,
    /// Intervals emitted so far
    intervals: u64,
    status_tx: watch::Sender<DecoderStatus>,
}

impl StateMachine {
    pub fn new(status_tx: watch::Sender<DecoderStatus>) -> Self {
        Self {
            assembler: TransactionAssembler::new(),
            tracker: ModeTracker::new(),
            intervals: 0,
            status_tx,
        }
    }

    pub fn snapshot(&self) -> DecoderStatus {
        let state = self.tracker.state();
        DecoderStatus {
            mode: state.current_mode,
            mode_started_at: state.mode_started_at,
            transactions: self.tracker.transactions(),
            intervals: self.intervals,
            anomalies: self.tracker.anomalies(),
            last_status: self.tracker.last_status(),
        }
    }

    /// Decode events until the input channel closes
    pub async fn run(
        &mut self,
        mut bus_rx: mpsc::Receiver<BusEvent>,
        interval_tx: mpsc::Sender<ModeInterval>,
    ) {
        info!("decoder started");

        while let Some(event) = bus_rx.recv().await {
            let Some(interval) = self.handle_event(event) else {
                continue;
            };

            if interval_tx.send(interval).await.is_err() {
                warn!("interval consumer gone, stopping decoder");
                break;
            }
        }

        if self.assembler.is_open() {
            warn!("capture ended inside an open transaction");
        }

        self.snapshot().log_summary("decoder stopped");
    }

    /// Process one bus event to completion
    pub fn handle_event(&mut self, event: BusEvent) -> Option<ModeInterval> {
        let interval = match event {
            BusEvent::Enable { time } => {
                if let Err(e) = self.assembler.begin(time) {
                    self.tracker.report(e);
                }
                self.tracker.on_begin(time)
            }
            BusEvent::Result { mosi, miso } => {
                if let Err(e) = self.assembler.push(mosi, miso) {
                    self.tracker.report(e);
                }
                return None;
            }
            BusEvent::Disable { time } => match self.assembler.end(time) {
                Ok(transaction) => self.tracker.on_transaction(&transaction),
                Err(e) => {
                    self.tracker.report(e);
                    None
                }
            },
            BusEvent::Error => {
                self.tracker.on_framing_error();
                None
            }
        };

        if let Some(interval) = &interval {
            self.intervals += 1;
            debug!(
                label = %interval.label,
                start = interval.start,
                end = interval.end,
                duration_ms = interval.duration_ms(),
                text = %interval.text,
                "interval"
            );
        }

        self.status_tx.send_replace(self.snapshot());
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IntervalLabel;

    fn create_state_machine() -> (StateMachine, watch::Receiver<DecoderStatus>) {
        let (tx, rx) = watch::channel(DecoderStatus::default());
        (StateMachine::new(tx), rx)
    }

    fn transaction(begin: Timestamp, end: Timestamp, bytes: &[(u8, u8)]) -> Vec<BusEvent> {
        let mut events = vec![BusEvent::Enable { time: begin }];
        events.extend(
            bytes
                .iter()
                .map(|&(mosi, miso)| BusEvent::Result { mosi, miso }),
        );
        events.push(BusEvent::Disable { time: end });
        events
    }

    fn feed(sm: &mut StateMachine, events: &[BusEvent]) -> Vec<ModeInterval> {
        events
            .iter()
            .filter_map(|event| sm.handle_event(*event))
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let (sm, rx) = create_state_machine();
        assert_eq!(sm.snapshot().mode, RadioMode::None);
        assert_eq!(*rx.borrow(), DecoderStatus::default());
    }

    #[test]
    fn test_decodes_bus_events() {
        let (mut sm, rx) = create_state_machine();

        // GetStatus: device reports STBY_RC
        let mut events = transaction(0.5, 0.51, &[(0x01, 0x04), (0x00, 0x02), (0x00, 0x00), (0x00, 0x00)]);
        // SetRx
        events.extend(transaction(1.0, 1.01, &[(0x02, 0x04), (0x09, 0x02), (0x00, 0x00), (0x00, 0x00)]));
        // GetStatus: RX finished, back in STBY_RC
        events.extend(transaction(2.0, 2.01, &[(0x01, 0x04), (0x00, 0x02), (0x00, 0x00), (0x00, 0x00)]));

        let intervals = feed(&mut sm, &events);

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].label, IntervalLabel::StbyRc);
        assert_eq!((intervals[0].start, intervals[0].end), (0.5, 1.01));
        assert!(intervals[0].text.ends_with("cmd=setRx"));
        assert_eq!(intervals[1].label, IntervalLabel::RxEnd);
        assert_eq!((intervals[1].start, intervals[1].end), (1.01, 2.0));

        let status = rx.borrow().clone();
        assert_eq!(status.mode, RadioMode::StandbyRc);
        assert_eq!(status.mode_started_at, 2.0);
        assert_eq!(status.transactions, 3);
        assert_eq!(status.intervals, 2);
        assert_eq!(status.last_status.map(|s| s.chip_mode), Some(1));
    }

    #[test]
    fn test_byte_outside_transaction() {
        let (mut sm, _rx) = create_state_machine();

        let intervals = feed(
            &mut sm,
            &[
                BusEvent::Result { mosi: 0x01, miso: 0x00 },
                BusEvent::Disable { time: 0.1 },
            ],
        );

        assert!(intervals.is_empty());
        assert_eq!(sm.snapshot().anomalies.sequencing, 2);
        assert_eq!(sm.snapshot().transactions, 0);
    }

    #[test]
    fn test_framing_error_does_not_touch_mode() {
        let (mut sm, _rx) = create_state_machine();
        feed(&mut sm, &transaction(0.5, 0.51, &[(0x01, 0x04), (0x00, 0x08), (0x00, 0x00)]));
        let before = sm.snapshot();

        assert_eq!(sm.handle_event(BusEvent::Error), None);

        let after = sm.snapshot();
        assert_eq!(after.mode, before.mode);
        assert_eq!(after.mode_started_at, before.mode_started_at);
        assert_eq!(after.anomalies.framing, 1);
    }

    #[test]
    fn test_sleep_wake_cycle() {
        let (mut sm, _rx) = create_state_machine();

        let mut events = transaction(0.5, 0.51, &[(0x01, 0x04), (0x00, 0x02), (0x00, 0x00)]);
        // SetSleep with retention
        events.extend(transaction(1.0, 1.01, &[(0x01, 0x04), (0x1B, 0x02), (0x01, 0x00), (0x00, 0x00)]));
        // wake pulse
        events.extend(transaction(3.0, 3.0001, &[]));
        // SetStandby(RC) after wakeup
        events.extend(transaction(3.5, 3.51, &[(0x01, 0x04), (0x1C, 0x02), (0x00, 0x00)]));

        let labels: Vec<_> = feed(&mut sm, &events).into_iter().map(|i| i.label).collect();
        assert_eq!(
            labels,
            [
                IntervalLabel::StbyRc,
                IntervalLabel::SleepEnd,
                IntervalLabel::WakeA,
                IntervalLabel::WakeB,
            ]
        );
        assert_eq!(sm.snapshot().mode, RadioMode::StandbyRc);
    }

    #[test]
    fn test_run_forwards_intervals() {
        let (mut sm, rx) = create_state_machine();
        let (bus_tx, bus_rx) = mpsc::channel(64);
        let (interval_tx, mut interval_rx) = mpsc::channel(8);

        let mut events = transaction(0.5, 0.51, &[(0x01, 0x04), (0x00, 0x08), (0x00, 0x00)]);
        events.extend(transaction(1.0, 1.01, &[(0x01, 0x04), (0x00, 0x02), (0x00, 0x00)]));
        for event in events {
            bus_tx.try_send(event).unwrap();
        }
        drop(bus_tx);

        tokio_test::block_on(sm.run(bus_rx, interval_tx));

        let interval = interval_rx.try_recv().unwrap();
        assert_eq!(interval.label, IntervalLabel::RxEnd);
        assert_eq!((interval.start, interval.end), (0.5, 1.0));
        assert!(interval_rx.try_recv().is_err());
        assert_eq!(rx.borrow().transactions, 2);
    }

    #[tokio::test]
    async fn test_interrupted_run_keeps_published_status() {
        let (mut sm, rx) = create_state_machine();
        let (bus_tx, bus_rx) = mpsc::channel(64);
        let (interval_tx, mut interval_rx) = mpsc::channel(8);

        // GetStatus reporting STBY_RC, then SetRx; the capture stays open
        let mut events = transaction(0.5, 0.51, &[(0x01, 0x04), (0x00, 0x02), (0x00, 0x00), (0x00, 0x00)]);
        events.extend(transaction(1.0, 1.01, &[(0x02, 0x04), (0x09, 0x02), (0x00, 0x00), (0x00, 0x00)]));
        for event in events {
            bus_tx.try_send(event).unwrap();
        }

        let run = sm.run(bus_rx, interval_tx);
        let interrupted =
            tokio::time::timeout(std::time::Duration::from_millis(50), run).await;
        assert!(interrupted.is_err());

        let interval = interval_rx.try_recv().unwrap();
        assert_eq!(interval.label, IntervalLabel::StbyRc);
        assert!(interval.text.ends_with("cmd=setRx"));

        // what a shutdown summary reads once the run is dropped
        let status = rx.borrow().clone();
        assert_eq!(status.transactions, 2);
        assert_eq!(status.intervals, 1);
        assert_eq!(status.mode, RadioMode::Rx);
        assert_eq!(status.anomalies.total(), 0);
        drop(bus_tx);
    }
}
