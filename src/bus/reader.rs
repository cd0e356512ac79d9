//! Capture reader
//!
//! Streams a capture exported by the SPI framer, one JSON-encoded
//! [`BusEvent`] per line, into the decoder's input channel. Events are
//! forwarded strictly in file order; the bounded channel applies
//! back-pressure when the decoder falls behind.

use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::BusEvent;

/// Where the capture comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Stdin,
    File(PathBuf),
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureSource::Stdin => write!(f, "<stdin>"),
            CaptureSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Errors that end a capture read early
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open capture {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read capture at line {line}: {source}")]
    Read {
        line: usize,
        source: std::io::Error,
    },
}

/// Totals for one capture read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub lines: usize,
    pub events: usize,
    /// Lines that did not parse as a bus event
    pub skipped: usize,
}

/// Feeds bus events from a capture into the decoder
pub struct CaptureReader {
    source: CaptureSource,
    event_tx: mpsc::Sender<BusEvent>,
}

impl CaptureReader {
    pub fn new(source: CaptureSource, event_tx: mpsc::Sender<BusEvent>) -> Self {
        Self { source, event_tx }
    }

    /// Read the whole capture, then drop the sender so the decoder sees
    /// the end of the stream
    pub async fn run(self) -> Result<CaptureStats, CaptureError> {
        info!(source = %self.source, "reading capture");

        let stats = match &self.source {
            CaptureSource::Stdin => {
                read_events(BufReader::new(tokio::io::stdin()), &self.event_tx).await?
            }
            CaptureSource::File(path) => {
                let file = File::open(path).await.map_err(|source| CaptureError::Open {
                    path: path.clone(),
                    source,
                })?;
                read_events(BufReader::new(file), &self.event_tx).await?
            }
        };

        info!(
            lines = stats.lines,
            events = stats.events,
            skipped = stats.skipped,
            "capture read complete"
        );
        Ok(stats)
    }
}

/// Parse JSON lines from `reader` and forward each event in order.
///
/// Blank lines and `#` comments are ignored. Stops early, without error,
/// if the receiving side has gone away.
pub async fn read_events<R>(
    reader: R,
    event_tx: &mpsc::Sender<BusEvent>,
) -> Result<CaptureStats, CaptureError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = CaptureStats::default();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(source) => {
                return Err(CaptureError::Read {
                    line: stats.lines + 1,
                    source,
                })
            }
        };
        stats.lines += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event = match serde_json::from_str::<BusEvent>(trimmed) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = stats.lines, error = %e, "skipping unparseable capture line");
                stats.skipped += 1;
                continue;
            }
        };

        if event_tx.send(event).await.is_err() {
            debug!("decoder input closed, stopping capture read");
            break;
        }
        stats.events += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_events_in_order() {
        let capture = b"# exported capture\n\
            {\"type\":\"enable\",\"time\":0.0}\n\
            \n\
            {\"type\":\"result\",\"mosi\":2,\"miso\":0}\n\
            not json\n\
            {\"type\":\"disable\",\"time\":0.001}\n";

        let (tx, mut rx) = mpsc::channel(16);
        let stats = read_events(&capture[..], &tx).await.unwrap();
        drop(tx);

        assert_eq!(
            stats,
            CaptureStats {
                lines: 6,
                events: 3,
                skipped: 1,
            }
        );

        assert_eq!(rx.recv().await, Some(BusEvent::Enable { time: 0.0 }));
        assert_eq!(rx.recv().await, Some(BusEvent::Result { mosi: 2, miso: 0 }));
        assert_eq!(rx.recv().await, Some(BusEvent::Disable { time: 0.001 }));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stops_when_decoder_gone() {
        let capture = b"{\"type\":\"error\"}\n{\"type\":\"error\"}\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let stats = read_events(&capture[..], &tx).await.unwrap();
        assert_eq!(stats.events, 0);
        assert_eq!(stats.lines, 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (tx, _rx) = mpsc::channel(1);
        let reader = CaptureReader::new(
            CaptureSource::File(PathBuf::from("/nonexistent/capture.jsonl")),
            tx,
        );
        assert!(matches!(reader.run().await, Err(CaptureError::Open { .. })));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(CaptureSource::Stdin.to_string(), "<stdin>");
        assert_eq!(
            CaptureSource::File(PathBuf::from("trace.jsonl")).to_string(),
            "trace.jsonl"
        );
    }
}
