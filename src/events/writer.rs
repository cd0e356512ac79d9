//! Interval output sink

use std::str::FromStr;

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::ModeInterval;

/// How intervals are written to the output stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// One aligned, human-readable line per interval
    #[default]
    Text,
    /// JSON Lines
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(other.to_string()),
        }
    }
}

/// Writes one line per interval
pub struct IntervalWriter<W> {
    out: W,
    format: OutputFormat,
}

impl<W: AsyncWrite + Unpin> IntervalWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    /// Write one line and flush it, so a consumer sees each interval as
    /// soon as it is decoded and nothing is held back on an early exit
    pub async fn write(&mut self, interval: &ModeInterval) -> Result<()> {
        let mut line = match self.format {
            OutputFormat::Text => interval.to_string(),
            OutputFormat::Json => serde_json::to_string(interval)?,
        };
        line.push('\n');

        self.out.write_all(line.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.out.flush().await?;
        Ok(())
    }
}
