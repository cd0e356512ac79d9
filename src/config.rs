//! Configuration loading
//!
//! Settings come from the command line and the environment:
//! - first positional argument: capture file, `-` or absent for stdin
//! - `LR11XX_TRACE_FORMAT`: `text` (default) or `json`
//! - `LR11XX_TRACE_SOCKET`: serve intervals to viewers on this Unix socket
//! - `LR11XX_TRACE_LINGER`: `1` keeps serving after the capture ends

use std::path::PathBuf;

use anyhow::Result;

use crate::bus::CaptureSource;
use crate::events::OutputFormat;

pub const FORMAT_VAR: &str = "LR11XX_TRACE_FORMAT";
pub const SOCKET_VAR: &str = "LR11XX_TRACE_SOCKET";
pub const LINGER_VAR: &str = "LR11XX_TRACE_LINGER";

/// Decoder configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where bus events are read from
    pub capture: CaptureSource,

    /// Output line format for intervals
    pub format: OutputFormat,

    /// Path to the Unix domain socket for viewers, if serving
    pub socket_path: Option<PathBuf>,

    /// Keep serving viewers once the capture is decoded
    pub linger: bool,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown output format {0:?} in LR11XX_TRACE_FORMAT, expected \"text\" or \"json\"")]
    UnknownFormat(String),

    #[error("unexpected argument {0:?}")]
    UnexpectedArgument(String),
}

impl Config {
    /// Load configuration from the process arguments and environment
    pub fn load() -> Result<Self> {
        let config = Self::from_sources(std::env::args().skip(1), |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Build a configuration from explicit arguments and an environment lookup
    pub fn from_sources<I, F>(args: I, env: F) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut args = args.into_iter();
        let capture = match args.next() {
            None => CaptureSource::Stdin,
            Some(arg) if arg == "-" => CaptureSource::Stdin,
            Some(arg) if arg.starts_with('-') => return Err(ConfigError::UnexpectedArgument(arg)),
            Some(path) => CaptureSource::File(PathBuf::from(path)),
        };
        if let Some(extra) = args.next() {
            return Err(ConfigError::UnexpectedArgument(extra));
        }

        let format = match env(FORMAT_VAR) {
            Some(value) => value.parse().map_err(ConfigError::UnknownFormat)?,
            None => OutputFormat::default(),
        };

        let socket_path = env(SOCKET_VAR)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let linger = env(LINGER_VAR).is_some_and(|value| value == "1" || value == "true");

        Ok(Self {
            capture,
            format,
            socket_path,
            linger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(args(&[]), |_| None).unwrap();
        assert_eq!(config.capture, CaptureSource::Stdin);
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.socket_path, None);
        assert!(!config.linger);
    }

    #[test]
    fn test_capture_and_env() {
        let env = |key: &str| match key {
            FORMAT_VAR => Some("json".to_string()),
            SOCKET_VAR => Some("/tmp/trace.sock".to_string()),
            LINGER_VAR => Some("1".to_string()),
            _ => None,
        };

        let config = Config::from_sources(args(&["capture.jsonl"]), env).unwrap();
        assert_eq!(config.capture, CaptureSource::File(PathBuf::from("capture.jsonl")));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.socket_path, Some(PathBuf::from("/tmp/trace.sock")));
        assert!(config.linger);
    }

    #[test]
    fn test_dash_is_stdin() {
        let config = Config::from_sources(args(&["-"]), |_| None).unwrap();
        assert_eq!(config.capture, CaptureSource::Stdin);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(
            Config::from_sources(args(&["--verbose"]), |_| None),
            Err(ConfigError::UnexpectedArgument("--verbose".to_string()))
        );
        assert_eq!(
            Config::from_sources(args(&["a.jsonl", "b.jsonl"]), |_| None),
            Err(ConfigError::UnexpectedArgument("b.jsonl".to_string()))
        );
        assert_eq!(
            Config::from_sources(args(&[]), |key| (key == FORMAT_VAR).then(|| "csv".to_string())),
            Err(ConfigError::UnknownFormat("csv".to_string()))
        );
    }
}
