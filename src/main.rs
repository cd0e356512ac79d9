//! lr11xx-mode-trace: radio mode timeline from LR11xx SPI captures
//!
//! Reads decoded SPI bus events, reconstructs the radio's operating mode
//! over time and writes one line per completed mode interval:
//! - capture from a JSON Lines file or stdin
//! - intervals as aligned text or JSON Lines on stdout
//! - optional Unix socket for live timeline viewers

mod bus;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod radio;
mod state;

use anyhow::Result;
use tokio::io::BufWriter;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bus::CaptureReader;
use crate::config::Config;
use crate::events::{IntervalWriter, ModeInterval};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::state::{DecoderStatus, StateMachine};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries intervals
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "lr11xx-mode-trace starting"
    );

    let config = Config::load()?;
    info!(
        capture = %config.capture,
        format = ?config.format,
        socket_path = ?config.socket_path,
        linger = config.linger,
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    // Capture reader -> state machine
    let (bus_tx, bus_rx) = mpsc::channel(1024);
    // State machine -> output writer
    let (interval_tx, interval_rx) = mpsc::channel::<ModeInterval>(256);
    // Output writer -> subscribed viewers
    let (notify_tx, _) = broadcast::channel::<ModeInterval>(256);
    let (status_tx, status_rx) = watch::channel(DecoderStatus::default());

    let reader = CaptureReader::new(config.capture.clone(), bus_tx);
    let mut state_machine = StateMachine::new(status_tx);

    let server = match &config.socket_path {
        Some(path) => Some(Server::new(path, status_rx.clone(), notify_tx.clone())?),
        None => None,
    };

    let mut writer = IntervalWriter::new(BufWriter::new(tokio::io::stdout()), config.format);

    let decode = async {
        let (read_result, (), write_result) = tokio::join!(
            reader.run(),
            state_machine.run(bus_rx, interval_tx),
            async {
                // Owned here so a failed write also stops the decoder
                let mut interval_rx = interval_rx;
                while let Some(interval) = interval_rx.recv().await {
                    writer.write(&interval).await?;
                    // No subscribers is not an error
                    let _ = notify_tx.send(interval);
                }
                writer.flush().await
            }
        );

        // The writer failing stops the other two early, report it first
        write_result?;
        read_result?;
        anyhow::Ok(())
    };

    let serve = async {
        match &server {
            Some(server) => server.run().await,
            None => std::future::pending().await,
        }
    };

    info!("decoder initialized");

    let mut outcome = Ok(());

    tokio::select! {
        result = decode => {
            match result {
                Ok(()) => {
                    info!("capture decoded");
                    if let Some(server) = &server {
                        server.set_capture_complete().await;
                        if config.linger {
                            info!("lingering for viewers until shutdown");
                            tokio::select! {
                                result = server.run() => {
                                    if let Err(e) = result {
                                        error!(?e, "IPC server error");
                                        outcome = Err(e);
                                    }
                                }
                                _ = shutdown.wait() => {
                                    info!("shutdown signal received");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(?e, "decoding failed");
                    outcome = Err(e);
                }
            }
        }

        result = serve => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
                outcome = Err(e);
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
            // The decoder was dropped mid-capture and never logged its own
            status_rx.borrow().log_summary("decoder interrupted");
        }
    }

    if let Some(server) = &server {
        server.shutdown().await;
    }

    info!("lr11xx-mode-trace stopped");

    outcome
}
