//! Unix domain socket server for IPC
//!
//! Serves decoder status on request and pushes emitted intervals to
//! subscribed timeline viewers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::ModeInterval;
use crate::state::DecoderStatus;

use super::protocol::{Notification, Request, Response, TraceStatus};

/// Largest accepted request body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling viewer connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    status_rx: watch::Receiver<DecoderStatus>,
    /// Intervals fanned out to subscribed viewers
    interval_tx: broadcast::Sender<ModeInterval>,
}

/// Shared server state
struct ServerState {
    start_time: std::time::Instant,
    capture_complete: bool,
}

/// What a client handler needs from the server
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    status_rx: watch::Receiver<DecoderStatus>,
    interval_tx: broadcast::Sender<ModeInterval>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        status_rx: watch::Receiver<DecoderStatus>,
        interval_tx: broadcast::Sender<ModeInterval>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            start_time: std::time::Instant::now(),
            capture_complete: false,
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            status_rx,
            interval_tx,
        })
    }

    /// Mark the capture as fully decoded
    pub async fn set_capture_complete(&self) {
        self.state.write().await.capture_complete = true;
        info!("IPC server: capture complete");
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = ClientContext {
                        state: Arc::clone(&self.state),
                        status_rx: self.status_rx.clone(),
                        interval_tx: self.interval_tx.clone(),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, context: ClientContext) -> Result<()> {
        let (mut read_half, mut write_half) = stream.into_split();

        // Reads run on their own task so a half-read request is never
        // dropped when a notification is sent.
        let (request_tx, mut request_rx) = mpsc::channel::<Vec<u8>>(8);
        let reader = tokio::spawn(async move {
            loop {
                match read_message(&mut read_half).await {
                    Ok(Some(body)) => {
                        if request_tx.send(body).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(?e, "failed to read client message");
                        break;
                    }
                }
            }
        });

        let mut subscription: Option<broadcast::Receiver<ModeInterval>> = None;

        let result = loop {
            tokio::select! {
                body = request_rx.recv() => {
                    let Some(body) = body else {
                        debug!("client disconnected");
                        break Ok(());
                    };

                    let response = match serde_json::from_slice::<Request>(&body) {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if matches!(request, Request::Subscribe) && subscription.is_none() {
                                subscription = Some(context.interval_tx.subscribe());
                                debug!("client subscribed to intervals");
                            }
                            Self::process_request(request, &context).await
                        }
                        Err(e) => Response::Error {
                            code: "invalid_request".to_string(),
                            message: e.to_string(),
                        },
                    };

                    if let Err(e) = send_message(&mut write_half, &response).await {
                        break Err(e);
                    }
                }

                notification = next_interval(&mut subscription) => {
                    match notification {
                        Ok(interval) => {
                            let notification = Notification::Interval(interval);
                            if let Err(e) = send_message(&mut write_half, &notification).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "viewer lagged, intervals dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            subscription = None;
                        }
                    }
                }
            }
        };

        reader.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &ClientContext) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let decoder = context.status_rx.borrow().clone();
                let state = context.state.read().await;
                Response::Status(TraceStatus {
                    decoder,
                    capture_complete: state.capture_complete,
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    ..TraceStatus::default()
                })
            }

            Request::Subscribe => Response::Subscribed,
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Wait for the next interval, or forever when not subscribed
async fn next_interval(
    subscription: &mut Option<broadcast::Receiver<ModeInterval>>,
) -> Result<ModeInterval, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed message body. `None` on clean disconnect.
async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];

    // Read message length (4-byte little-endian)
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_MESSAGE_LEN, "message too large: {len} bytes");

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
