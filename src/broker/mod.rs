//! Broker daemon: telephony facade over a Unix socket.
//!
//! The broker listens on a Unix domain socket, runs scripting commands
//! against the telephony platform, and streams translated state events
//! to the clients that asked to track them.
//!
//! Architecture: channel-based actor. A single broker loop owns all
//! mutable state ([`state::BrokerState`]) and makes every platform
//! call. Per-connection tasks forward requests via mpsc channels and
//! drain their connection's outbound event queue.

mod connection;
mod handler;
pub mod registry;
pub mod sink;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use connection::{BrokerCommand, DisconnectNotice};
use state::{BrokerState, ConnectionId};

use crate::telephony::TelephonyPlatform;

/// Broker startup/runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("broker already running at {0}")]
    AlreadyRunning(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    MkdirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to bind socket {path}: {source}")]
    BindFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the broker daemon until SIGTERM or SIGINT.
///
/// Listens on `socket_path`, or `$XDG_RUNTIME_DIR/telefacade/facade.sock`
/// when none is given. A socket directory created here gets mode 0700; a
/// stale socket is removed, a live one is reported as
/// [`BrokerError::AlreadyRunning`]. All session state is in-memory and
/// the socket file is removed on shutdown.
pub async fn run(
    socket_path: Option<PathBuf>,
    platform: Arc<dyn TelephonyPlatform>,
) -> Result<(), BrokerError> {
    let socket_path = match socket_path {
        Some(path) => path,
        None => default_socket_path()?,
    };
    let listener = bind_socket(&socket_path).await?;

    tracing::info!(path = %socket_path.display(), "broker listening");

    // Graceful shutdown on SIGTERM or SIGINT.
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
        }
    };

    serve(&listener, platform, shutdown).await;

    drop(listener);
    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::warn!(error = %e, path = %socket_path.display(), "failed to remove socket");
    }

    tracing::info!("broker stopped");
    Ok(())
}

/// The broker loop. Returns when `shutdown` completes; every session
/// is closed and its listeners detached on the way out.
async fn serve(
    listener: &UnixListener,
    platform: Arc<dyn TelephonyPlatform>,
    shutdown: impl Future<Output = ()>,
) {
    // Channels for connection → broker communication.
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BrokerCommand>();
    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<DisconnectNotice>();

    let mut state = BrokerState::new(platform);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // -- New connection --
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        accept_connection(stream, &mut state, &cmd_tx, &disconnect_tx);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }

            // -- Command from connection task --
            Some(cmd) = cmd_rx.recv() => {
                let response = handler::handle_message(
                    &mut state,
                    cmd.request,
                    cmd.connection_id,
                );
                let _ = cmd.response_tx.send(response);
            }

            // -- Connection disconnected --
            Some(notice) = disconnect_rx.recv() => {
                let conn_id = notice.connection_id;
                state.remove_connection(conn_id);
                tracing::debug!(?conn_id, "connection cleaned up");
            }

            () = &mut shutdown => break,
        }
    }

    tracing::debug!(connections = state.connection_count(), "closing sessions");
}

/// Accept a new connection: create its event queue and spawn its task.
fn accept_connection(
    stream: UnixStream,
    state: &mut BrokerState,
    cmd_tx: &mpsc::UnboundedSender<BrokerCommand>,
    disconnect_tx: &mpsc::UnboundedSender<DisconnectNotice>,
) {
    let conn_id = ConnectionId::new();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    state.add_connection(conn_id, event_tx);

    connection::spawn_connection(
        stream,
        conn_id,
        cmd_tx.clone(),
        event_rx,
        disconnect_tx.clone(),
    );

    tracing::debug!(?conn_id, "accepted connection");
}

// -- Socket setup --

/// Default socket path under `$XDG_RUNTIME_DIR`.
pub fn default_socket_path() -> Result<PathBuf, BrokerError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").map_err(|_| BrokerError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir)
        .join("telefacade")
        .join("facade.sock"))
}

/// Create the socket directory and bind the Unix listener.
///
/// Handles stale socket detection: if EADDRINUSE, attempts to connect
/// to the existing socket. If the connection succeeds, another broker
/// is running. If it fails, the socket is stale and is removed.
async fn bind_socket(path: &Path) -> Result<UnixListener, BrokerError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // Only a directory created here is restricted; an existing one
    // (e.g. /tmp for `--socket /tmp/facade.sock`) keeps its mode.
    if !parent.exists() {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(parent)
            .map_err(|e| BrokerError::MkdirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    match UnixListener::bind(path) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            match UnixStream::connect(path).await {
                Ok(_) => Err(BrokerError::AlreadyRunning(path.to_path_buf())),
                Err(_) => {
                    tracing::info!(
                        path = %path.display(),
                        "removing stale socket"
                    );
                    std::fs::remove_file(path).map_err(|e| BrokerError::BindFailed {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                    UnixListener::bind(path).map_err(|e| BrokerError::BindFailed {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
            }
        }
        Err(e) => Err(BrokerError::BindFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
