//! Unix domain socket server for accepting controller connections.
//!
//! Listens on a Unix socket and creates a [`SocketClientConn`] for each
//! accepted connection. Each connection is announced to the event loop via
//! [`ControlEvent::ChannelConnected`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::net::UnixListener;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::client_conn::SocketClientConn;
use crate::channels::ChannelId;
use crate::constants::MAX_SOCKET_PATH;
use crate::daemon::ControlEvent;

/// Control socket listener.
#[derive(Debug)]
pub struct SocketServer {
    socket_path: PathBuf,
    accept_handle: JoinHandle<()>,
}

impl SocketServer {
    /// Bind `socket_path` and spawn the accept loop.
    ///
    /// Removes any stale socket file, creates the parent directory and sets
    /// permissions to 0600.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is too long or the socket cannot be bound.
    pub fn start(socket_path: PathBuf, event_tx: UnboundedSender<ControlEvent>) -> Result<Self> {
        let path_len = socket_path.as_os_str().len();
        if path_len >= MAX_SOCKET_PATH {
            bail!(
                "Socket path too long ({path_len} bytes, max {}): {}",
                MAX_SOCKET_PATH - 1,
                socket_path.display()
            );
        }

        if socket_path.exists() {
            std::fs::remove_file(&socket_path).with_context(|| {
                format!("Failed to remove stale socket: {}", socket_path.display())
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let listener = std::os::unix::net::UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket: {}", socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        listener.set_nonblocking(true)?;
        let listener = UnixListener::from_std(listener)?;

        log::info!("[Socket] Listening on {}", socket_path.display());

        let accept_handle = tokio::spawn(Self::accept_loop(listener, event_tx, socket_path.clone()));

        Ok(Self {
            socket_path,
            accept_handle,
        })
    }

    async fn accept_loop(
        listener: UnixListener,
        event_tx: UnboundedSender<ControlEvent>,
        socket_path: PathBuf,
    ) {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let id = ChannelId::next();
                    log::info!("[Socket] Client connected: {}", id);

                    let conn = SocketClientConn::new(id, stream, event_tx.clone());
                    if event_tx.send(ControlEvent::ChannelConnected { id, conn }).is_err() {
                        log::warn!("[Socket] Event loop gone, stopping accept loop");
                        break;
                    }
                }
                Err(e) => {
                    if !socket_path.exists() {
                        log::info!("[Socket] Socket file removed, stopping accept loop");
                        break;
                    }
                    log::error!("[Socket] Accept error: {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Stop accepting and remove the socket file.
    pub fn shutdown(self) {
        self.accept_handle.abort();
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            log::debug!("[Socket] Could not remove {}: {e}", self.socket_path.display());
        }
    }

    /// Path to the socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}
