//! Per-connection state for control socket clients (daemon side).
//!
//! Each accepted connection gets a `SocketClientConn` that owns a read task
//! (bytes → lines → [`ControlEvent::ChannelLine`]) and a write task (queued
//! lines → socket). The connection is the channel's [`LineSink`]: a closed
//! write queue is reported as [`ChannelError::Closed`], which removes the
//! channel from the registry.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::framing::LineDecoder;
use crate::channels::{ChannelError, ChannelId, LineSink};
use crate::daemon::ControlEvent;

/// Daemon-side connection state for a single controller.
pub struct SocketClientConn {
    id: ChannelId,
    /// Outgoing lines for the write task.
    line_tx: UnboundedSender<Vec<u8>>,
    read_handle: JoinHandle<()>,
    write_handle: JoinHandle<()>,
}

impl std::fmt::Debug for SocketClientConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClientConn")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SocketClientConn {
    /// Split `stream` and spawn its read and write tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(
        id: ChannelId,
        stream: UnixStream,
        event_tx: UnboundedSender<ControlEvent>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (line_tx, line_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let read_handle = tokio::spawn(Self::read_loop(id, read_half, event_tx));
        let write_handle = tokio::spawn(Self::write_loop(id, write_half, line_rx));

        Self {
            id,
            line_tx,
            read_handle,
            write_handle,
        }
    }

    /// Channel id of this connection.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    async fn read_loop(
        id: ChannelId,
        mut reader: OwnedReadHalf,
        event_tx: UnboundedSender<ControlEvent>,
    ) {
        let mut decoder = LineDecoder::new();
        let mut buf = [0u8; 8 * 1024];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    if let Some(line) = decoder.finish() {
                        let _ = event_tx.send(ControlEvent::ChannelLine { id, line });
                    }
                    log::info!("[Socket] Client disconnected: {}", id);
                    break;
                }
                Ok(n) => match decoder.feed(&buf[..n]) {
                    Ok(lines) => {
                        for line in lines {
                            if event_tx.send(ControlEvent::ChannelLine { id, line }).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        log::error!("[Socket] Decode error for {}: {e}", id);
                        break;
                    }
                },
                Err(e) => {
                    log::error!("[Socket] Read error for {}: {e}", id);
                    break;
                }
            }
        }

        let _ = event_tx.send(ControlEvent::ChannelClosed { id });
    }

    async fn write_loop(
        id: ChannelId,
        mut writer: OwnedWriteHalf,
        mut line_rx: UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(data) = line_rx.recv().await {
            if let Err(e) = writer.write_all(&data).await {
                log::error!("[Socket] Write error for {}: {e}", id);
                break;
            }
        }
    }
}

impl LineSink for SocketClientConn {
    fn send_line(&self, line: &str) -> Result<(), ChannelError> {
        if self.write_handle.is_finished() {
            return Err(ChannelError::Closed);
        }
        self.line_tx
            .send(line.as_bytes().to_vec())
            .map_err(|e| {
                log::debug!("[Socket] Write queue for {} closed: {e}", self.id);
                ChannelError::Closed
            })
    }
}

impl Drop for SocketClientConn {
    fn drop(&mut self) {
        self.read_handle.abort();
    }
}
