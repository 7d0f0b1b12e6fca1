//! Controller side of the control socket, used by `hostctl send` and
//! `hostctl listen`.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::constants::INSTANCE_START_EVENT;
use crate::events::Event;

async fn connect(socket: &Path) -> Result<UnixStream> {
    UnixStream::connect(socket)
        .await
        .with_context(|| format!("Failed to connect to {}", socket.display()))
}

fn is_greeting(line: &str) -> bool {
    Event::parse_line(line).is_some_and(|(_, event)| event.name() == INSTANCE_START_EVENT)
}

/// Send one command line and collect what arrives within `window`.
///
/// The `INSTANCE_START` greeting is dropped; replies and any broadcast
/// events caused by the command are returned in arrival order.
pub async fn send(socket: &Path, command: &str, window: Duration) -> Result<Vec<String>> {
    let (reader, mut writer) = connect(socket).await?.into_split();
    writer
        .write_all(format!("{}\n", command.trim_end()).as_bytes())
        .await
        .context("Failed to send command")?;

    let mut lines = BufReader::new(reader).lines();
    let deadline = tokio::time::Instant::now() + window;
    let mut received = Vec::new();

    loop {
        match tokio::time::timeout_at(deadline, lines.next_line()).await {
            Ok(Ok(Some(line))) if is_greeting(&line) => {}
            Ok(Ok(Some(line))) => received.push(line),
            Ok(Ok(None)) | Err(_) => break,
            Ok(Err(e)) => return Err(e).context("Failed to read reply"),
        }
    }
    Ok(received)
}

/// Copy every line from the socket to `out` until the daemon closes it.
pub async fn listen<W: Write>(socket: &Path, mut out: W) -> Result<()> {
    let stream = connect(socket).await?;
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read event")? {
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    log::info!("[Client] {} closed", socket.display());
    Ok(())
}
