//! Daemon event loop.
//!
//! Every background producer (accept loop, per-connection read tasks, the
//! stdin reader) sends a [`ControlEvent`] through one
//! `mpsc::UnboundedSender`. The loop owns the [`Session`] and handles one
//! event to completion before receiving the next, so command dispatch and
//! every registry mutation happen on a single thread.
//!
//! ```text
//! SocketServer ──ChannelConnected──┐
//! SocketClientConn ──ChannelLine──┤
//!                  ──ChannelClosed─┼──► run() ──► handle_event(&mut Session)
//! stdin reader ────StdinLine──────┘
//! ```
//!
//! Shutdown is signalled through an `AtomicBool` set by signal-hook and
//! polled on a short interval.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::channels::{ChannelId, LineSink};
use crate::config::Config;
use crate::constants::{SHUTDOWN_FLUSH_DELAY, SHUTDOWN_POLL_INTERVAL};
use crate::session::Session;
use crate::socket::{SocketClientConn, SocketServer};

/// Event delivered to the daemon loop.
#[derive(Debug)]
pub enum ControlEvent {
    /// A controller connected.
    ChannelConnected {
        /// Fresh channel id.
        id: ChannelId,
        /// Connection whose tasks are already running.
        conn: SocketClientConn,
    },
    /// A complete command line arrived on a channel.
    ChannelLine {
        /// Originating channel.
        id: ChannelId,
        /// Line without terminator.
        line: String,
    },
    /// A channel hit EOF or a read error.
    ChannelClosed {
        /// Closed channel.
        id: ChannelId,
    },
    /// A command line read from stdin.
    StdinLine(String),
    /// Stdin reached EOF.
    StdinClosed,
}

/// What the loop serves besides the session itself.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Control socket to bind.
    pub socket_path: PathBuf,
    /// Command file run once before accepting events.
    pub command_file: Option<PathBuf>,
    /// Dispatch lines from stdin.
    pub read_stdin: bool,
}

impl DaemonOptions {
    /// Options derived from `config`.
    pub fn from_config(config: &Config, command_file: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            socket_path: config.socket_path()?,
            command_file,
            read_stdin: config.read_stdin,
        })
    }
}

/// Run a daemon for `config` until SIGINT, SIGTERM or SIGHUP.
///
/// Builds a current-thread runtime; the session never leaves this thread.
pub fn serve(config: &Config, command_file: Option<PathBuf>) -> Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("Failed to register signal handler")?;
    }

    let options = DaemonOptions::from_config(config, command_file)?;
    let session = Session::from_config(config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    runtime.block_on(run(session, &options, shutdown))
}

/// Serve `session` until `shutdown` is set or every producer is gone.
///
/// Broadcasts `INSTANCE_EXIT` and removes the socket file on the way out.
pub async fn run(mut session: Session, options: &DaemonOptions, shutdown: Arc<AtomicBool>) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ControlEvent>();
    let server = SocketServer::start(options.socket_path.clone(), event_tx.clone())?;

    if let Some(path) = &options.command_file {
        load_command_file(&mut session, path)?;
    }

    let stdin_handle = options.read_stdin.then(|| spawn_stdin_reader(event_tx.clone()));
    drop(event_tx);

    log::info!(
        "[Daemon] Instance {} ready on {}",
        session.instance_name(),
        server.socket_path().display()
    );

    let mut poll = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => handle_event(&mut session, event),
                None => {
                    log::info!("[Daemon] All event producers gone");
                    break;
                }
            },
            _ = poll.tick() => {
                if shutdown.load(Ordering::Relaxed) {
                    log::info!("[Daemon] Shutdown requested");
                    break;
                }
            }
        }
    }

    if let Some(handle) = stdin_handle {
        handle.abort();
    }
    session.shutdown();
    server.shutdown();

    // Dropping the session closes every write queue; let the writers drain.
    drop(session);
    tokio::time::sleep(SHUTDOWN_FLUSH_DELAY).await;
    Ok(())
}

/// Apply one event to the session.
pub fn handle_event(session: &mut Session, event: ControlEvent) {
    match event {
        ControlEvent::ChannelConnected { id, conn } => {
            let sink: Rc<dyn LineSink> = Rc::new(conn);
            if let Err(e) = session.attach_channel(id, sink) {
                log::warn!("[Daemon] Handshake with {} failed: {e}", id);
            }
        }
        ControlEvent::ChannelLine { id, line } => {
            let mut result = String::new();
            match session.dispatch(&line, Some(&mut result)) {
                Ok(()) if !result.is_empty() => session.reply(id, &result),
                Ok(()) => {}
                Err(e) => log::warn!("[Dispatch] {}: {e}", id),
            }
        }
        ControlEvent::ChannelClosed { id } => session.detach_channel(id),
        ControlEvent::StdinLine(line) => {
            let mut result = String::new();
            match session.dispatch(&line, Some(&mut result)) {
                Ok(()) if !result.is_empty() => println!("{result}"),
                Ok(()) => {}
                Err(e) => log::warn!("[Dispatch] stdin: {e}"),
            }
        }
        ControlEvent::StdinClosed => log::info!("[Daemon] Stdin closed"),
    }
}

/// Dispatch every command in `path`.
///
/// Blank lines and lines starting with `#` are skipped. A failing command
/// is logged and does not stop the rest. Returns the number of commands run.
pub fn load_command_file(session: &mut Session, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read command file: {}", path.display()))?;

    let mut count = 0;
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        count += 1;
        if let Err(e) = session.dispatch(line, None) {
            log::warn!("[Daemon] {}:{}: {e}", path.display(), index + 1);
        }
    }

    log::info!("[Daemon] Ran {} command(s) from {}", count, path.display());
    Ok(count)
}

fn spawn_stdin_reader(event_tx: UnboundedSender<ControlEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if event_tx.send(ControlEvent::StdinLine(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = event_tx.send(ControlEvent::StdinClosed);
                    break;
                }
                Err(e) => {
                    log::error!("[Daemon] Stdin read error: {e}");
                    break;
                }
            }
        }
    })
}
