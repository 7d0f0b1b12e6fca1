//! Channel registry and event broadcaster.
//!
//! Tracks every connected controller and fans event lines out to them.
//!
//! # Lifecycle
//!
//! ```text
//! register() ──► Connecting ──activate()──► Active ──unregister()/write error──► Closed (removed)
//! ```
//!
//! Only `Active` channels receive broadcasts. A `Connecting` channel can be
//! written to directly with [`ChannelRegistry::send_to`] (handshake).
//!
//! # Broadcast snapshot
//!
//! [`ChannelRegistry::broadcast`] copies the list of active channels before
//! writing. Channels that fail during the write are removed from the master
//! list after the loop, never from the snapshot being iterated, so every
//! channel present at the start gets exactly one attempt.

use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a channel within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocate a fresh id from a process-wide counter.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan:{}", self.0)
    }
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Accepted, not yet receiving broadcasts.
    Connecting,
    /// Receiving broadcasts.
    Active,
    /// Removed from the registry.
    Closed,
}

/// Channel write failure.
#[derive(Debug)]
pub enum ChannelError {
    /// The underlying write failed.
    WriteFailed(std::io::Error),
    /// The peer or its writer task is gone.
    Closed,
    /// No channel with this id is registered.
    NotFound(ChannelId),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed(e) => write!(f, "Write failed: {e}"),
            Self::Closed => write!(f, "Channel closed"),
            Self::NotFound(id) => write!(f, "No such channel: {id}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Write side of a channel: accepts complete, newline-terminated lines.
pub trait LineSink: fmt::Debug {
    /// Deliver one line. An error means the channel is unusable.
    fn send_line(&self, line: &str) -> Result<(), ChannelError>;
}

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Channels the line was handed to.
    pub delivered: usize,
    /// Channels removed because the write failed.
    pub dropped: Vec<ChannelId>,
}

#[derive(Debug)]
struct Entry {
    id: ChannelId,
    state: ChannelState,
    sink: Rc<dyn LineSink>,
}

/// Connected channels in registration order.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    entries: Vec<Entry>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel in `Connecting` state. An existing entry with the same
    /// id is replaced.
    pub fn register(&mut self, id: ChannelId, sink: Rc<dyn LineSink>) {
        self.entries.retain(|e| e.id != id);
        self.entries.push(Entry {
            id,
            state: ChannelState::Connecting,
            sink,
        });
        log::debug!("[Channels] Registered {} ({} total)", id, self.entries.len());
    }

    /// Move a channel to `Active`. Returns `false` if unknown.
    pub fn activate(&mut self, id: ChannelId) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.state = ChannelState::Active;
                true
            }
            None => false,
        }
    }

    /// Register and immediately activate.
    pub fn register_active(&mut self, id: ChannelId, sink: Rc<dyn LineSink>) {
        self.register(id, sink);
        self.activate(id);
    }

    /// Remove a channel. Returns the sink if it was registered.
    pub fn unregister(&mut self, id: ChannelId) -> Option<Rc<dyn LineSink>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(pos);
        log::debug!("[Channels] Unregistered {} ({} left)", id, self.entries.len());
        Some(entry.sink)
    }

    /// Current state; unknown ids report `Closed`.
    pub fn state(&self, id: ChannelId) -> ChannelState {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map_or(ChannelState::Closed, |e| e.state)
    }

    /// Write one line to a single channel, removing it on failure.
    pub fn send_to(&mut self, id: ChannelId, line: &str) -> Result<(), ChannelError> {
        let sink = self
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| Rc::clone(&e.sink))
            .ok_or(ChannelError::NotFound(id))?;
        sink.send_line(line).inspect_err(|e| {
            log::warn!("[Channels] Dropping {} after write error: {e}", id);
            self.unregister(id);
        })
    }

    /// Ids and sinks of the channels currently receiving broadcasts.
    pub fn snapshot(&self) -> Vec<(ChannelId, Rc<dyn LineSink>)> {
        self.entries
            .iter()
            .filter(|e| e.state == ChannelState::Active)
            .map(|e| (e.id, Rc::clone(&e.sink)))
            .collect()
    }

    /// Write `line` to every active channel.
    ///
    /// A failing channel is removed and does not stop delivery to the rest.
    pub fn broadcast(&mut self, line: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (id, sink) in self.snapshot() {
            match sink.send_line(line) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!("[Broadcast] Write to {} failed: {e}", id);
                    report.dropped.push(id);
                }
            }
        }
        for id in &report.dropped {
            self.unregister(*id);
        }
        report
    }

    /// Number of registered channels in any state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if no channels are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<ChannelId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

/// Channel over any blocking writer, e.g. one end of a Unix socket pair.
#[derive(Debug)]
pub struct StreamChannel<W: Write + fmt::Debug> {
    writer: RefCell<W>,
}

impl<W: Write + fmt::Debug> StreamChannel<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }
}

impl<W: Write + fmt::Debug> LineSink for StreamChannel<W> {
    fn send_line(&self, line: &str) -> Result<(), ChannelError> {
        let mut writer = self.writer.borrow_mut();
        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(ChannelError::WriteFailed)
    }
}
