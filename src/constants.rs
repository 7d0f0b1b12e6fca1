//! Protocol and limit constants for hostctl.
//!
//! Centralizes the wire-format keywords and size limits shared by the
//! broadcaster, the socket transport, and the CLI client.

use std::time::Duration;

// ============================================================================
// Wire protocol
// ============================================================================

/// Leading keyword of every broadcast line.
pub const EVENT_KEYWORD: &str = "EVENT";

/// Event emitted after every successful variable mutation.
pub const VARIABLE_SET_EVENT: &str = "VARIABLE_SET";

/// Event sent directly to a channel before it joins broadcasts.
pub const INSTANCE_START_EVENT: &str = "INSTANCE_START";

/// Event broadcast to all channels on clean shutdown.
pub const INSTANCE_EXIT_EVENT: &str = "INSTANCE_EXIT";

/// Digits after the decimal point in the canonical form of a float variable.
pub const FLOAT_PRECISION: usize = 6;

// ============================================================================
// Limits
// ============================================================================

/// Maximum accepted length of a single command line on a socket (1 MB).
///
/// A peer that exceeds this without sending a newline is disconnected.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Deepest chain of commands run from inside other commands (`js` calling
/// `Host.run`, `@<...>@` expansion).
pub const MAX_DISPATCH_DEPTH: usize = 16;

/// Unix socket path limit (`sun_path` is 104 bytes on macOS, 108 on Linux).
pub const MAX_SOCKET_PATH: usize = 104;

/// How long `hostctl send` waits for reply lines before exiting.
pub const SEND_REPLY_WINDOW: Duration = Duration::from_millis(500);

// ============================================================================
// Daemon timing
// ============================================================================

/// How often the event loop checks the signal-driven shutdown flag.
pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time given to connection writers to flush `INSTANCE_EXIT` before exit.
pub const SHUTDOWN_FLUSH_DELAY: Duration = Duration::from_millis(50);
