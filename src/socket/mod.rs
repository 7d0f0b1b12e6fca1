//! Unix domain socket transport for controllers.
//!
//! # Architecture
//!
//! ```text
//! Daemon process                         Controller (hostctl send/listen, socat, ...)
//! ┌─────────────────────┐                ┌──────────────────┐
//! │ SocketServer        │                │ UnixStream       │
//! │  UnixListener       │◄──────────────►│                  │
//! │  SocketClientConn   │  lines over    │                  │
//! │  per connection     │  Unix socket   │                  │
//! └─────────┬───────────┘                └──────────────────┘
//!           │ ControlEvent
//!           ▼
//!     daemon event loop ──► Session::dispatch / ChannelRegistry
//! ```
//!
//! See [`framing`] for the line codec.

pub mod client_conn;
pub mod framing;
pub mod server;

pub use client_conn::SocketClientConn;
pub use server::SocketServer;
