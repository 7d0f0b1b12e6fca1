//! hostctl: a remotely-scriptable control plane for a host application.
//!
//! Controllers connect over a Unix socket, send plain-text commands and
//! receive broadcast events:
//!
//! ```text
//! controller ── "set zoom_level = 0.25\n" ──► daemon
//! controller ◄── "EVENT [inst] VARIABLE_SET zoom_level float 0.250000\n" ── daemon
//! ```
//!
//! The core is [`Session`]: command parsing and dispatch, `@` expansion, the
//! typed [`variables::VariableRegistry`] and the [`channels::ChannelRegistry`]
//! broadcaster. [`daemon`] and [`socket`] put it on a tokio event loop.

pub mod channels;
pub mod client;
pub mod commands;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod error;
pub mod events;
pub mod expand;
pub mod lua;
pub mod session;
pub mod shell;
pub mod socket;
pub mod ui;
pub mod variables;

pub use config::Config;
pub use error::CommandError;
pub use events::Event;
pub use session::Session;
