//! Command table.
//!
//! Maps a lower-cased command name to a [`Handler`]. The table is built once
//! (usually [`CommandTable::builtin`]) and moved into the
//! [`Session`](crate::session::Session); there is no registration after that.
//!
//! # Handler contract
//!
//! A handler receives the session and the already-expanded argument string.
//! It may mutate state and emit events through the session, and returns an
//! optional synchronous result for the caller's result sink.
//!
//! | Command | Result | Events |
//! |---|---|---|
//! | `set <name> = <value>` | none | `VARIABLE_SET` on change |
//! | `event`/`request <name> <args...>` | none | `<NAME> <args...>` |
//! | `print <text>` | `<text>` | none |
//! | `js <script>` | stringified script result | whatever the script runs |
//! | `sync_sh <cmd> [args]` | stdout | none |
//! | `sync_spawn <prog> [args]` | stdout | none |
//! | `sh`, `spawn` | none | none |
//! | `scroll_vert`, `scroll_horz`, `scroll_begin`, `scroll_end` | none | none |
//! | `toggle_status`, `zoom_in`, `zoom_out` | none | `VARIABLE_SET` |

mod handlers;

use std::collections::HashMap;

use crate::error::CommandError;
use crate::session::Session;

/// Behavior bound to a command name.
pub type Handler = fn(&mut Session, &str) -> Result<Option<String>, CommandError>;

/// Immutable name to handler mapping.
#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: HashMap<String, Handler>,
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTable")
            .field("commands", &self.names())
            .finish()
    }
}

impl CommandTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with every builtin command.
    pub fn builtin() -> Self {
        handlers::BUILTINS
            .iter()
            .fold(Self::new(), |table, (name, handler)| table.with(name, *handler))
    }

    /// Add or replace a command. Names are stored lower-cased.
    #[must_use]
    pub fn with(mut self, name: &str, handler: Handler) -> Self {
        self.handlers.insert(name.to_ascii_lowercase(), handler);
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(&name.to_ascii_lowercase()).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` when no command is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Session, _: &str) -> Result<Option<String>, CommandError> {
        Ok(None)
    }

    #[test]
    fn test_builtin_catalog() {
        let table = CommandTable::builtin();
        for name in [
            "set",
            "event",
            "request",
            "print",
            "js",
            "sh",
            "sync_sh",
            "spawn",
            "sync_spawn",
            "scroll_vert",
            "scroll_horz",
            "scroll_begin",
            "scroll_end",
            "toggle_status",
            "zoom_in",
            "zoom_out",
        ] {
            assert!(table.get(name).is_some(), "missing builtin {name}");
        }
        assert!(table.get("chain").is_none());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = CommandTable::new().with("Frob", noop);
        assert!(table.get("frob").is_some());
        assert!(table.get("FROB").is_some());
        assert_eq!(table.names(), vec!["frob"]);
    }

    #[test]
    fn test_request_is_an_alias_of_event() {
        let table = CommandTable::builtin();
        let event = table.get("event").unwrap();
        let request = table.get("request").unwrap();
        assert_eq!(event as usize, request as usize);
    }
}
