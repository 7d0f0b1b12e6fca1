//! Script engine collaborator.
//!
//! The `js` command and the `@<...>@` expansion directive hand text to a
//! [`ScriptEngine`]. The shipped engine is Lua ([`LuaEngine`], via mlua).
//!
//! ```text
//! Session::dispatch("js ...")
//!  └── ScriptEngine::evaluate(script, host = &mut Session)
//!       └── Lua chunk
//!            ├── Host.run("print ...")  ──► Session::dispatch (nested)
//!            ├── Host.get("name")       ──► VariableRegistry
//!            └── log.info/warn/error/debug
//! ```
//!
//! Nested dispatch runs on the same thread as an ordinary recursive call.

pub mod logging;
pub mod runtime;

use anyhow::Result;

pub use runtime::LuaEngine;

/// What a running script may call back into.
pub trait ScriptHost {
    /// Dispatch a command line and return its synchronous result
    /// (empty when the command produced none or failed).
    fn run(&mut self, command: &str) -> String;

    /// Canonical value of a variable.
    fn variable(&self, name: &str) -> Option<String>;
}

/// Evaluates script text and stringifies the result.
pub trait ScriptEngine: std::fmt::Debug {
    /// Evaluate `script`, allowing it to call back into `host`.
    fn evaluate(&self, script: &str, host: &mut dyn ScriptHost) -> Result<String>;
}
