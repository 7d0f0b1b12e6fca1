//! Lua runtime management.
//!
//! Owns the Lua interpreter state. Each evaluation installs a fresh global
//! `Host` table whose functions borrow the caller's [`ScriptHost`] for the
//! duration of the call only; the previous `Host` is restored afterwards so
//! nested evaluations unwind cleanly.

use std::cell::RefCell;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use mlua::Lua;

use super::{logging, ScriptEngine, ScriptHost};

/// Lua implementation of [`ScriptEngine`].
///
/// # Strict Mode
///
/// When `strict` is set, a startup script that fails to load is a hard
/// error. Otherwise the failure is logged and the runtime stays usable.
pub struct LuaEngine {
    lua: Lua,
    strict: bool,
}

impl std::fmt::Debug for LuaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaEngine")
            .field("strict", &self.strict)
            .field("used_memory", &self.lua.used_memory())
            .finish_non_exhaustive()
    }
}

impl LuaEngine {
    /// Create a runtime with the `log` table registered.
    ///
    /// # Errors
    ///
    /// Returns an error if primitive registration fails.
    pub fn new(strict: bool) -> Result<Self> {
        let lua = Lua::new();
        logging::register(&lua)?;
        Ok(Self { lua, strict })
    }

    /// Whether startup load failures are fatal.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Run a Lua file once, typically a user init script.
    ///
    /// `Host` is not available while this runs.
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Lua script: {}", path.display()))?;

        let outcome = self
            .lua
            .load(source.as_str())
            .set_name(path.display().to_string())
            .exec()
            .map_err(|e| anyhow!("Lua error in {}: {e}", path.display()));

        match outcome {
            Ok(()) => {
                log::info!("[Lua] Loaded {}", path.display());
                Ok(())
            }
            Err(e) if self.strict => Err(e),
            Err(e) => {
                log::warn!("[Lua] {e}");
                Ok(())
            }
        }
    }
}

impl ScriptEngine for LuaEngine {
    fn evaluate(&self, script: &str, host: &mut dyn ScriptHost) -> Result<String> {
        let globals = self.lua.globals();
        let previous: mlua::Value = globals
            .get("Host")
            .map_err(|e| anyhow!("Failed to read Host table: {e}"))?;
        let host = RefCell::new(host);

        let result = self.lua.scope(|scope| {
            let table = self.lua.create_table()?;
            table.set(
                "run",
                scope.create_function_mut(|_, command: String| {
                    let mut host = host
                        .try_borrow_mut()
                        .map_err(|e| mlua::Error::RuntimeError(format!("Host is busy: {e}")))?;
                    Ok(host.run(&command))
                })?,
            )?;
            table.set(
                "get",
                scope.create_function(|_, name: String| {
                    let host = host
                        .try_borrow()
                        .map_err(|e| mlua::Error::RuntimeError(format!("Host is busy: {e}")))?;
                    Ok(host.variable(&name))
                })?,
            )?;
            globals.set("Host", table)?;

            let value: mlua::Value = self.lua.load(script).set_name("=js").eval()?;
            stringify(&value)
        });

        globals
            .set("Host", previous)
            .map_err(|e| anyhow!("Failed to restore Host table: {e}"))?;
        result.map_err(|e| anyhow!("{e}"))
    }
}

/// Render a Lua value as command result text.
fn stringify(value: &mlua::Value) -> mlua::Result<String> {
    Ok(match value {
        mlua::Value::Nil => String::new(),
        mlua::Value::Boolean(b) => b.to_string(),
        mlua::Value::Integer(i) => i.to_string(),
        mlua::Value::Number(n) => n.to_string(),
        mlua::Value::String(s) => s.to_str()?.to_string(),
        other => other.type_name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeHost {
        vars: HashMap<String, String>,
        commands: Vec<String>,
    }

    impl ScriptHost for FakeHost {
        fn run(&mut self, command: &str) -> String {
            self.commands.push(command.to_string());
            format!("ran:{command}")
        }

        fn variable(&self, name: &str) -> Option<String> {
            self.vars.get(name).cloned()
        }
    }

    /// Host that evaluates nested scripts through the same engine.
    struct NestingHost<'a> {
        engine: &'a LuaEngine,
        depth: usize,
    }

    impl ScriptHost for NestingHost<'_> {
        fn run(&mut self, command: &str) -> String {
            self.depth += 1;
            let script = command.strip_prefix("js ").unwrap_or(command).to_string();
            let engine = self.engine;
            engine.evaluate(&script, self).unwrap_or_default()
        }

        fn variable(&self, _name: &str) -> Option<String> {
            Some(self.depth.to_string())
        }
    }

    #[test]
    fn test_expression_results_are_stringified() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = FakeHost::default();
        assert_eq!(engine.evaluate("('x' .. 345):upper()", &mut host).unwrap(), "X345");
        assert_eq!(engine.evaluate("1 + 2", &mut host).unwrap(), "3");
        assert_eq!(engine.evaluate("5 / 2", &mut host).unwrap(), "2.5");
        assert_eq!(engine.evaluate("nil", &mut host).unwrap(), "");
        assert_eq!(engine.evaluate("1 < 2", &mut host).unwrap(), "true");
        assert_eq!(engine.evaluate("{}", &mut host).unwrap(), "table");
    }

    #[test]
    fn test_statement_blocks_evaluate() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = FakeHost::default();
        let out = engine
            .evaluate("local n = 0 for i = 1, 4 do n = n + i end return n", &mut host)
            .unwrap();
        assert_eq!(out, "10");
    }

    #[test]
    fn test_host_run_and_get() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = FakeHost::default();
        host.vars.insert("uri".into(), "about:blank".into());

        let out = engine.evaluate("Host.run('print hi'):upper()", &mut host).unwrap();
        assert_eq!(out, "RAN:PRINT HI");
        assert_eq!(host.commands, vec!["print hi"]);

        assert_eq!(engine.evaluate("Host.get('uri')", &mut host).unwrap(), "about:blank");
        assert_eq!(engine.evaluate("Host.get('nope') == nil", &mut host).unwrap(), "true");
    }

    #[test]
    fn test_host_is_gone_after_evaluation() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = FakeHost::default();
        engine.evaluate("1", &mut host).unwrap();
        let leaked: mlua::Value = engine.lua.globals().get("Host").unwrap();
        assert!(leaked.is_nil());
    }

    #[test]
    fn test_nested_evaluation_restores_outer_host() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = NestingHost {
            engine: &engine,
            depth: 0,
        };
        let out = engine
            .evaluate("Host.run(\"js Host.get('d')\") .. '/' .. Host.get('d')", &mut host)
            .unwrap();
        assert_eq!(out, "1/1");
    }

    #[test]
    fn test_errors_are_reported() {
        let engine = LuaEngine::new(false).unwrap();
        let mut host = FakeHost::default();
        assert!(engine.evaluate("error('boom')", &mut host).is_err());
        assert!(engine.evaluate("this is not lua", &mut host).is_err());
        // Host is restored even after a failure.
        let leaked: mlua::Value = engine.lua.globals().get("Host").unwrap();
        assert!(leaked.is_nil());
    }

    #[test]
    fn test_load_file_strictness() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.lua");
        let bad = dir.path().join("bad.lua");
        std::fs::write(&good, "greeting = 'hello'").unwrap();
        std::fs::write(&bad, "error('nope')").unwrap();

        let lenient = LuaEngine::new(false).unwrap();
        lenient.load_file(&good).unwrap();
        lenient.load_file(&bad).unwrap();
        let mut host = FakeHost::default();
        assert_eq!(lenient.evaluate("greeting", &mut host).unwrap(), "hello");

        let strict = LuaEngine::new(true).unwrap();
        assert!(strict.is_strict());
        assert!(strict.load_file(&bad).is_err());
        assert!(strict.load_file(&dir.path().join("missing.lua")).is_err());
    }
}
