//! Dispatch context.
//!
//! `Session` owns everything a command can touch: the variable registry, the
//! channel registry, the UI record, the command table and the shell and
//! script collaborators. It is passed by `&mut` into every handler; there is
//! no global state.
//!
//! ```text
//! dispatch(line, sink)
//!  ├── split "<name> <rest>"        (empty name: no-op)
//!  ├── CommandTable::get(name)      (miss: UnknownCommand)
//!  ├── expand(rest, self)           (Resolver: variables, shell, script)
//!  ├── handler(self, expanded)
//!  │    ├── set_variable() ──► VARIABLE_SET ──► emit()
//!  │    └── emit() ──► ChannelRegistry::broadcast()
//!  └── Some(result) + sink ──► sink replaced with result
//! ```
//!
//! Script evaluation re-enters [`Session::dispatch`] through [`ScriptHost`]
//! as a plain recursive call.

use std::rc::Rc;

use anyhow::{Context, Result};

use crate::channels::{BroadcastReport, ChannelError, ChannelId, ChannelRegistry, LineSink};
use crate::commands::CommandTable;
use crate::config::{Config, HostInfo};
use crate::constants::{INSTANCE_EXIT_EVENT, INSTANCE_START_EVENT, MAX_DISPATCH_DEPTH};
use crate::error::CommandError;
use crate::events::{self, Event};
use crate::expand::{expand, Resolver};
use crate::lua::{LuaEngine, ScriptEngine, ScriptHost};
use crate::shell::{shell_argv, ShellExecutor, SystemShell};
use crate::ui::{SharedUi, UiState};
use crate::variables::{builtins, SetOutcome, VariableRegistry};

/// Mutable context threaded through command dispatch.
#[derive(Debug)]
pub struct Session {
    instance_name: String,
    registry: VariableRegistry,
    channels: ChannelRegistry,
    commands: CommandTable,
    ui: SharedUi,
    shell: Box<dyn ShellExecutor>,
    script: Option<Rc<dyn ScriptEngine>>,
    sync_stdout: Option<String>,
    /// Dispatch calls currently on the stack.
    depth: usize,
}

impl Session {
    /// Session with builtin commands and variables, the system shell and no
    /// script engine.
    pub fn new(instance_name: &str, host: &HostInfo, shell_cmd: &str) -> Result<Self> {
        let ui = UiState::shared();
        let mut registry = VariableRegistry::new();
        builtins::seed(&mut registry, host, instance_name, shell_cmd, &ui)
            .context("Failed to seed builtin variables")?;

        Ok(Self {
            instance_name: instance_name.to_string(),
            registry,
            channels: ChannelRegistry::new(),
            commands: CommandTable::builtin(),
            ui,
            shell: Box::new(SystemShell),
            script: None,
            sync_stdout: None,
            depth: 0,
        })
    }

    /// Session for a configured instance, with the Lua engine attached and
    /// the configured startup script loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        let engine = LuaEngine::new(config.lua_strict).context("Failed to create Lua runtime")?;
        if let Some(script) = &config.lua_script {
            engine.load_file(script)?;
        }
        Ok(Self::new(&config.instance_name, &config.host, &config.shell_cmd)?
            .with_script_engine(Rc::new(engine)))
    }

    /// Replace the command table.
    #[must_use]
    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    /// Replace the shell executor.
    #[must_use]
    pub fn with_shell(mut self, shell: Box<dyn ShellExecutor>) -> Self {
        self.shell = shell;
        self
    }

    /// Attach a script engine for `js` and `@<...>@`.
    #[must_use]
    pub fn with_script_engine(mut self, engine: Rc<dyn ScriptEngine>) -> Self {
        self.script = Some(engine);
        self
    }

    /// Parse, expand and run one command line.
    ///
    /// When the handler produces a result and `result` is given, the sink's
    /// previous contents are replaced by it.
    ///
    /// Commands nested more than [`MAX_DISPATCH_DEPTH`] deep fail with
    /// [`CommandError::ScriptFailure`].
    pub fn dispatch(&mut self, line: &str, result: Option<&mut String>) -> Result<(), CommandError> {
        if self.depth >= MAX_DISPATCH_DEPTH {
            return Err(CommandError::ScriptFailure(format!(
                "commands nested deeper than {MAX_DISPATCH_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let outcome = self.dispatch_line(line, result);
        self.depth -= 1;
        outcome
    }

    fn dispatch_line(&mut self, line: &str, result: Option<&mut String>) -> Result<(), CommandError> {
        let line = line.trim_end_matches(['\n', '\r']).trim_start();
        let (name, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim_start()),
            None => (line, ""),
        };
        if name.is_empty() {
            return Ok(());
        }

        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;

        let expanded = expand(rest, self);
        log::debug!("[Dispatch] {} {}", name, expanded);

        if let Some(output) = handler(self, &expanded)? {
            if let Some(sink) = result {
                sink.clear();
                sink.push_str(&output);
            }
        }
        Ok(())
    }

    /// Dispatch and return the result, or an empty string.
    pub fn run_line(&mut self, line: &str) -> Result<String, CommandError> {
        let mut result = String::new();
        self.dispatch(line, Some(&mut result))?;
        Ok(result)
    }

    /// Assign through the registry and broadcast the change.
    pub fn set_variable(&mut self, name: &str, raw: &str) -> Result<SetOutcome, CommandError> {
        let outcome = self.registry.set(name, raw)?;
        if let SetOutcome::Changed(event) = &outcome {
            self.emit(event);
        }
        Ok(outcome)
    }

    /// Broadcast an event to every active channel.
    pub fn emit(&mut self, event: &Event) -> BroadcastReport {
        let line = event.to_line(&self.instance_name);
        log::debug!("[Broadcast] {}", line.trim_end());
        self.channels.broadcast(&line)
    }

    /// Register a channel and run the `INSTANCE_START` handshake.
    ///
    /// The channel only joins broadcasts after the greeting is written.
    pub fn attach_channel(&mut self, id: ChannelId, sink: Rc<dyn LineSink>) -> Result<(), ChannelError> {
        self.channels.register(id, sink);
        let greeting = Event::new(INSTANCE_START_EVENT, vec![std::process::id().to_string()]);
        self.channels.send_to(id, &greeting.to_line(&self.instance_name))?;
        self.channels.activate(id);
        log::info!("[Channels] {} attached ({} total)", id, self.channels.len());
        Ok(())
    }

    /// Remove a channel. Unknown ids are ignored.
    pub fn detach_channel(&mut self, id: ChannelId) {
        if self.channels.unregister(id).is_some() {
            log::info!("[Channels] {} detached ({} left)", id, self.channels.len());
        }
    }

    /// Send a command result to the channel that issued the command.
    pub fn reply(&mut self, id: ChannelId, result: &str) {
        let line = format!("{}\n", events::escape(result));
        if let Err(e) = self.channels.send_to(id, &line) {
            log::warn!("[Channels] Reply to {} failed: {e}", id);
        }
    }

    /// Broadcast `INSTANCE_EXIT`.
    pub fn shutdown(&mut self) {
        let report = self.emit(&Event::new(
            INSTANCE_EXIT_EVENT,
            vec![std::process::id().to_string()],
        ));
        log::info!("[Session] Shut down, notified {} channel(s)", report.delivered);
    }

    /// Name used in event lines.
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Variable registry.
    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// Channel registry.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Channel registry, for hosts managing channels directly.
    pub fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.channels
    }

    /// Shared UI record.
    pub fn ui(&self) -> &SharedUi {
        &self.ui
    }

    /// Shell executor.
    pub fn shell(&self) -> &dyn ShellExecutor {
        self.shell.as_ref()
    }

    /// Current `shell_cmd` variable.
    pub fn shell_cmd(&self) -> String {
        self.registry
            .get_string("shell_cmd")
            .unwrap_or_else(|| "sh -c".to_string())
    }

    /// Attached script engine.
    pub fn script_engine(&self) -> Option<Rc<dyn ScriptEngine>> {
        self.script.clone()
    }

    /// Stdout of the last `sync_sh` / `sync_spawn`.
    pub fn sync_stdout(&self) -> Option<&str> {
        self.sync_stdout.as_deref()
    }

    pub(crate) fn set_sync_stdout(&mut self, stdout: Option<String>) {
        self.sync_stdout = stdout;
    }
}

impl Resolver for Session {
    fn variable(&self, name: &str) -> Option<String> {
        self.registry.get_string(name)
    }

    fn shell_output(&mut self, command: &str) -> String {
        let output = shell_argv(&self.shell_cmd(), command, &[]).and_then(|argv| self.shell.run(&argv));
        match output {
            Ok(output) => {
                if !output.success() {
                    log::warn!("[Expand] @({})@ exited with {:?}", command, output.status);
                }
                output.stdout
            }
            Err(e) => {
                log::warn!("[Expand] @({})@ failed: {e:#}", command);
                String::new()
            }
        }
    }

    fn script_result(&mut self, script: &str) -> String {
        let Some(engine) = self.script_engine() else {
            log::warn!("[Expand] No script engine for @<{}>@", script);
            return String::new();
        };
        engine.evaluate(script, self).unwrap_or_else(|e| {
            log::warn!("[Expand] Script failed: {e:#}");
            String::new()
        })
    }
}

impl ScriptHost for Session {
    fn run(&mut self, command: &str) -> String {
        let mut result = String::new();
        if let Err(e) = self.dispatch(command, Some(&mut result)) {
            log::warn!("[Dispatch] Nested command failed: {e}");
        }
        result
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.registry.get_string(name)
    }
}
