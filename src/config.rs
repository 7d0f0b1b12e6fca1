//! Configuration loading.
//!
//! Priority, lowest first: defaults, `<config dir>/config.json`, environment
//! variables, then CLI flags applied by the binary.
//!
//! | Variable | Field |
//! |---|---|
//! | `HOSTCTL_CONFIG_DIR` | directory holding `config.json` |
//! | `HOSTCTL_INSTANCE` | `instance_name` |
//! | `HOSTCTL_SOCKET` | `socket_path` |
//! | `HOSTCTL_SHELL` | `shell_cmd` |
//! | `HOSTCTL_LUA_STRICT` | `lua_strict` (`"1"` enables) |
//! | `HOSTCTL_LUA_SCRIPT` | `lua_script` |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_SOCKET_PATH;

/// Version triple of the embedding engine, exposed as constant variables.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostInfo {
    /// `WEBKIT_MAJOR`
    pub engine_major: i64,
    /// `WEBKIT_MINOR`
    pub engine_minor: i64,
    /// `WEBKIT_MICRO`
    pub engine_micro: i64,
}

impl Default for HostInfo {
    fn default() -> Self {
        Self {
            engine_major: 2,
            engine_minor: 40,
            engine_micro: 0,
        }
    }
}

/// Configuration for one control-plane instance.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Name used in every event line.
    pub instance_name: String,
    /// Control socket path. `None` means the per-instance default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
    /// Prefix for shell commands, split with shell quoting rules.
    pub shell_cmd: String,
    /// Treat a failing startup Lua script as fatal.
    pub lua_strict: bool,
    /// Lua file run once at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lua_script: Option<PathBuf>,
    /// Dispatch lines read from stdin.
    pub read_stdin: bool,
    /// Engine version reported through `WEBKIT_*`.
    pub host: HostInfo,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: format!("hostctl-{}", std::process::id()),
            socket_path: None,
            shell_cmd: "sh -c".to_string(),
            lua_strict: false,
            lua_script: None,
            read_stdin: false,
            host: HostInfo::default(),
        }
    }
}

impl Config {
    /// Directory holding `config.json`.
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("HOSTCTL_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("hostctl"))
    }

    /// Load from the config directory with environment overrides.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn load() -> Result<Self> {
        let path = Self::config_dir()?.join("config.json");
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a specific JSON file, without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("HOSTCTL_INSTANCE") {
            self.instance_name = name;
        }

        if let Ok(socket) = std::env::var("HOSTCTL_SOCKET") {
            self.socket_path = Some(PathBuf::from(socket));
        }

        if let Ok(shell) = std::env::var("HOSTCTL_SHELL") {
            self.shell_cmd = shell;
        }

        if let Ok(strict) = std::env::var("HOSTCTL_LUA_STRICT") {
            self.lua_strict = strict == "1";
        }

        if let Ok(script) = std::env::var("HOSTCTL_LUA_SCRIPT") {
            self.lua_script = Some(PathBuf::from(script));
        }
    }

    /// Resolved control socket path.
    ///
    /// Defaults to `<runtime dir>/hostctl/<instance>.sock`, falling back to
    /// the temp dir where no runtime dir exists.
    ///
    /// # Errors
    ///
    /// Fails when the path does not fit in `sockaddr_un`.
    pub fn socket_path(&self) -> Result<PathBuf> {
        let path = match &self.socket_path {
            Some(path) => path.clone(),
            None => dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("hostctl")
                .join(format!("{}.sock", self.instance_name)),
        };

        let len = path.as_os_str().len();
        if len >= MAX_SOCKET_PATH {
            bail!(
                "Socket path too long ({} bytes, max {}): {}",
                len,
                MAX_SOCKET_PATH - 1,
                path.display()
            );
        }
        Ok(path)
    }
}
