//! `log` table for scripts.
//!
//! ```lua
//! log.info("loaded")
//! log.debug("value: " .. Host.get("zoom_level"))
//! ```
//!
//! Messages go through the `log` crate with target `lua`.

use anyhow::{anyhow, Result};
use mlua::Lua;

/// Install the global `log` table.
pub fn register(lua: &Lua) -> Result<()> {
    let table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create log table: {e}"))?;

    let levels = [
        ("debug", log::Level::Debug),
        ("info", log::Level::Info),
        ("warn", log::Level::Warn),
        ("error", log::Level::Error),
    ];
    for (name, level) in levels {
        let func = lua
            .create_function(move |_, msg: String| {
                log::log!(target: "lua", level, "{}", msg);
                Ok(())
            })
            .map_err(|e| anyhow!("Failed to create log.{name}: {e}"))?;
        table
            .set(name, func)
            .map_err(|e| anyhow!("Failed to set log.{name}: {e}"))?;
    }

    lua.globals()
        .set("log", table)
        .map_err(|e| anyhow!("Failed to register log table: {e}"))?;
    Ok(())
}
