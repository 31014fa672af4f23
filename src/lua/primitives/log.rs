//! `log` table for Lua scripts.
//!
//! ```lua
//! log.info("rendering " .. #rows .. " rows")
//! log.warn("no data yet")
//! ```
//!
//! Messages go through the `log` facade under the `lua` target, so they land
//! in the same file as the host's own messages and obey the same filters.

use anyhow::{anyhow, Result};
use mlua::Lua;

use crate::constants::LUA_LOG_TARGET;

const LEVELS: [(&str, log::Level); 5] = [
    ("error", log::Level::Error),
    ("warn", log::Level::Warn),
    ("info", log::Level::Info),
    ("debug", log::Level::Debug),
    ("trace", log::Level::Trace),
];

/// Register the global `log` table with one function per level.
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register(lua: &Lua) -> Result<()> {
    let log_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create log table: {e}"))?;

    for (name, level) in LEVELS {
        let func = lua
            .create_function(move |_, msg: String| {
                log::log!(target: LUA_LOG_TARGET, level, "{msg}");
                Ok(())
            })
            .map_err(|e| anyhow!("Failed to create log.{name} function: {e}"))?;
        log_table
            .set(name, func)
            .map_err(|e| anyhow!("Failed to set log.{name}: {e}"))?;
    }

    lua.globals()
        .set("log", log_table)
        .map_err(|e| anyhow!("Failed to register log table globally: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::{Function, Table};

    #[test]
    fn test_every_level_is_registered() {
        let lua = Lua::new();
        register(&lua).expect("Should register log primitives");

        let log_table: Table = lua.globals().get("log").expect("log table should exist");
        for (name, _) in LEVELS {
            let _: Function = log_table.get(name).expect("level function should exist");
        }
    }

    #[test]
    fn test_log_functions_callable() {
        let lua = Lua::new();
        register(&lua).expect("Should register log primitives");

        lua.load(r#"log.info("info"); log.warn("warn"); log.debug("debug")"#)
            .exec()
            .expect("log functions should be callable");
    }
}
