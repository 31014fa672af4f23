//! Lua primitive functions exposed to scripts.
//!
//! # Available Primitives
//!
//! - `log` - Logging functions (error, warn, info, debug, trace)
//! - `json` - JSON encode/decode
//! - `ui` - UI builder for the current run (registered per run, see [`ui`])
//!
//! # Adding New Primitives
//!
//! 1. Create a new module (e.g., `foo.rs`)
//! 2. Implement a `register(lua: &Lua) -> Result<()>` function
//! 3. Add `pub mod foo;` here
//! 4. Call `foo::register(lua)?;` in `register_all`

pub mod json;
pub mod log;
pub mod ui;

use anyhow::Result;
use mlua::Lua;

/// Register every run-independent primitive.
///
/// # Errors
///
/// Returns an error if any primitive fails to register.
pub fn register_all(lua: &Lua) -> Result<()> {
    log::register(lua)?;
    json::register(lua)?;
    Ok(())
}
