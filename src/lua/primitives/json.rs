//! JSON helpers for Lua scripts.
//!
//! ```lua
//! local rows, err = json.decode('[{"x": 1}, {"x": 2}]')
//! ui.json(rows)
//! local text = json.encode({ total = 3 })
//! ```
//!
//! Failures return `nil, message` in the usual Lua way rather than raising.

use anyhow::{anyhow, Result};
use mlua::{Lua, LuaSerdeExt, Value};

/// Convert JSON to a Lua value, mapping `null` to a real `nil`.
///
/// `LuaSerdeExt::to_value` would map `null` to a truthy sentinel, which
/// surprises scripts testing `if value then`.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> mlua::Result<Value> {
    match value {
        serde_json::Value::Null => Ok(Value::Nil),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => Ok(n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Number))
            .unwrap_or(Value::Nil)),
        serde_json::Value::String(s) => lua.create_string(s).map(Value::String),
        serde_json::Value::Array(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (key, item) in map.iter().filter(|(_, v)| !v.is_null()) {
                table.raw_set(key.as_str(), json_to_lua(lua, item)?)?;
            }
            Ok(Value::Table(table))
        }
    }
}

/// Convert a Lua value to JSON.
pub fn lua_to_json(lua: &Lua, value: Value) -> mlua::Result<serde_json::Value> {
    lua.from_value(value)
}

/// Register the global `json` table (`encode`, `decode`).
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register(lua: &Lua) -> Result<()> {
    let json_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create json table: {e}"))?;

    let encode_fn = lua
        .create_function(|lua, value: Value| {
            let encoded = lua_to_json(lua, value)
                .map_err(|e| format!("Failed to convert Lua value: {e}"))
                .and_then(|json| {
                    serde_json::to_string(&json).map_err(|e| format!("Failed to encode JSON: {e}"))
                });
            Ok(match encoded {
                Ok(s) => (Some(s), None),
                Err(e) => (None, Some(e)),
            })
        })
        .map_err(|e| anyhow!("Failed to create json.encode function: {e}"))?;
    json_table
        .set("encode", encode_fn)
        .map_err(|e| anyhow!("Failed to set json.encode: {e}"))?;

    let decode_fn = lua
        .create_function(|lua, text: String| {
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(json) => Ok((Some(json_to_lua(lua, &json)?), None)),
                Err(e) => Ok((None, Some(format!("Failed to decode JSON: {e}")))),
            }
        })
        .map_err(|e| anyhow!("Failed to create json.decode function: {e}"))?;
    json_table
        .set("decode", decode_fn)
        .map_err(|e| anyhow!("Failed to set json.decode: {e}"))?;

    lua.globals()
        .set("json", json_table)
        .map_err(|e| anyhow!("Failed to register json table globally: {e}"))?;

    Ok(())
}
