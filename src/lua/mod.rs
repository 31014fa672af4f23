//! Lua script host.
//!
//! [`LuaScript`] runs a `.lua` file as the user script. Every run reads the
//! file again (so a save is picked up by the next rerun), creates a fresh
//! interpreter, registers the primitives and executes the chunk:
//!
//! ```text
//! LuaScript::run(ui)
//!   ├── read source              (I/O error  → compile exception)
//!   ├── Lua::new() + primitives  (log, json)
//!   └── Lua::scope
//!         ├── `ui` table borrowing the builder for this run only
//!         └── exec chunk         (syntax error  → compile exception,
//!                                 runtime error → runtime exception,
//!                                 halt          → passed through as-is)
//! ```
//!
//! A builder call that observes an interrupt fails inside Lua with the
//! original [`RunError`] as the error's cause, so it unwinds the chunk like
//! any Lua error and is recovered intact on the way out.
//!
//! - [`primitives`] - the tables exposed to scripts

pub mod primitives;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use mlua::Lua;

use crate::runner::{RunError, Script, ScriptException, UiBuilder};

/// Builder shared with the scoped `ui` functions for one run.
pub type UiCell<'a> = RefCell<&'a mut dyn UiBuilder>;

/// A Lua source file run as the user script.
#[derive(Debug, Clone)]
pub struct LuaScript {
    path: PathBuf,
}

impl LuaScript {
    /// Script backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_source(&self) -> Result<String, RunError> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            RunError::Failed(ScriptException::compile(
                "IOError",
                format!("Failed to read {}: {e}", self.path.display()),
            ))
        })
    }
}

impl Script for LuaScript {
    fn run(&mut self, ui: &mut dyn UiBuilder) -> Result<(), RunError> {
        let source = self.load_source()?;

        let lua = Lua::new();
        primitives::register_all(&lua)?;

        let chunk_name = format!("@{}", self.path.display());
        let ui = RefCell::new(ui);
        lua.scope(|scope| {
            primitives::ui::register(&lua, scope, &ui)?;
            lua.load(source.as_str()).set_name(chunk_name).exec()
        })
        .map_err(into_run_error)
    }
}

/// Find a [`RunError`] carried inside a Lua error.
fn find_run_error(err: &mlua::Error) -> Option<&RunError> {
    match err {
        mlua::Error::CallbackError { cause, .. } => find_run_error(cause),
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<RunError>(),
        _ => None,
    }
}

/// True unless `err` carries a halt out of the script.
pub(crate) fn is_failure(err: &mlua::Error) -> bool {
    find_run_error(err).map_or(true, |e| !e.is_halt())
}

/// Split Lua's `"message\nstack traceback:\n\t..."` form.
fn split_traceback(text: &str) -> (String, Vec<String>) {
    match text.split_once("\nstack traceback:") {
        Some((message, trace)) => (
            message.to_string(),
            trace
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        None => (text.to_string(), Vec::new()),
    }
}

/// Classify the error a chunk ended with.
fn into_run_error(err: mlua::Error) -> RunError {
    if let Some(run_error) = find_run_error(&err) {
        return run_error.clone();
    }

    match err {
        mlua::Error::SyntaxError { message, .. } => {
            ScriptException::compile("SyntaxError", message).into()
        }
        mlua::Error::RuntimeError(text) => {
            let (message, trace) = split_traceback(&text);
            ScriptException::runtime("LuaError", message)
                .with_stack_trace(trace)
                .into()
        }
        mlua::Error::CallbackError { traceback, cause } => {
            let (_, trace) = split_traceback(&traceback);
            ScriptException::runtime("LuaError", cause.to_string())
                .with_stack_trace(trace)
                .into()
        }
        other => ScriptException::runtime("LuaError", other.to_string()).into(),
    }
}
