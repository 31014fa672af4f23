//! `ui` table: the builder for the current run, exposed to Lua.
//!
//! Registered inside `Lua::scope` for exactly one run, since it borrows that
//! run's builder. Element functions return a handle (the element's path as
//! a list of integers) usable with `ui.add_rows` and `ui.within`.
//!
//! ```lua
//! ui.title("Sales")
//! local region = ui.selectbox("Region", { "north", "south" })
//! if ui.checkbox("Show table", false, { key = "show" }) then
//!     ui.json(load_rows(region))
//! end
//! local left, right = table.unpack(ui.columns(2))
//! ui.within(left, function() ui.text("left") end)
//! ui.sidebar(function() ui.markdown("*filters*") end)
//! ui.fragment("clock", function() ui.text(os.date()) end)
//! ui.session_set("visits", (ui.session_get("visits") or 0) + 1)
//! ```
//!
//! Any builder call may raise to end the run early (stop, rerun, shutdown).
//! Scripts should let those errors propagate.

use mlua::{Function, Lua, LuaSerdeExt, Scope, Table, Value};

use super::json::{json_to_lua, lua_to_json};
use crate::delta::{Block, BlockKind, DeltaPath, SIDEBAR_CONTAINER};
use crate::lua::{is_failure, UiCell};
use crate::runner::context::{selectbox_value, slider_value};
use crate::runner::{RunError, WidgetSpec};

fn lua_error(err: RunError) -> mlua::Error {
    mlua::Error::external(err)
}

/// Apply `opts.key`, if given, as the widget id.
fn keyed(spec: WidgetSpec, opts: Option<&Table>) -> mlua::Result<WidgetSpec> {
    let key = match opts {
        Some(opts) => opts.get::<Option<String>>("key")?,
        None => None,
    };
    Ok(match key {
        Some(key) => spec.with_key(key),
        None => spec,
    })
}

/// What a nested callback runs inside.
#[derive(Clone, Copy)]
enum Nesting {
    Block,
    Fragment,
}

/// Call `f` inside an already opened block or fragment, then close it.
///
/// The builder is not borrowed while `f` runs, so `f` may use `ui` freely.
fn run_nested(ui: &UiCell<'_>, opened: Result<(), RunError>, nesting: Nesting, f: &Function) -> mlua::Result<()> {
    opened.map_err(lua_error)?;
    let result = f.call::<()>(());

    let mut builder = ui.borrow_mut();
    match nesting {
        Nesting::Block => {
            if result.as_ref().is_err_and(is_failure) {
                builder.mark_failure_location();
            }
            builder.end_block();
        }
        Nesting::Fragment => builder.end_fragment(),
    }
    result
}

fn path_from(lua: &Lua, handle: Value) -> mlua::Result<DeltaPath> {
    lua.from_value(handle)
}

fn rows_from(lua: &Lua, rows: Option<Value>) -> mlua::Result<Vec<serde_json::Value>> {
    match rows {
        None | Some(Value::Nil) => Ok(Vec::new()),
        Some(rows) => match lua_to_json(lua, rows)? {
            serde_json::Value::Array(rows) => Ok(rows),
            serde_json::Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            other => Ok(vec![other]),
        },
    }
}

/// Register the global `ui` table for one run.
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register<'scope, 'env>(
    lua: &Lua,
    scope: &'scope Scope<'scope, 'env>,
    ui: &'env UiCell<'_>,
) -> mlua::Result<()> {
    let table = lua.create_table()?;

    // Text elements: ui.text(body) -> handle
    for kind in ["text", "markdown", "title"] {
        let func = scope.create_function(move |lua, body: String| {
            let mut builder = ui.borrow_mut();
            let path = match kind {
                "markdown" => builder.markdown(&body),
                "title" => builder.title(&body),
                _ => builder.text(&body),
            }
            .map_err(lua_error)?;
            lua.to_value(&path)
        })?;
        table.set(kind, func)?;
    }

    table.set(
        "json",
        scope.create_function(move |lua, value: Value| {
            let json = lua_to_json(lua, value)?;
            let path = ui.borrow_mut().write_json(json).map_err(lua_error)?;
            lua.to_value(&path)
        })?,
    )?;

    table.set(
        "line_chart",
        scope.create_function(move |lua, rows: Option<Value>| {
            let rows = rows_from(lua, rows)?;
            let path = ui.borrow_mut().line_chart(rows).map_err(lua_error)?;
            lua.to_value(&path)
        })?,
    )?;

    table.set(
        "add_rows",
        scope.create_function(move |lua, (handle, rows): (Value, Option<Value>)| {
            let path = path_from(lua, handle)?;
            let rows = rows_from(lua, rows)?;
            ui.borrow_mut().add_rows(&path, rows).map_err(lua_error)
        })?,
    )?;

    // Widgets
    table.set(
        "checkbox",
        scope.create_function(
            move |_, (label, default, opts): (String, Option<bool>, Option<Table>)| {
                let default = default.unwrap_or(false);
                let spec = keyed(WidgetSpec::checkbox(&label, default), opts.as_ref())?;
                let value = ui.borrow_mut().widget(spec).map_err(lua_error)?;
                Ok(value.as_bool().unwrap_or(default))
            },
        )?,
    )?;

    table.set(
        "button",
        scope.create_function(move |_, (label, opts): (String, Option<Table>)| {
            let spec = keyed(WidgetSpec::button(&label), opts.as_ref())?;
            let value = ui.borrow_mut().widget(spec).map_err(lua_error)?;
            Ok(value.as_bool().unwrap_or(false))
        })?,
    )?;

    table.set(
        "slider",
        scope.create_function(
            move |_, (label, min, max, default, opts): (String, i64, i64, Option<i64>, Option<Table>)| {
                let default = default.unwrap_or(min);
                let spec = keyed(WidgetSpec::slider(&label, min, max, default), opts.as_ref())?;
                let value = ui.borrow_mut().widget(spec).map_err(lua_error)?;
                Ok(slider_value(&value, min, max, default))
            },
        )?,
    )?;

    table.set(
        "text_input",
        scope.create_function(
            move |_, (label, default, opts): (String, Option<String>, Option<Table>)| {
                let default = default.unwrap_or_default();
                let spec = keyed(WidgetSpec::text_input(&label, &default), opts.as_ref())?;
                let value = ui.borrow_mut().widget(spec).map_err(lua_error)?;
                Ok(value.as_str().map_or(default, str::to_string))
            },
        )?,
    )?;

    // ui.selectbox(label, options, index) with a 1-based index
    table.set(
        "selectbox",
        scope.create_function(
            move |_, (label, options, index, opts): (String, Vec<String>, Option<usize>, Option<Table>)| {
                let index = index.unwrap_or(1).saturating_sub(1);
                let spec = keyed(WidgetSpec::selectbox(&label, &options, index), opts.as_ref())?;
                let value = ui.borrow_mut().widget(spec).map_err(lua_error)?;
                Ok(selectbox_value(&value, &options, index))
            },
        )?,
    )?;

    // Layout
    table.set(
        "container",
        scope.create_function(move |_, f: Function| {
            let opened = ui.borrow_mut().begin_block(Block::new(BlockKind::Vertical)).map(|_| ());
            run_nested(ui, opened, Nesting::Block, &f)
        })?,
    )?;

    table.set(
        "expander",
        scope.create_function(move |_, (label, f): (String, Function)| {
            let block = Block::with_props(BlockKind::Expander, serde_json::json!({ "label": label }));
            let opened = ui.borrow_mut().begin_block(block).map(|_| ());
            run_nested(ui, opened, Nesting::Block, &f)
        })?,
    )?;

    table.set(
        "columns",
        scope.create_function(move |lua, n: usize| {
            let columns = ui.borrow_mut().columns(n).map_err(lua_error)?;
            lua.to_value(&columns)
        })?,
    )?;

    table.set(
        "within",
        scope.create_function(move |lua, (handle, f): (Value, Function)| {
            let path = path_from(lua, handle)?;
            let opened = ui.borrow_mut().enter(&path);
            run_nested(ui, opened, Nesting::Block, &f)
        })?,
    )?;

    table.set(
        "sidebar",
        scope.create_function(move |_, f: Function| {
            let opened = ui.borrow_mut().enter(&DeltaPath::root(SIDEBAR_CONTAINER));
            run_nested(ui, opened, Nesting::Block, &f)
        })?,
    )?;

    table.set(
        "fragment",
        scope.create_function(move |_, (id, f): (String, Function)| {
            let opened = ui.borrow_mut().begin_fragment(&id);
            run_nested(ui, opened, Nesting::Fragment, &f)
        })?,
    )?;

    // Control flow
    table.set(
        "stop",
        scope.create_function(move |_, ()| ui.borrow_mut().stop().map_err(lua_error))?,
    )?;

    table.set(
        "checkpoint",
        scope.create_function(move |_, ()| ui.borrow_mut().checkpoint().map_err(lua_error))?,
    )?;

    // Session state
    table.set(
        "session_get",
        scope.create_function(move |lua, key: String| {
            let value = ui.borrow().session_value(&key);
            match value {
                Some(value) => json_to_lua(lua, &value),
                None => Ok(Value::Nil),
            }
        })?,
    )?;

    table.set(
        "session_set",
        scope.create_function(move |lua, (key, value): (String, Value)| {
            let value = lua_to_json(lua, value)?;
            ui.borrow_mut().set_session_value(&key, value);
            Ok(())
        })?,
    )?;

    table.set(
        "session_del",
        scope.create_function(move |lua, key: String| {
            let old = ui.borrow_mut().remove_session_value(&key);
            match old {
                Some(value) => json_to_lua(lua, &value),
                None => Ok(Value::Nil),
            }
        })?,
    )?;

    table.set(
        "changed",
        scope.create_function(move |_, ()| Ok(ui.borrow().changed_widgets().to_vec()))?,
    )?;

    lua.globals().set("ui", table)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::delta::{Delta, ForwardMsg, ForwardMsgQueue};
    use crate::lua::LuaScript;
    use crate::runner::{RunScope, Script, ScriptContext, ScriptRequests};
    use crate::state::SessionState;

    fn run(source: &str, scope: RunScope, state: &mut SessionState) -> Vec<Delta> {
        let mut file = tempfile::Builder::new()
            .suffix(".lua")
            .tempfile()
            .expect("temp script");
        file.write_all(source.as_bytes()).expect("write script");

        let queue = ForwardMsgQueue::new();
        let requests = ScriptRequests::new();
        let mut ctx = ScriptContext::new(&queue, &requests, state, uuid::Uuid::new_v4(), scope, Vec::new());
        LuaScript::new(file.path()).run(&mut ctx).expect("script run");
        drop(ctx);

        queue
            .flush()
            .into_iter()
            .filter_map(|m| match m {
                ForwardMsg::Delta(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn paths(deltas: &[Delta]) -> Vec<Vec<u32>> {
        deltas.iter().map(|d| d.path().as_slice().to_vec()).collect()
    }

    #[test]
    fn test_columns_within_and_sidebar() {
        let deltas = run(
            r#"
            local cols = ui.columns(2)
            ui.within(cols[2], function() ui.text("right") end)
            ui.sidebar(function() ui.text("side") end)
            "#,
            RunScope::App,
            &mut SessionState::new(),
        );
        assert_eq!(
            paths(&deltas),
            vec![vec![0, 0], vec![0, 0, 0], vec![0, 0, 1], vec![0, 0, 1, 0], vec![1, 0]]
        );
    }

    #[test]
    fn test_chart_rows_use_handle() {
        let deltas = run(
            r#"
            local chart = ui.line_chart({ { x = 1 } })
            ui.add_rows(chart, { { x = 2 }, { x = 3 } })
            "#,
            RunScope::App,
            &mut SessionState::new(),
        );
        assert_eq!(deltas.len(), 2);
        let Delta::AddRows { path, rows } = &deltas[1] else {
            panic!("expected rows, got {:?}", deltas[1]);
        };
        assert_eq!(path.as_slice(), &[0, 0]);
        assert_eq!(rows.rows.len(), 2);
    }

    #[test]
    fn test_widgets_with_keys_and_defaults() {
        let mut state = SessionState::new();
        run(
            r#"
            assert(ui.slider("n", 1, 10) == 1)
            assert(ui.text_input("name", "anon", { key = "who" }) == "anon")
            assert(ui.selectbox("pick", { "a", "b" }, 2) == "b")
            assert(ui.button("go") == false)
            "#,
            RunScope::App,
            &mut state,
        );
        assert!(state.widget_metadata("who").is_some());
        assert!(state.widget_metadata("slider:n").is_some());
    }

    #[test]
    fn test_session_keys_survive_runs() {
        let mut state = SessionState::new();
        let source = r#"
            local n = (ui.session_get("count") or 0) + 1
            ui.session_set("count", n)
            ui.text(tostring(n))
        "#;
        run(source, RunScope::App, &mut state);
        let deltas = run(source, RunScope::App, &mut state);
        let Delta::NewElement { element, .. } = &deltas[0] else {
            panic!("expected element");
        };
        assert_eq!(element.props["body"], "2");
    }

    #[test]
    fn test_session_del_removes_key() {
        let mut state = SessionState::new();
        state.set("draft", serde_json::json!("hello"));
        run(
            r#"
            assert(ui.session_del("draft") == "hello")
            assert(ui.session_get("draft") == nil)
            assert(ui.session_del("draft") == nil)
            "#,
            RunScope::App,
            &mut state,
        );
        assert!(state.get("draft").is_none());
    }

    #[test]
    fn test_fragment_run_emits_only_fragment() {
        let deltas = run(
            r#"
            ui.text("outside")
            ui.fragment("clock", function() ui.text("tick") end)
            "#,
            RunScope::fragment("clock"),
            &mut SessionState::new(),
        );
        assert_eq!(paths(&deltas), vec![vec![0, 1]]);
    }

    #[test]
    fn test_pcall_cannot_swallow_a_stop() {
        let mut state = SessionState::new();
        let mut file = tempfile::Builder::new()
            .suffix(".lua")
            .tempfile()
            .expect("temp script");
        file.write_all(
            br#"
            pcall(ui.stop)
            ui.text("after")
            "#,
        )
        .expect("write script");

        let queue = ForwardMsgQueue::new();
        let requests = ScriptRequests::new();
        let mut ctx = ScriptContext::new(&queue, &requests, &mut state, uuid::Uuid::new_v4(), RunScope::App, Vec::new());
        let result = LuaScript::new(file.path()).run(&mut ctx);
        assert_eq!(result, Err(crate::runner::RunError::StopRequested));
        assert_eq!(ctx.emitted(), 0);
    }
}
