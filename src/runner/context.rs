//! The capability object a running script builds its UI through.
//!
//! [`UiBuilder`] is what scripts see; [`ScriptContext`] is the one
//! implementation, created by the runner for every run. Each builder call:
//!
//! 1. is a checkpoint: a pending stop, rerun or shutdown is observed here and
//!    returned as [`RunError::Interrupted`];
//! 2. allocates the next [`DeltaPath`] in the active container;
//! 3. enqueues one delta.
//!
//! Once a run has halted (interrupted, or the script called
//! [`UiBuilder::stop`]) every later call returns the same halt without
//! emitting anything.

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use uuid::Uuid;

use super::error::RunError;
use super::requests::{RunScope, ScriptRequests};
use crate::delta::{
    Block, BlockKind, Delta, DeltaPath, Element, ForwardMsgQueue, Rows, MAIN_CONTAINER,
    SIDEBAR_CONTAINER,
};
use crate::state::{SessionState, WidgetKind, WidgetMetadata, WidgetValue};

/// Declaration of an interactive element.
#[derive(Debug, Clone)]
pub struct WidgetSpec {
    /// Element type sent to the client (`"checkbox"`, `"slider"`, ...).
    pub element: String,
    /// Value type.
    pub kind: WidgetKind,
    /// Visible label; part of the derived id.
    pub label: String,
    /// Explicit id, overriding the derived one.
    pub key: Option<String>,
    /// Value before any interaction.
    pub default: WidgetValue,
    /// Extra element props (bounds, options, ...).
    pub props: Value,
}

impl WidgetSpec {
    /// Declare a widget with no extra props.
    pub fn new(
        element: impl Into<String>,
        kind: WidgetKind,
        label: impl Into<String>,
        default: WidgetValue,
    ) -> Self {
        Self {
            element: element.into(),
            kind,
            label: label.into(),
            key: None,
            default,
            props: json!({}),
        }
    }

    /// Use `key` as the widget id.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach element props.
    #[must_use]
    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Checkbox declaration.
    pub fn checkbox(label: &str, default: bool) -> Self {
        Self::new("checkbox", WidgetKind::Bool, label, WidgetValue::Bool(default))
    }

    /// Button declaration.
    pub fn button(label: &str) -> Self {
        Self::new("button", WidgetKind::Trigger, label, WidgetValue::Trigger(false))
    }

    /// Integer slider declaration.
    pub fn slider(label: &str, min: i64, max: i64, default: i64) -> Self {
        Self::new("slider", WidgetKind::Int, label, WidgetValue::Int(default))
            .with_props(json!({ "min": min, "max": max }))
    }

    /// Text input declaration.
    pub fn text_input(label: &str, default: &str) -> Self {
        Self::new(
            "text_input",
            WidgetKind::String,
            label,
            WidgetValue::String(default.to_string()),
        )
    }

    /// Select box declaration; the default is `options[index]`.
    pub fn selectbox(label: &str, options: &[String], index: usize) -> Self {
        let default = options.get(index).cloned().unwrap_or_default();
        Self::new("selectbox", WidgetKind::String, label, WidgetValue::String(default))
            .with_props(json!({ "options": options, "index": index }))
    }

    /// Widget id: the explicit key, or `"{element}:{label}"`.
    #[must_use]
    pub fn id(&self) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.element, self.label))
    }
}

/// UI-building capability handed to a running script.
///
/// Methods returning `Result` are checkpoints; propagate their errors with
/// `?` so an interrupted run unwinds promptly.
pub trait UiBuilder {
    /// Observe pending requests without building anything (explicit yield).
    fn checkpoint(&mut self) -> Result<(), RunError>;

    /// Add a leaf element in the active container.
    fn element(&mut self, kind: &str, props: Value) -> Result<DeltaPath, RunError>;

    /// Add a container in the active container and make it active.
    fn begin_block(&mut self, block: Block) -> Result<DeltaPath, RunError>;

    /// Make an existing container (a column, the sidebar) active.
    fn enter(&mut self, container: &DeltaPath) -> Result<(), RunError>;

    /// Leave the active container.
    fn end_block(&mut self);

    /// Record the active container as the place a failure should be shown.
    fn mark_failure_location(&mut self);

    /// Append rows to an existing data element.
    fn add_rows(&mut self, target: &DeltaPath, rows: Vec<Value>) -> Result<(), RunError>;

    /// Register a widget, emit it, and return its current value.
    fn widget(&mut self, spec: WidgetSpec) -> Result<WidgetValue, RunError>;

    /// Stop this run now. Always returns [`RunError::StopRequested`].
    fn stop(&mut self) -> Result<(), RunError>;

    /// Enter a named fragment.
    fn begin_fragment(&mut self, id: &str) -> Result<(), RunError>;

    /// Leave the innermost fragment.
    fn end_fragment(&mut self);

    /// Ids of widgets whose value changed since the previous run.
    fn changed_widgets(&self) -> &[String];

    /// Read a script-set session key.
    fn session_value(&self, key: &str) -> Option<Value>;

    /// Write a script-set session key; it survives reruns.
    fn set_session_value(&mut self, key: &str, value: Value);

    /// Delete a script-set session key, returning its old value.
    fn remove_session_value(&mut self, key: &str) -> Option<Value>;

    /// Plain text.
    fn text(&mut self, body: &str) -> Result<DeltaPath, RunError> {
        self.element("text", json!({ "body": body }))
    }

    /// Markdown text.
    fn markdown(&mut self, body: &str) -> Result<DeltaPath, RunError> {
        self.element("markdown", json!({ "body": body }))
    }

    /// Page title.
    fn title(&mut self, body: &str) -> Result<DeltaPath, RunError> {
        self.element("title", json!({ "body": body }))
    }

    /// Pretty-printed JSON value.
    fn write_json(&mut self, value: Value) -> Result<DeltaPath, RunError> {
        self.element("json", json!({ "body": value }))
    }

    /// Line chart seeded with `rows`; extend it later with `add_rows`.
    fn line_chart(&mut self, rows: Vec<Value>) -> Result<DeltaPath, RunError> {
        self.element("line_chart", json!({ "rows": rows }))
    }

    /// Checkbox.
    fn checkbox(&mut self, label: &str, default: bool) -> Result<bool, RunError> {
        Ok(self.widget(WidgetSpec::checkbox(label, default))?.as_bool().unwrap_or(default))
    }

    /// Button; `true` only in the run right after a click.
    fn button(&mut self, label: &str) -> Result<bool, RunError> {
        Ok(self.widget(WidgetSpec::button(label))?.as_bool().unwrap_or(false))
    }

    /// Integer slider; values outside `min..=max` are clamped.
    fn slider(&mut self, label: &str, min: i64, max: i64, default: i64) -> Result<i64, RunError> {
        let value = self.widget(WidgetSpec::slider(label, min, max, default))?;
        Ok(slider_value(&value, min, max, default))
    }

    /// Single-line text input.
    fn text_input(&mut self, label: &str, default: &str) -> Result<String, RunError> {
        let value = self.widget(WidgetSpec::text_input(label, default))?;
        Ok(value.as_str().map_or_else(|| default.to_string(), str::to_string))
    }

    /// Select box; returns the chosen option, falling back to `options[index]`
    /// when the stored choice is no longer offered.
    fn selectbox(&mut self, label: &str, options: &[String], index: usize) -> Result<Option<String>, RunError> {
        let value = self.widget(WidgetSpec::selectbox(label, options, index))?;
        Ok(selectbox_value(&value, options, index))
    }

    /// A row of `n` equal columns; returns the column containers.
    fn columns(&mut self, n: usize) -> Result<Vec<DeltaPath>, RunError> {
        self.begin_block(Block::new(BlockKind::Horizontal))?;
        let mut columns = Vec::with_capacity(n);
        for _ in 0..n {
            let weight = 1.0 / n as f64;
            match self.begin_block(Block::with_props(BlockKind::Column, json!({ "weight": weight }))) {
                Ok(path) => {
                    columns.push(path);
                    self.end_block();
                }
                Err(err) => {
                    self.end_block();
                    return Err(err);
                }
            }
        }
        self.end_block();
        Ok(columns)
    }
}

/// Slider reading: the stored integer clamped to `min..=max`.
#[must_use]
pub fn slider_value(value: &WidgetValue, min: i64, max: i64, default: i64) -> i64 {
    value.as_i64().unwrap_or(default).clamp(min, max.max(min))
}

/// Select box reading: the stored choice if still offered, else `options[index]`.
#[must_use]
pub fn selectbox_value(value: &WidgetValue, options: &[String], index: usize) -> Option<String> {
    value
        .as_str()
        .filter(|chosen| options.iter().any(|o| o == chosen))
        .map(str::to_string)
        .or_else(|| options.get(index).cloned())
}

impl dyn UiBuilder + '_ {
    fn scoped<F>(&mut self, result: Result<(), RunError>, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        result?;
        let result = f(self);
        if result.as_ref().is_err_and(|e| !e.is_halt()) {
            self.mark_failure_location();
        }
        self.end_block();
        result
    }

    /// Build `f` inside a new vertical container.
    pub fn container<F>(&mut self, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        let opened = self.begin_block(Block::new(BlockKind::Vertical)).map(|_| ());
        self.scoped(opened, f)
    }

    /// Build `f` inside a new collapsible section.
    pub fn expander<F>(&mut self, label: &str, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        let block = Block::with_props(BlockKind::Expander, json!({ "label": label }));
        let opened = self.begin_block(block).map(|_| ());
        self.scoped(opened, f)
    }

    /// Build `f` inside an existing container, such as a column.
    pub fn within<F>(&mut self, container: &DeltaPath, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        let entered = self.enter(container);
        self.scoped(entered, f)
    }

    /// Build `f` in the sidebar.
    pub fn sidebar<F>(&mut self, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        self.within(&DeltaPath::root(SIDEBAR_CONTAINER), f)
    }

    /// Build `f` as the fragment `id`, which can be rerun on its own.
    pub fn fragment<F>(&mut self, id: &str, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&mut dyn UiBuilder) -> Result<(), RunError>,
    {
        self.begin_fragment(id)?;
        let result = f(self);
        self.end_fragment();
        result
    }
}

/// Per-run implementation of [`UiBuilder`].
///
/// Borrows the runner's queue, mailbox and session state for the length of
/// one run.
#[derive(Debug)]
pub struct ScriptContext<'a> {
    queue: &'a ForwardMsgQueue,
    requests: &'a ScriptRequests,
    session_state: &'a mut SessionState,
    run_id: Uuid,
    scope: RunScope,
    changed: Vec<String>,
    /// Next child index, per container created (or entered) this run.
    cursors: HashMap<DeltaPath, u32>,
    /// Active containers, innermost last. Never empty.
    stack: Vec<DeltaPath>,
    fragments: Vec<String>,
    widget_ids: HashSet<String>,
    halted: Option<RunError>,
    failure_location: Option<DeltaPath>,
    emitted: usize,
}

impl<'a> ScriptContext<'a> {
    /// Start building for one run.
    pub fn new(
        queue: &'a ForwardMsgQueue,
        requests: &'a ScriptRequests,
        session_state: &'a mut SessionState,
        run_id: Uuid,
        scope: RunScope,
        changed: Vec<String>,
    ) -> Self {
        let main = DeltaPath::root(MAIN_CONTAINER);
        let cursors = [(main.clone(), 0), (DeltaPath::root(SIDEBAR_CONTAINER), 0)]
            .into_iter()
            .collect();

        Self {
            queue,
            requests,
            session_state,
            run_id,
            scope,
            changed,
            cursors,
            stack: vec![main],
            fragments: Vec::new(),
            widget_ids: HashSet::new(),
            halted: None,
            failure_location: None,
            emitted: 0,
        }
    }

    /// Number of deltas this run has enqueued.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Halt recorded for this run, if any.
    #[must_use]
    pub fn halted(&self) -> Option<&RunError> {
        self.halted.as_ref()
    }

    /// Widgets registered so far this run.
    #[must_use]
    pub fn widget_ids(&self) -> &HashSet<String> {
        &self.widget_ids
    }

    /// Finish the run, returning the ids of every widget it registered.
    #[must_use]
    pub fn into_widget_ids(self) -> HashSet<String> {
        self.widget_ids
    }

    /// Show an exception inline, where the script failed.
    ///
    /// Ignores halts, fragment scoping and pending requests: the user must
    /// see the error even if another run is already queued.
    pub fn emit_exception(&mut self, element: Element) {
        let parent = self
            .failure_location
            .clone()
            .or_else(|| self.stack.last().cloned())
            .unwrap_or_else(|| DeltaPath::root(MAIN_CONTAINER));
        let path = self.allocate_in(&parent);
        self.queue.enqueue_delta(Delta::NewElement { path, element });
        self.emitted += 1;
    }

    fn emitting(&self) -> bool {
        self.scope.is_app() || self.fragments.iter().any(|f| self.scope.includes_fragment(f))
    }

    fn emit(&mut self, delta: Delta) {
        if self.emitting() {
            self.queue.enqueue_delta(delta);
            self.emitted += 1;
        }
    }

    fn allocate_in(&mut self, parent: &DeltaPath) -> DeltaPath {
        let counter = self.cursors.entry(parent.clone()).or_insert(0);
        let path = parent.child(*counter);
        *counter += 1;
        path
    }

    fn allocate(&mut self) -> DeltaPath {
        let parent = self
            .stack
            .last()
            .cloned()
            .unwrap_or_else(|| DeltaPath::root(MAIN_CONTAINER));
        self.allocate_in(&parent)
    }
}

impl UiBuilder for ScriptContext<'_> {
    fn checkpoint(&mut self) -> Result<(), RunError> {
        if let Some(halt) = &self.halted {
            return Err(halt.clone());
        }
        if let Some(interrupt) = self.requests.checkpoint(&self.scope) {
            log::debug!("Run {} observed {interrupt} at checkpoint", self.run_id);
            let halt = RunError::Interrupted(interrupt);
            self.halted = Some(halt.clone());
            return Err(halt);
        }
        Ok(())
    }

    fn element(&mut self, kind: &str, props: Value) -> Result<DeltaPath, RunError> {
        self.checkpoint()?;
        let path = self.allocate();
        self.emit(Delta::NewElement {
            path: path.clone(),
            element: Element::new(kind, props),
        });
        Ok(path)
    }

    fn begin_block(&mut self, block: Block) -> Result<DeltaPath, RunError> {
        self.checkpoint()?;
        let path = self.allocate();
        self.cursors.insert(path.clone(), 0);
        self.stack.push(path.clone());
        self.emit(Delta::AddBlock {
            path: path.clone(),
            block,
        });
        Ok(path)
    }

    fn enter(&mut self, container: &DeltaPath) -> Result<(), RunError> {
        self.checkpoint()?;
        if !self.cursors.contains_key(container) {
            return Err(RunError::failed(
                "InvalidContainer",
                format!("No container at {container} in this run"),
            ));
        }
        self.stack.push(container.clone());
        Ok(())
    }

    fn end_block(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn mark_failure_location(&mut self) {
        if self.failure_location.is_none() {
            self.failure_location = self.stack.last().cloned();
        }
    }

    fn add_rows(&mut self, target: &DeltaPath, rows: Vec<Value>) -> Result<(), RunError> {
        self.checkpoint()?;
        self.emit(Delta::AddRows {
            path: target.clone(),
            rows: Rows { rows },
        });
        Ok(())
    }

    fn widget(&mut self, spec: WidgetSpec) -> Result<WidgetValue, RunError> {
        self.checkpoint()?;

        let id = spec.id();
        if !self.widget_ids.insert(id.clone()) {
            return Err(RunError::failed(
                "DuplicateWidgetId",
                format!(
                    "There are multiple widgets with the id {id:?}; give each `{}` a unique key",
                    spec.element
                ),
            ));
        }

        let value = self
            .session_state
            .register_widget(WidgetMetadata::new(id.clone(), spec.kind, spec.default));

        let mut props = match spec.props {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        props.insert("id".into(), Value::String(id));
        props.insert("label".into(), Value::String(spec.label));
        props.insert("value".into(), value.to_json());

        let path = self.allocate();
        self.emit(Delta::NewElement {
            path,
            element: Element::new(spec.element, Value::Object(props)),
        });
        Ok(value)
    }

    fn stop(&mut self) -> Result<(), RunError> {
        if self.halted.is_none() {
            self.halted = Some(RunError::StopRequested);
        }
        Err(RunError::StopRequested)
    }

    fn begin_fragment(&mut self, id: &str) -> Result<(), RunError> {
        self.checkpoint()?;
        self.fragments.push(id.to_string());
        Ok(())
    }

    fn end_fragment(&mut self) {
        self.fragments.pop();
    }

    fn changed_widgets(&self) -> &[String] {
        &self.changed
    }

    fn session_value(&self, key: &str) -> Option<Value> {
        self.session_state.get(key).cloned()
    }

    fn set_session_value(&mut self, key: &str, value: Value) {
        self.session_state.set(key, value);
    }

    fn remove_session_value(&mut self, key: &str) -> Option<Value> {
        self.session_state.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::ForwardMsg;
    use crate::runner::requests::RerunData;

    struct Fixture {
        queue: ForwardMsgQueue,
        requests: ScriptRequests,
        state: SessionState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                queue: ForwardMsgQueue::new(),
                requests: ScriptRequests::new(),
                state: SessionState::new(),
            }
        }

        fn context(&mut self, scope: RunScope) -> ScriptContext<'_> {
            ScriptContext::new(
                &self.queue,
                &self.requests,
                &mut self.state,
                Uuid::new_v4(),
                scope,
                Vec::new(),
            )
        }
    }

    fn paths(messages: &[ForwardMsg]) -> Vec<Vec<u32>> {
        messages
            .iter()
            .filter_map(ForwardMsg::as_delta)
            .map(|d| d.path().as_slice().to_vec())
            .collect()
    }

    #[test]
    fn test_elements_get_sequential_paths() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        let ui: &mut dyn UiBuilder = &mut ctx;

        ui.text("a").expect("text");
        ui.container(|ui| {
            ui.text("inside")?;
            ui.text("inside 2")?;
            Ok(())
        })
        .expect("container");
        ui.text("b").expect("text");
        drop(ctx);

        assert_eq!(
            paths(&fx.queue.flush()),
            vec![vec![0, 0], vec![0, 1], vec![0, 1, 0], vec![0, 1, 1], vec![0, 2]]
        );
    }

    #[test]
    fn test_columns_and_sidebar() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        let ui: &mut dyn UiBuilder = &mut ctx;

        let cols = ui.columns(2).expect("columns");
        ui.within(&cols[1], |ui| ui.text("right").map(|_| ())).expect("within");
        ui.sidebar(|ui| ui.text("side").map(|_| ())).expect("sidebar");
        ui.text("after").expect("text");
        drop(ctx);

        assert_eq!(
            paths(&fx.queue.flush()),
            vec![
                vec![0, 0],
                vec![0, 0, 0],
                vec![0, 0, 1],
                vec![0, 0, 1, 0],
                vec![1, 0],
                vec![0, 1]
            ]
        );
    }

    #[test]
    fn test_widget_registers_and_reports_value() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        assert!(!ctx.checkbox("k", false).expect("checkbox"));
        assert!(ctx.widget_ids().contains("checkbox:k"));
        drop(ctx);

        let flushed = fx.queue.flush();
        let Some(Delta::NewElement { element, .. }) = flushed[0].as_delta() else {
            panic!("expected element");
        };
        assert_eq!(element.props["id"], "checkbox:k");
        assert_eq!(element.props["value"], false);
    }

    #[test]
    fn test_duplicate_widget_id_fails() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        ctx.button("go").expect("first");
        let err = ctx.button("go").expect_err("duplicate");
        assert!(matches!(err, RunError::Failed(ref e) if e.type_name == "DuplicateWidgetId"));
    }

    #[test]
    fn test_checkpoint_observes_pending_rerun_and_stays_halted() {
        let mut fx = Fixture::new();
        fx.requests.request_rerun(RerunData::new());
        let mut ctx = fx.context(RunScope::App);

        let err = ctx.text("x").expect_err("interrupted");
        assert_eq!(err, RunError::Interrupted(crate::runner::Interrupt::Rerun));
        assert_eq!(ctx.text("y").expect_err("still halted"), err);
        assert_eq!(ctx.emitted(), 0);
    }

    #[test]
    fn test_stop_halts_further_building() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        ctx.text("before").expect("text");
        assert_eq!(ctx.stop(), Err(RunError::StopRequested));
        assert_eq!(ctx.text("after"), Err(RunError::StopRequested));
        assert_eq!(ctx.emitted(), 1);
    }

    #[test]
    fn test_fragment_scope_only_emits_inside_fragment() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::fragment("clock"));
        let ui: &mut dyn UiBuilder = &mut ctx;

        ui.text("outside").expect("text");
        ui.fragment("clock", |ui| ui.text("tick").map(|_| ())).expect("fragment");
        ui.fragment("other", |ui| ui.text("nope").map(|_| ())).expect("fragment");
        drop(ctx);

        assert_eq!(paths(&fx.queue.flush()), vec![vec![0, 1]]);
    }

    #[test]
    fn test_exception_lands_in_failing_container() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        let ui: &mut dyn UiBuilder = &mut ctx;

        ui.text("top").expect("text");
        let result = ui.container(|ui| {
            ui.text("inside")?;
            Err(RunError::failed("ValueError", "bad"))
        });
        assert!(result.is_err());
        ctx.emit_exception(Element::exception("ValueError", "bad", &[]));
        drop(ctx);

        assert_eq!(
            paths(&fx.queue.flush()),
            vec![vec![0, 0], vec![0, 1], vec![0, 1, 0], vec![0, 1, 1]]
        );
    }

    #[test]
    fn test_add_rows_does_not_advance_cursor() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        let chart = ctx.line_chart(vec![json!(1)]).expect("chart");
        ctx.add_rows(&chart, vec![json!(2)]).expect("rows");
        let next = ctx.text("after").expect("text");
        assert_eq!(next.as_slice(), &[0, 1]);
    }

    #[test]
    fn test_enter_unknown_container_fails() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        let err = ctx.enter(&DeltaPath::from(vec![0, 9])).expect_err("unknown");
        assert!(matches!(err, RunError::Failed(_)));
    }

    #[test]
    fn test_session_keys_set_read_and_remove() {
        let mut fx = Fixture::new();
        let mut ctx = fx.context(RunScope::App);
        ctx.set_session_value("rows", json!([1, 2]));
        assert_eq!(ctx.session_value("rows"), Some(json!([1, 2])));
        assert_eq!(ctx.remove_session_value("rows"), Some(json!([1, 2])));
        assert_eq!(ctx.session_value("rows"), None);
        assert_eq!(ctx.remove_session_value("rows"), None);
        drop(ctx);
        assert!(fx.state.get("rows").is_none());
    }
}
