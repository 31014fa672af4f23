//! Per-session store of widget values and user keys.
//!
//! Widgets in a script are rebuilt on every run, but their values must
//! survive from one run to the next. The store keeps three things per
//! widget id:
//!
//! ```text
//! SessionState (owned by the script runner worker)
//! ├── metadata: HashMap<String, WidgetMetadata>   recorded at registration
//! ├── values:   HashMap<String, WidgetValue>      coerced, script-visible
//! ├── parked:   HashMap<String, WidgetValue>      client values awaiting metadata
//! └── user:     HashMap<String, serde_json::Value> set by the script itself
//! ```
//!
//! Client snapshots are merged, never blindly written: values are coerced
//! through the metadata recorded by an earlier run, and ids the snapshot
//! does not mention are left alone.

// Rust guideline compliant 2026-02

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::value::{WidgetKind, WidgetValue};
use super::widget_states::WidgetStates;

/// Registration record for a widget, established by the run that built it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetMetadata {
    /// Stable widget id (explicit key or derived from kind and label).
    pub id: String,
    /// Declared value type.
    pub kind: WidgetKind,
    /// Value used when nothing else is known.
    pub default: WidgetValue,
}

impl WidgetMetadata {
    /// Create a metadata record.
    pub fn new(id: impl Into<String>, kind: WidgetKind, default: WidgetValue) -> Self {
        Self {
            id: id.into(),
            kind,
            default,
        }
    }
}

/// Widget values, widget metadata and user keys for one session.
#[derive(Debug, Default)]
pub struct SessionState {
    metadata: HashMap<String, WidgetMetadata>,
    values: HashMap<String, WidgetValue>,
    parked: HashMap<String, WidgetValue>,
    user: HashMap<String, serde_json::Value>,
}

impl SessionState {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for a new run.
    ///
    /// Fired triggers from the previous run are reset first, so a click is
    /// seen by exactly one run. Then `snapshot` (if any) is merged in.
    /// Returns the ids whose script-visible value changed.
    pub fn begin_run(&mut self, snapshot: Option<&WidgetStates>) -> Vec<String> {
        self.reset_triggers();
        snapshot.map(|s| self.apply_snapshot(s)).unwrap_or_default()
    }

    /// Merge a client snapshot.
    ///
    /// Known widgets get the value coerced to their registered kind; a value
    /// that cannot be coerced is logged and ignored. Unknown ids are parked
    /// until a run registers them.
    pub fn apply_snapshot(&mut self, snapshot: &WidgetStates) -> Vec<String> {
        let mut changed = Vec::new();

        for (id, incoming) in snapshot.iter() {
            let Some(meta) = self.metadata.get(id) else {
                self.parked.insert(id.to_string(), incoming.clone());
                continue;
            };

            match incoming.coerce_to(meta.kind) {
                Some(value) => {
                    if self.values.get(id) != Some(&value) {
                        changed.push(id.to_string());
                    }
                    self.values.insert(id.to_string(), value);
                }
                None => {
                    log::warn!(
                        "Ignoring value for widget {id}: {} does not coerce to {}",
                        incoming.kind(),
                        meta.kind
                    );
                }
            }
        }

        changed
    }

    /// Record a widget built by the current run and return its value.
    ///
    /// Resolution order: a parked client value (coerced), then the stored
    /// value if it still reads as the declared kind, then the default.
    pub fn register_widget(&mut self, meta: WidgetMetadata) -> WidgetValue {
        let id = meta.id.clone();

        let parked = self.parked.remove(&id).and_then(|raw| {
            let coerced = raw.coerce_to(meta.kind);
            if coerced.is_none() {
                log::warn!(
                    "Dropping parked value for widget {id}: {} does not coerce to {}",
                    raw.kind(),
                    meta.kind
                );
            }
            coerced
        });

        let value = parked
            .or_else(|| self.values.get(&id).and_then(|v| v.coerce_to(meta.kind)))
            .unwrap_or_else(|| meta.default.clone());

        self.values.insert(id.clone(), value.clone());
        self.metadata.insert(id, meta);
        value
    }

    /// Drop every widget not registered by a completed run.
    pub fn end_run(&mut self, registered: &HashSet<String>) {
        let before = self.metadata.len();
        self.metadata.retain(|id, _| registered.contains(id));
        self.values.retain(|id, _| registered.contains(id));
        self.parked.retain(|id, _| registered.contains(id));

        let pruned = before.saturating_sub(self.metadata.len());
        if pruned > 0 {
            log::debug!("Pruned {pruned} stale widget(s) from session state");
        }
    }

    fn reset_triggers(&mut self) {
        for value in self.values.values_mut() {
            if let WidgetValue::Trigger(fired) = value {
                *fired = false;
            }
        }
    }

    /// Current value of a widget, if it has one.
    #[must_use]
    pub fn widget_value(&self, id: &str) -> Option<&WidgetValue> {
        self.values.get(id)
    }

    /// Registration record of a widget.
    #[must_use]
    pub fn widget_metadata(&self, id: &str) -> Option<&WidgetMetadata> {
        self.metadata.get(id)
    }

    /// Snapshot of every widget value, for display and debugging.
    #[must_use]
    pub fn widget_snapshot(&self) -> WidgetStates {
        self.values
            .iter()
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect()
    }

    /// Number of registered widgets.
    #[must_use]
    pub fn widget_count(&self) -> usize {
        self.metadata.len()
    }

    /// Read a script-set key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.user.get(key)
    }

    /// Set a script-set key. These survive reruns and are never pruned.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.user.insert(key.into(), value);
    }

    /// Remove a script-set key, returning the old value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.user.remove(key)
    }
}
