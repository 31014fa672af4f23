//! Widget-state snapshots carried by rerun requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::WidgetValue;

/// Widget id → value, as sent by the client with a rerun request.
///
/// A snapshot may be partial: ids it does not mention keep whatever value
/// session state already holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetStates {
    widgets: BTreeMap<String, WidgetValue>,
}

impl WidgetStates {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `id`, replacing any previous one.
    pub fn insert(&mut self, id: impl Into<String>, value: WidgetValue) {
        self.widgets.insert(id.into(), value);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, value: WidgetValue) -> Self {
        self.insert(id, value);
        self
    }

    /// Value for `id`, if the snapshot carries one.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WidgetValue> {
        self.widgets.get(id)
    }

    /// Number of widgets in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    /// True if the snapshot carries no widgets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Iterate `(id, value)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WidgetValue)> {
        self.widgets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fold a newer snapshot into this one.
    ///
    /// Ids present in only one side are kept. For ids present in both, the
    /// newer value wins, except that two triggers merge as `old OR new` so a
    /// click is never lost to coalescing. Values of different types are a
    /// conflict: logged and resolved in favour of the newer value.
    ///
    /// Returns the ids that conflicted.
    pub fn coalesce(&mut self, newer: Self) -> Vec<String> {
        let mut conflicts = Vec::new();
        for (id, new_value) in newer.widgets {
            let merged = match (self.widgets.get(&id), new_value) {
                (Some(WidgetValue::Trigger(old)), WidgetValue::Trigger(new)) => {
                    WidgetValue::Trigger(*old || new)
                }
                (Some(old), new) if old.kind() != new.kind() => {
                    log::warn!(
                        "Coalescing conflict for widget {id}: {} replaced by {}",
                        old.kind(),
                        new.kind()
                    );
                    conflicts.push(id.clone());
                    new
                }
                (_, new) => new,
            };
            self.widgets.insert(id, merged);
        }
        conflicts
    }
}

impl FromIterator<(String, WidgetValue)> for WidgetStates {
    fn from_iter<I: IntoIterator<Item = (String, WidgetValue)>>(iter: I) -> Self {
        Self {
            widgets: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for WidgetStates {
    type Item = (String, WidgetValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, WidgetValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.widgets.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_value_wins() {
        let mut old = WidgetStates::new().with("slider", WidgetValue::Int(1));
        old.coalesce(WidgetStates::new().with("slider", WidgetValue::Int(7)));
        assert_eq!(old.get("slider"), Some(&WidgetValue::Int(7)));
    }

    #[test]
    fn test_triggers_merge_as_or() {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let mut old = WidgetStates::new().with("btn", WidgetValue::Trigger(a));
            old.coalesce(WidgetStates::new().with("btn", WidgetValue::Trigger(b)));
            assert_eq!(old.get("btn"), Some(&WidgetValue::Trigger(a || b)), "{a} OR {b}");
        }
    }

    #[test]
    fn test_disjoint_ids_are_kept() {
        let mut old = WidgetStates::new().with("a", WidgetValue::Bool(true));
        old.coalesce(WidgetStates::new().with("b", WidgetValue::Bool(false)));
        assert_eq!(old.len(), 2);
        assert_eq!(old.get("a"), Some(&WidgetValue::Bool(true)));
    }

    #[test]
    fn test_conflicting_types_take_newer() {
        let mut old = WidgetStates::new().with("w", WidgetValue::Trigger(true));
        let conflicts = old.coalesce(WidgetStates::new().with("w", WidgetValue::String("x".into())));
        assert_eq!(old.get("w"), Some(&WidgetValue::String("x".into())));
        assert_eq!(conflicts, vec!["w".to_string()]);

        let mut old = WidgetStates::new().with("n", WidgetValue::Int(3));
        let conflicts = old.coalesce(WidgetStates::new().with("n", WidgetValue::String("x".into())));
        assert_eq!(old.get("n"), Some(&WidgetValue::String("x".into())));
        assert_eq!(conflicts, vec!["n".to_string()]);

        let mut same = WidgetStates::new().with("n", WidgetValue::Int(3));
        assert!(same.coalesce(WidgetStates::new().with("n", WidgetValue::Int(4))).is_empty());
    }

    #[test]
    fn test_snapshot_decodes_from_client_json() {
        let states: WidgetStates =
            serde_json::from_str(r#"{"k": {"bool": true}, "go": {"trigger": true}}"#)
                .expect("decode snapshot");
        assert_eq!(states.get("k"), Some(&WidgetValue::Bool(true)));
        assert!(states.get("go").is_some_and(WidgetValue::is_fired_trigger));
    }
}
