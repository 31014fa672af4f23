//! Tagged widget values and their coercion rules.
//!
//! Values arrive from the client already tagged (`{"bool": true}`,
//! `{"trigger": true}`, ...). The tag is only a hint: the kind a widget was
//! registered with decides how a value is read back, via
//! [`WidgetValue::coerce_to`].

use serde::{Deserialize, Serialize};

/// Declared type of a widget, recorded when a script registers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Checkbox, toggle.
    Bool,
    /// One-shot value (button click): `true` only for the run right after
    /// the interaction, reset before the next one.
    Trigger,
    /// Integer slider or number input.
    Int,
    /// Float slider or number input.
    Float,
    /// Text input, radio or select box storing the chosen label.
    String,
    /// Raw bytes (file payloads, opaque client state).
    Bytes,
    /// Multi-select and other list-valued widgets.
    List,
}

impl WidgetKind {
    /// Lowercase name used in widget ids and log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Trigger => "trigger",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
        }
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known value of an interactive element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetValue {
    /// Boolean state.
    Bool(bool),
    /// Trigger state; merges as logical OR when requests coalesce.
    Trigger(bool),
    /// Integer state.
    Int(i64),
    /// Floating point state.
    Float(f64),
    /// Text state.
    String(String),
    /// Binary state.
    Bytes(Vec<u8>),
    /// List state.
    List(Vec<WidgetValue>),
}

impl WidgetValue {
    /// Kind this value carries on the wire.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        match self {
            Self::Bool(_) => WidgetKind::Bool,
            Self::Trigger(_) => WidgetKind::Trigger,
            Self::Int(_) => WidgetKind::Int,
            Self::Float(_) => WidgetKind::Float,
            Self::String(_) => WidgetKind::String,
            Self::Bytes(_) => WidgetKind::Bytes,
            Self::List(_) => WidgetKind::List,
        }
    }

    /// True for a fired trigger.
    #[must_use]
    pub const fn is_fired_trigger(&self) -> bool {
        matches!(self, Self::Trigger(true))
    }

    /// Read this value as `kind`.
    ///
    /// Returns `None` when no lossless-enough reading exists (a string that
    /// does not parse as a number, a non-finite float for an int widget, a
    /// scalar for a list widget, ...). Callers log and keep the previous
    /// value in that case.
    #[must_use]
    pub fn coerce_to(&self, kind: WidgetKind) -> Option<Self> {
        match (kind, self) {
            (WidgetKind::Bool, Self::Bool(b) | Self::Trigger(b)) => Some(Self::Bool(*b)),
            (WidgetKind::Bool, Self::Int(i)) => Some(Self::Bool(*i != 0)),
            (WidgetKind::Bool, Self::String(s)) => parse_bool(s).map(Self::Bool),

            (WidgetKind::Trigger, Self::Trigger(b) | Self::Bool(b)) => Some(Self::Trigger(*b)),

            (WidgetKind::Int, Self::Int(i)) => Some(Self::Int(*i)),
            (WidgetKind::Int, Self::Float(f)) if f.is_finite() => Some(Self::Int(f.trunc() as i64)),
            (WidgetKind::Int, Self::String(s)) => s.trim().parse().ok().map(Self::Int),

            (WidgetKind::Float, Self::Float(f)) => Some(Self::Float(*f)),
            (WidgetKind::Float, Self::Int(i)) => Some(Self::Float(*i as f64)),
            (WidgetKind::Float, Self::String(s)) => s.trim().parse().ok().map(Self::Float),

            (WidgetKind::String, Self::String(s)) => Some(Self::String(s.clone())),
            (WidgetKind::String, Self::Int(i)) => Some(Self::String(i.to_string())),
            (WidgetKind::String, Self::Float(f)) => Some(Self::String(f.to_string())),

            (WidgetKind::Bytes, Self::Bytes(b)) => Some(Self::Bytes(b.clone())),
            (WidgetKind::Bytes, Self::String(s)) => Some(Self::Bytes(s.as_bytes().to_vec())),

            (WidgetKind::List, Self::List(items)) => Some(Self::List(items.clone())),

            _ => None,
        }
    }

    /// Boolean reading, for scripts that branch on a checkbox or button.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) | Self::Trigger(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer reading.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String reading.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON form, used when a value is embedded in an element payload
    /// or handed to a scripting runtime.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) | Self::Trigger(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::from(b.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_accepts_int_and_string() {
        assert_eq!(WidgetValue::Int(3).coerce_to(WidgetKind::Bool), Some(WidgetValue::Bool(true)));
        assert_eq!(
            WidgetValue::String("off".into()).coerce_to(WidgetKind::Bool),
            Some(WidgetValue::Bool(false))
        );
        assert_eq!(WidgetValue::String("maybe".into()).coerce_to(WidgetKind::Bool), None);
    }

    #[test]
    fn test_trigger_and_bool_interchange() {
        assert_eq!(
            WidgetValue::Bool(true).coerce_to(WidgetKind::Trigger),
            Some(WidgetValue::Trigger(true))
        );
        assert_eq!(
            WidgetValue::Trigger(true).coerce_to(WidgetKind::Bool),
            Some(WidgetValue::Bool(true))
        );
        assert_eq!(WidgetValue::Int(1).coerce_to(WidgetKind::Trigger), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(WidgetValue::Float(4.9).coerce_to(WidgetKind::Int), Some(WidgetValue::Int(4)));
        assert_eq!(WidgetValue::Float(f64::NAN).coerce_to(WidgetKind::Int), None);
        assert_eq!(WidgetValue::Int(2).coerce_to(WidgetKind::Float), Some(WidgetValue::Float(2.0)));
        assert_eq!(
            WidgetValue::String(" 17 ".into()).coerce_to(WidgetKind::Int),
            Some(WidgetValue::Int(17))
        );
    }

    #[test]
    fn test_list_rejects_scalars() {
        assert_eq!(WidgetValue::String("a".into()).coerce_to(WidgetKind::List), None);
        let list = WidgetValue::List(vec![WidgetValue::Int(1)]);
        assert_eq!(list.coerce_to(WidgetKind::List), Some(list.clone()));
    }

    #[test]
    fn test_wire_format_is_externally_tagged() {
        let v: WidgetValue = serde_json::from_str(r#"{"trigger": true}"#).expect("decode");
        assert_eq!(v, WidgetValue::Trigger(true));
        let encoded = serde_json::to_string(&WidgetValue::Int(5)).expect("encode");
        assert_eq!(encoded, r#"{"int":5}"#);
    }
}
