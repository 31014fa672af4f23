//! Widget state that survives across script reruns.
//!
//! - [`value`] - tagged widget values and coercion rules
//! - [`widget_states`] - snapshots carried by rerun requests, and their merge
//! - [`session_state`] - the per-session store the script reads from

pub mod session_state;
pub mod value;
pub mod widget_states;

pub use session_state::{SessionState, WidgetMetadata};
pub use value::{WidgetKind, WidgetValue};
pub use widget_states::WidgetStates;
