//! Outgoing UI mutations and session lifecycle messages.
//!
//! A [`Delta`] addresses one location in the tree of UI containers through a
//! [`DeltaPath`]: the root container index (`0` main, `1` sidebar), then the
//! child index at every level down to the leaf. Element and block payloads
//! are opaque JSON here; rendering them is the client's business.
//!
//! Deltas travel wrapped in [`ForwardMsg`], next to the lifecycle messages the
//! client needs to know when a run starts and how it ended.

pub mod queue;

pub use queue::ForwardMsgQueue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::runner::RunScope;

/// Root container index for the main body.
pub const MAIN_CONTAINER: u32 = 0;
/// Root container index for the sidebar.
pub const SIDEBAR_CONTAINER: u32 = 1;

/// Structural address of a UI location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaPath(Vec<u32>);

impl DeltaPath {
    /// Path of a root container.
    #[must_use]
    pub fn root(container: u32) -> Self {
        Self(vec![container])
    }

    /// Path of the `index`-th child of this location.
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    /// Path components, root first.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

}

impl From<Vec<u32>> for DeltaPath {
    fn from(path: Vec<u32>) -> Self {
        Self(path)
    }
}

impl From<&[u32]> for DeltaPath {
    fn from(path: &[u32]) -> Self {
        Self(path.to_vec())
    }
}

impl std::fmt::Display for DeltaPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "({})", parts.join(","))
    }
}

/// A leaf UI element (text, chart, widget, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element type understood by the client (`"text"`, `"checkbox"`, ...).
    pub kind: String,
    /// Type-specific payload.
    pub props: serde_json::Value,
}

impl Element {
    /// Create an element.
    pub fn new(kind: impl Into<String>, props: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            props,
        }
    }

    /// Inline error element describing an exception.
    #[must_use]
    pub fn exception(type_name: &str, message: &str, stack_trace: &[String]) -> Self {
        Self::new(
            "exception",
            serde_json::json!({
                "type": type_name,
                "message": message,
                "stack_trace": stack_trace,
            }),
        )
    }
}

/// Layout of a container block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Children stacked top to bottom.
    Vertical,
    /// Children laid out side by side (a row of columns).
    Horizontal,
    /// One column inside a horizontal block.
    Column,
    /// Collapsible section.
    Expander,
}

/// A container that later deltas can place children into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Layout of the container.
    pub kind: BlockKind,
    /// Layout-specific payload (column weight, expander label, ...).
    pub props: serde_json::Value,
}

impl Block {
    /// Create a block with empty props.
    #[must_use]
    pub fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            props: serde_json::Value::Null,
        }
    }

    /// Create a block with props.
    #[must_use]
    pub fn with_props(kind: BlockKind, props: serde_json::Value) -> Self {
        Self { kind, props }
    }
}

/// Rows appended to an existing data element (chart, table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    /// Appended rows, in order.
    pub rows: Vec<serde_json::Value>,
}

/// One incremental UI mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum Delta {
    /// Create or replace the element at `path`.
    NewElement {
        /// Target location.
        path: DeltaPath,
        /// Element payload.
        element: Element,
    },
    /// Create a container at `path`.
    AddBlock {
        /// Target location.
        path: DeltaPath,
        /// Block payload.
        block: Block,
    },
    /// Append rows to the data element at `path`.
    AddRows {
        /// Location of the element receiving the rows.
        path: DeltaPath,
        /// Appended rows.
        rows: Rows,
    },
}

impl Delta {
    /// Location this delta addresses.
    #[must_use]
    pub fn path(&self) -> &DeltaPath {
        match self {
            Self::NewElement { path, .. } | Self::AddBlock { path, .. } | Self::AddRows { path, .. } => {
                path
            }
        }
    }

    /// True for [`Delta::AddBlock`].
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::AddBlock { .. })
    }

    /// True for [`Delta::AddRows`].
    #[must_use]
    pub const fn is_add_rows(&self) -> bool {
        matches!(self, Self::AddRows { .. })
    }
}

/// How a script run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishedStatus {
    /// Ran to the end.
    Success,
    /// Raised an exception; an exception element was emitted.
    Error,
    /// Could not be loaded at all; an exception element was emitted.
    CompileError,
    /// Stopped early, by the script itself or a stop request.
    Stopped,
    /// Abandoned at a checkpoint because a rerun was requested.
    RerunRequested,
}

/// Message to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ForwardMsg {
    /// A UI mutation.
    Delta(Delta),
    /// A script run has begun.
    ScriptStarted {
        /// Unique id of the run.
        run_id: Uuid,
        /// What the run covers.
        scope: RunScope,
    },
    /// A script run has ended.
    ScriptFinished {
        /// Id from the matching `ScriptStarted`.
        run_id: Uuid,
        /// How it ended.
        status: FinishedStatus,
    },
    /// The session's script runner has exited; no further runs will happen.
    SessionShutdown,
}

impl ForwardMsg {
    /// Delta carried by this message, if any.
    #[must_use]
    pub const fn as_delta(&self) -> Option<&Delta> {
        match self {
            Self::Delta(delta) => Some(delta),
            _ => None,
        }
    }
}

impl From<Delta> for ForwardMsg {
    fn from(delta: Delta) -> Self {
        Self::Delta(delta)
    }
}
