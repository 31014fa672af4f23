//! Scriptcast - rerun-on-interaction script host.
//!
//! A user script is executed top to bottom on a dedicated thread. Every UI
//! call it makes becomes a delta addressed by its structural position, and
//! the deltas are streamed to the client as newline-delimited JSON. Widget
//! interactions from the client schedule a rerun carrying the new widget
//! values; a rerun requested while the script is running interrupts it at
//! the next UI call.
//!
//! # Architecture
//!
//! ```text
//!  client ──BackMsg──► Session ──► ScriptRequests (mailbox, coalescing)
//!                         │                │
//!                         │                ▼
//!                         │          ScriptRunner thread
//!                         │            └── Script::run(&mut ScriptContext)
//!                         │                        │ deltas
//!                         ▼                        ▼
//!                     delivery loop ◄──── ForwardMsgQueue (compose in place)
//!                         │
//!  client ◄──ForwardMsg───┘
//! ```
//!
//! # Modules
//!
//! - [`runner`] - Request mailbox, per-run builder and the runner thread
//! - [`state`] - Widget values and script-owned session state
//! - [`delta`] - Delta model and the outgoing message queue
//! - [`session`] - One client connection: inbound messages and lifecycle
//! - [`delivery`] - Periodic flush of the queue to the client
//! - [`lua`] - Lua host for `.lua` scripts
//! - [`file_watcher`] - Rerun when the script file is saved
//! - [`config`] - Configuration loading/saving

pub mod config;
pub mod constants;
pub mod delivery;
pub mod delta;
pub mod file_watcher;
pub mod lua;
pub mod runner;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use delta::{Delta, DeltaPath, ForwardMsg, ForwardMsgQueue};
pub use lua::LuaScript;
pub use runner::{RerunData, RunError, RunScope, Script, ScriptRunner, UiBuilder, WidgetSpec};
pub use session::{BackMsg, Session};
pub use state::{SessionState, WidgetStates, WidgetValue};
