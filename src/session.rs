//! One client session: the script runner, its outgoing queue, and the
//! decoding of client messages into runner requests.
//!
//! ```text
//! client ──BackMsg──► Session::handle_backmsg ──► ScriptRequests
//!                                                    │
//!                          ScriptRunner worker ◄─────┘
//!                                │
//! client ◄──ForwardMsg── delivery ◄── ForwardMsgQueue
//! ```
//!
//! A new session immediately requests its first full run.

// Rust guideline compliant 2026-02

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::delta::{ForwardMsg, ForwardMsgQueue};
use crate::runner::{
    RerunData, RunScope, RunState, RunnerView, Script, ScriptRequests, ScriptRunner,
};
use crate::state::WidgetStates;

/// Message from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackMsg {
    /// Rerun after an interaction.
    RerunScript {
        /// Widget values the client holds; omitted to rerun as-is.
        #[serde(default)]
        widget_states: Option<WidgetStates>,
        /// Rerun only this fragment.
        #[serde(default)]
        fragment_id: Option<String>,
    },
    /// Stop the current run.
    StopScript,
    /// End the session.
    Shutdown,
}

/// A running client session.
pub struct Session {
    id: String,
    config: Arc<Config>,
    queue: Arc<ForwardMsgQueue>,
    requests: Arc<ScriptRequests>,
    view: RunnerView,
    runner: Mutex<ScriptRunner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.requests.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session running `script` and request the initial run.
    ///
    /// # Errors
    ///
    /// Returns an error if the script runner thread cannot be spawned.
    pub fn start<S>(script: S, config: Arc<Config>) -> Result<Self>
    where
        S: Script + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let queue = Arc::new(ForwardMsgQueue::new());
        let runner = ScriptRunner::spawn(&id, script, Arc::clone(&queue), Arc::clone(&config))?;
        let requests = Arc::clone(runner.requests());
        let view = runner.view().clone();

        requests.request_rerun(RerunData::new());
        log::info!("Session {id} started");

        Ok(Self {
            id,
            config,
            queue,
            requests,
            view,
            runner: Mutex::new(runner),
        })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Outgoing queue, for the delivery loop.
    #[must_use]
    pub fn queue(&self) -> &Arc<ForwardMsgQueue> {
        &self.queue
    }

    /// Request mailbox, for producers such as the file watcher.
    #[must_use]
    pub fn requests(&self) -> &Arc<ScriptRequests> {
        &self.requests
    }

    /// Take every queued outgoing message.
    pub fn flush(&self) -> Vec<ForwardMsg> {
        self.queue.flush()
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.requests.state()
    }

    /// Widget values as of the last finished run.
    #[must_use]
    pub fn widget_snapshot(&self) -> WidgetStates {
        self.view.widget_snapshot()
    }

    /// Turn a client message into a runner request.
    ///
    /// Returns `false` if the session is shut down and the message was
    /// dropped.
    pub fn handle_backmsg(&self, msg: BackMsg) -> bool {
        log::debug!("Session {} received {msg:?}", self.id);
        match msg {
            BackMsg::RerunScript {
                widget_states,
                fragment_id,
            } => {
                let scope = fragment_id.map_or(RunScope::App, RunScope::fragment);
                self.requests.request_rerun(RerunData { widget_states, scope })
            }
            BackMsg::StopScript => self.requests.request_stop(),
            BackMsg::Shutdown => self.requests.request_shutdown(),
        }
    }

    /// Decode one JSON client message and handle it.
    ///
    /// # Errors
    ///
    /// Returns an error if `line` is not a valid client message.
    pub fn handle_json(&self, line: &str) -> Result<bool> {
        let msg: BackMsg = serde_json::from_str(line).context("Invalid client message")?;
        Ok(self.handle_backmsg(msg))
    }

    /// Shut the runner down, waiting up to the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the runner does not stop in time.
    pub fn shutdown(&self) -> Result<()> {
        log::info!("Session {} shutting down", self.id);
        self.requests.request_shutdown();
        self.runner
            .lock()
            .expect("script runner lock poisoned")
            .shutdown(self.config.shutdown_timeout())
    }

    /// True once the script runner has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.view.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WidgetValue;

    #[test]
    fn test_backmsg_wire_shape() {
        let msg: BackMsg = serde_json::from_str(
            r#"{"type":"rerun_script","widget_states":{"checkbox:k":{"bool":true}}}"#,
        )
        .expect("decode");
        assert_eq!(
            msg,
            BackMsg::RerunScript {
                widget_states: Some(WidgetStates::new().with("checkbox:k", WidgetValue::Bool(true))),
                fragment_id: None,
            }
        );

        let stop: BackMsg = serde_json::from_str(r#"{"type":"stop_script"}"#).expect("decode");
        assert_eq!(stop, BackMsg::StopScript);
        let bare: BackMsg = serde_json::from_str(r#"{"type":"rerun_script"}"#).expect("decode");
        assert!(matches!(bare, BackMsg::RerunScript { widget_states: None, fragment_id: None }));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let session = Session::start(
            |_ui: &mut dyn crate::runner::UiBuilder| -> Result<(), crate::runner::RunError> { Ok(()) },
            Arc::new(Config::default()),
        )
        .expect("start");
        let err = session.handle_json(r#"{"type":"dance"}"#).unwrap_err();
        assert!(format!("{err:#}").starts_with("Invalid client message: "), "{err:#}");
        assert!(session.handle_json("not json").is_err());
        session.shutdown().expect("shutdown");
        assert!(!session.handle_backmsg(BackMsg::StopScript));
    }
}
