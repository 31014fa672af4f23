//! Mailbox between request producers and the script runner worker.
//!
//! Producers (client message handlers, the file watcher, the host shutting
//! down) call [`ScriptRequests::enqueue`] from any thread. The worker is the
//! only consumer. At most one request of each kind is ever pending:
//!
//! ```text
//! pending: VecDeque<ScriptRequest>   (<= 1 Stop, <= 1 Rerun, <= 1 Shutdown)
//! state:   RunState
//!
//! enqueue(Rerun)    Running | Stopped ──► RerunRequested
//! dequeue_or_stop   RerunRequested ──► Running      (rerun popped)
//!                   Running ──► Stopped              (nothing left)
//! enqueue(Shutdown) any ──► terminal                 (later enqueues rejected)
//! ```
//!
//! Every mutation, including the widget-state merge of two reruns, happens
//! under the one mutex, so no producer ever sees a half-merged request.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use serde::{Deserialize, Serialize};

use super::error::Interrupt;
use crate::state::WidgetStates;

/// Part of the app a rerun covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "fragments", rename_all = "snake_case")]
pub enum RunScope {
    /// The whole script.
    #[default]
    App,
    /// Only the named fragments, in request order.
    Fragments(Vec<String>),
}

impl RunScope {
    /// Scope for a single fragment.
    pub fn fragment(id: impl Into<String>) -> Self {
        Self::Fragments(vec![id.into()])
    }

    /// True for [`RunScope::App`].
    #[must_use]
    pub const fn is_app(&self) -> bool {
        matches!(self, Self::App)
    }

    /// True if the fragment `id` runs under this scope.
    #[must_use]
    pub fn includes_fragment(&self, id: &str) -> bool {
        match self {
            Self::App => true,
            Self::Fragments(ids) => ids.iter().any(|f| f == id),
        }
    }

    /// Widen this scope to also cover `other`.
    pub fn merge(&mut self, other: Self) {
        match (&mut *self, other) {
            (Self::App, _) => {}
            (this, Self::App) => *this = Self::App,
            (Self::Fragments(ids), Self::Fragments(more)) => {
                for id in more {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
    }
}

/// Payload of a rerun request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RerunData {
    /// Widget values to apply before the run; `None` reruns with whatever
    /// the last run left behind.
    pub widget_states: Option<WidgetStates>,
    /// What the run covers.
    pub scope: RunScope,
}

impl RerunData {
    /// Full-app rerun with no new widget values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-app rerun carrying a snapshot.
    #[must_use]
    pub fn with_widget_states(widget_states: WidgetStates) -> Self {
        Self {
            widget_states: Some(widget_states),
            scope: RunScope::App,
        }
    }

    /// Set the scope.
    #[must_use]
    pub fn scoped(mut self, scope: RunScope) -> Self {
        self.scope = scope;
        self
    }

    /// Fold a newer rerun request into this pending one.
    fn coalesce(&mut self, newer: Self) {
        self.scope.merge(newer.scope);
        // A newer request without widget values adds nothing the pending
        // one lacks.
        let Some(incoming) = newer.widget_states else {
            return;
        };
        if let Some(pending) = self.widget_states.as_mut() {
            pending.coalesce(incoming);
        } else {
            self.widget_states = Some(incoming);
        }
    }
}

/// Instruction for the script runner worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptRequest {
    /// Stop the current run at its next checkpoint.
    Stop,
    /// Run the script again.
    Rerun(RerunData),
    /// Stop for good.
    Shutdown,
}

impl ScriptRequest {
    const fn same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Stop, Self::Stop) | (Self::Rerun(_), Self::Rerun(_)) | (Self::Shutdown, Self::Shutdown)
        )
    }
}

/// Execution state as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// A run is in progress and nothing is pending for it.
    Running,
    /// A rerun is pending.
    RerunRequested,
    /// No run in progress.
    Stopped,
}

#[derive(Debug)]
struct Mailbox {
    pending: VecDeque<ScriptRequest>,
    state: RunState,
    shutdown: bool,
}

/// Thread-safe, coalescing request mailbox for one script runner.
#[derive(Debug)]
pub struct ScriptRequests {
    inner: Mutex<Mailbox>,
    wake: Condvar,
}

impl Default for ScriptRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRequests {
    /// Create a mailbox in the `Running` state with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Mailbox {
                pending: VecDeque::new(),
                state: RunState::Running,
                shutdown: false,
            }),
            wake: Condvar::new(),
        }
    }

    /// Submit a request.
    ///
    /// Returns `false` if the mailbox has been shut down and the request was
    /// rejected. Requests that carry nothing new (a second stop, a rerun
    /// without widget values behind one that has them) are absorbed and
    /// still count as accepted.
    pub fn enqueue(&self, request: ScriptRequest) -> bool {
        let mut mailbox = self.inner.lock().expect("script requests lock poisoned");
        if mailbox.shutdown {
            log::debug!("Rejecting {request:?}: runner is shut down");
            return false;
        }

        match request {
            ScriptRequest::Shutdown => {
                mailbox.pending.retain(|r| !matches!(r, ScriptRequest::Shutdown));
                mailbox.pending.push_front(ScriptRequest::Shutdown);
                mailbox.shutdown = true;
            }
            ScriptRequest::Stop => {
                if !mailbox.pending.iter().any(|r| matches!(r, ScriptRequest::Stop)) {
                    mailbox.pending.push_back(ScriptRequest::Stop);
                }
            }
            ScriptRequest::Rerun(data) => {
                let pending = mailbox.pending.iter_mut().find_map(|r| match r {
                    ScriptRequest::Rerun(existing) => Some(existing),
                    _ => None,
                });
                match pending {
                    Some(existing) => existing.coalesce(data),
                    None => mailbox.pending.push_back(ScriptRequest::Rerun(data)),
                }
                mailbox.state = RunState::RerunRequested;
            }
        }

        self.wake.notify_all();
        true
    }

    /// Shorthand for enqueueing a rerun.
    pub fn request_rerun(&self, data: RerunData) -> bool {
        self.enqueue(ScriptRequest::Rerun(data))
    }

    /// Shorthand for enqueueing a stop.
    pub fn request_stop(&self) -> bool {
        self.enqueue(ScriptRequest::Stop)
    }

    /// Shorthand for enqueueing a shutdown.
    pub fn request_shutdown(&self) -> bool {
        self.enqueue(ScriptRequest::Shutdown)
    }

    /// Pop the next request, or move to `Stopped` if there is none.
    ///
    /// Worker only.
    pub fn dequeue_or_stop(&self) -> Option<ScriptRequest> {
        let mut mailbox = self.inner.lock().expect("script requests lock poisoned");
        Self::pop(&mut mailbox)
    }

    /// Block while idle until a request arrives, then pop it.
    ///
    /// Worker only.
    pub fn wait_for_request(&self) -> ScriptRequest {
        let mailbox = self.inner.lock().expect("script requests lock poisoned");
        let mut mailbox = self
            .wake
            .wait_while(mailbox, |m| m.pending.is_empty())
            .expect("script requests lock poisoned");
        // Non-empty after the wait.
        Self::pop(&mut mailbox).unwrap_or(ScriptRequest::Stop)
    }

    fn pop(mailbox: &mut Mailbox) -> Option<ScriptRequest> {
        let request = mailbox.pending.pop_front();
        // Stopped is terminal once shutdown is consumed; nothing behind it runs.
        if matches!(request, Some(ScriptRequest::Shutdown)) {
            mailbox.pending.clear();
            mailbox.state = RunState::Stopped;
            return request;
        }
        mailbox.state = match &request {
            Some(ScriptRequest::Rerun(_)) => RunState::Running,
            Some(_) | None => RunState::Stopped,
        };
        // A rerun may still be queued behind a popped stop.
        if mailbox.pending.iter().any(|r| matches!(r, ScriptRequest::Rerun(_))) {
            mailbox.state = RunState::RerunRequested;
        }
        request
    }

    /// Non-consuming check made by a running script at each checkpoint.
    ///
    /// Shutdown wins over everything. Otherwise the earliest pending request
    /// that preempts a run of `scope` is reported. A fragment-only rerun
    /// never preempts a full-app run: it is picked up once that run ends.
    #[must_use]
    pub fn checkpoint(&self, scope: &RunScope) -> Option<Interrupt> {
        let mailbox = self.inner.lock().expect("script requests lock poisoned");
        if mailbox.shutdown {
            return Some(Interrupt::Shutdown);
        }
        mailbox.pending.iter().find_map(|request| match request {
            ScriptRequest::Stop => Some(Interrupt::Stop),
            ScriptRequest::Shutdown => Some(Interrupt::Shutdown),
            ScriptRequest::Rerun(data) if scope.is_app() && !data.scope.is_app() => None,
            ScriptRequest::Rerun(_) => Some(Interrupt::Rerun),
        })
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.inner.lock().expect("script requests lock poisoned").state
    }

    /// True once a shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().expect("script requests lock poisoned").shutdown
    }

    /// Copy of the pending requests, front first (for tests and debugging).
    #[must_use]
    pub fn pending(&self) -> Vec<ScriptRequest> {
        let mailbox = self.inner.lock().expect("script requests lock poisoned");
        mailbox.pending.iter().cloned().collect()
    }

    /// Number of pending requests of the same kind as `request`.
    #[must_use]
    pub fn pending_like(&self, request: &ScriptRequest) -> usize {
        let mailbox = self.inner.lock().expect("script requests lock poisoned");
        mailbox.pending.iter().filter(|r| r.same_kind(request)).count()
    }
}
