//! Script runner: one worker thread per session that executes the user
//! script on demand.
//!
//! # Architecture
//!
//! ```text
//! producers (client, file watcher, host)
//!        │ enqueue (coalescing)
//!        ▼
//!  ScriptRequests ──wait/dequeue──► worker thread "script-runner-<session>"
//!        ▲                               │
//!        └──── checkpoint (peek) ────────┤ ScriptContext (UiBuilder)
//!                                        ▼
//!                                 ForwardMsgQueue ──flush──► delivery
//! ```
//!
//! The worker owns [`SessionState`]. Each run starts with a
//! `ScriptStarted`, ends with a `ScriptFinished` (unless abandoned for
//! shutdown), and never lets a script failure or panic escape the loop:
//! failures become an inline exception element and the worker waits for
//! the next request.
//!
//! - [`requests`] - the coalescing request mailbox
//! - [`context`] - the builder capability handed to scripts
//! - [`error`] - how a run ends early

// Rust guideline compliant 2026-02

pub mod context;
pub mod error;
pub mod requests;

pub use context::{ScriptContext, UiBuilder, WidgetSpec};
pub use error::{ExceptionKind, Interrupt, RunError, ScriptException};
pub use requests::{RerunData, RunScope, RunState, ScriptRequest, ScriptRequests};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::config::Config;
use crate::constants;
use crate::delta::{Element, FinishedStatus, ForwardMsg, ForwardMsgQueue};
use crate::state::{SessionState, WidgetStates};

/// A user script the runner can execute repeatedly.
///
/// Each call to [`run`](Self::run) is one full execution from the top.
/// Propagate builder errors with `?` so interrupts unwind promptly.
pub trait Script: Send {
    /// Execute once against `ui`.
    fn run(&mut self, ui: &mut dyn UiBuilder) -> Result<(), RunError>;
}

impl<F> Script for F
where
    F: FnMut(&mut dyn UiBuilder) -> Result<(), RunError> + Send,
{
    fn run(&mut self, ui: &mut dyn UiBuilder) -> Result<(), RunError> {
        self(ui)
    }
}

/// What the worker publishes for readers on other threads.
///
/// Cloning shares the same state. Reads never touch the [`ScriptRunner`],
/// so they stay available while a shutdown is waiting on the worker.
#[derive(Debug, Clone, Default)]
pub struct RunnerView {
    snapshot: Arc<Mutex<WidgetStates>>,
    exited: Arc<AtomicBool>,
}

impl RunnerView {
    /// Widget values as of the last finished run.
    #[must_use]
    pub fn widget_snapshot(&self) -> WidgetStates {
        self.snapshot.lock().expect("widget snapshot lock poisoned").clone()
    }

    /// True once the worker has left its loop.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Handle to a session's script runner worker.
pub struct ScriptRunner {
    session_id: String,
    requests: Arc<ScriptRequests>,
    view: RunnerView,
    done_rx: mpsc::Receiver<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("session_id", &self.session_id)
            .field("state", &self.requests.state())
            .finish_non_exhaustive()
    }
}

impl ScriptRunner {
    /// Start the worker thread. It idles until the first request.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<S>(
        session_id: &str,
        script: S,
        queue: Arc<ForwardMsgQueue>,
        config: Arc<Config>,
    ) -> Result<Self>
    where
        S: Script + 'static,
    {
        let requests = Arc::new(ScriptRequests::new());
        let view = RunnerView::default();
        let (done_tx, done_rx) = mpsc::channel();

        let worker = Worker {
            script,
            requests: Arc::clone(&requests),
            queue,
            config,
            state: SessionState::new(),
            snapshot: Arc::clone(&view.snapshot),
        };
        let exited = Arc::clone(&view.exited);

        let thread_handle = thread::Builder::new()
            .name(format!("script-runner-{session_id}"))
            .spawn(move || {
                worker.run_loop();
                exited.store(true, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .context("Failed to spawn script runner thread")?;

        log::info!("Script runner spawned for session {session_id}");

        Ok(Self {
            session_id: session_id.to_string(),
            requests,
            view,
            done_rx,
            thread_handle: Some(thread_handle),
        })
    }

    /// The request mailbox, for producers on other threads.
    #[must_use]
    pub fn requests(&self) -> &Arc<ScriptRequests> {
        &self.requests
    }

    /// Ask for a rerun. Returns `false` after shutdown.
    pub fn request_rerun(&self, data: RerunData) -> bool {
        self.requests.request_rerun(data)
    }

    /// Ask the current run to stop. Returns `false` after shutdown.
    pub fn request_stop(&self) -> bool {
        self.requests.request_stop()
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.requests.state()
    }

    /// Shared view of the snapshot and exit flag.
    #[must_use]
    pub fn view(&self) -> &RunnerView {
        &self.view
    }

    /// Widget values as of the last finished run.
    #[must_use]
    pub fn widget_snapshot(&self) -> WidgetStates {
        self.view.widget_snapshot()
    }

    /// True once the worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.view.is_finished()
    }

    /// Request shutdown and wait up to `timeout` for the worker to exit.
    ///
    /// A run in progress is abandoned at its next checkpoint. Calling this
    /// again after a successful shutdown is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is still running when `timeout`
    /// expires (a script that never reaches a checkpoint).
    pub fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.requests.request_shutdown();

        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    log::error!("Script runner thread for session {} panicked", self.session_id);
                }
                self.view.exited.store(true, Ordering::SeqCst);
                log::info!("Script runner for session {} stopped", self.session_id);
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::error!(
                    "Script runner for session {} did not stop within {timeout:?}",
                    self.session_id
                );
                self.thread_handle = Some(handle);
                anyhow::bail!("Script runner did not stop within {timeout:?}")
            }
        }
    }
}

impl Drop for ScriptRunner {
    fn drop(&mut self) {
        // Never join here: a script stuck outside a checkpoint would hang
        // the dropping thread.
        if self.thread_handle.is_some() {
            self.requests.request_shutdown();
        }
    }
}

/// State moved onto the worker thread.
struct Worker<S> {
    script: S,
    requests: Arc<ScriptRequests>,
    queue: Arc<ForwardMsgQueue>,
    config: Arc<Config>,
    state: SessionState,
    snapshot: Arc<Mutex<WidgetStates>>,
}

impl<S: Script> Worker<S> {
    fn run_loop(mut self) {
        log::debug!("Script runner worker waiting for first request");

        loop {
            match self.next_request() {
                ScriptRequest::Shutdown => break,
                ScriptRequest::Stop => {
                    log::debug!("Stop request with no run in progress");
                }
                ScriptRequest::Rerun(data) => self.run_once(data),
            }
        }

        self.queue.enqueue(ForwardMsg::SessionShutdown);
        log::info!("Script runner worker exiting");
    }

    fn next_request(&self) -> ScriptRequest {
        self.requests
            .dequeue_or_stop()
            .unwrap_or_else(|| self.requests.wait_for_request())
    }

    fn run_once(&mut self, data: RerunData) {
        let run_id = Uuid::new_v4();
        let RerunData { widget_states, scope } = data;

        let changed = self.state.begin_run(widget_states.as_ref());
        log::debug!("Run {run_id} starting ({scope:?}), {} changed widget(s)", changed.len());
        self.queue.enqueue(ForwardMsg::ScriptStarted {
            run_id,
            scope: scope.clone(),
        });

        let mut ctx = ScriptContext::new(
            &self.queue,
            &self.requests,
            &mut self.state,
            run_id,
            scope.clone(),
            changed,
        );
        let script = &mut self.script;

        let mut outcome = match catch_unwind(AssertUnwindSafe(|| script.run(&mut ctx))) {
            Ok(result) => result,
            Err(payload) => Err(RunError::Failed(ScriptException::from_panic(payload.as_ref()))),
        };
        // A halt outranks whatever the script did with it.
        if let Some(halt) = ctx.halted() {
            outcome = Err(halt.clone());
        }

        let status = match outcome {
            Ok(()) => Some(FinishedStatus::Success),
            Err(RunError::StopRequested | RunError::Interrupted(Interrupt::Stop)) => {
                Some(FinishedStatus::Stopped)
            }
            Err(RunError::Interrupted(Interrupt::Rerun)) => Some(FinishedStatus::RerunRequested),
            Err(RunError::Interrupted(Interrupt::Shutdown)) => None,
            Err(RunError::Failed(exception)) => {
                log::error!("Run {run_id} failed: {exception}");
                for line in &exception.stack_trace {
                    log::error!("    {line}");
                }
                ctx.emit_exception(exception_element(&self.config, &exception));
                Some(match exception.kind {
                    ExceptionKind::Compile => FinishedStatus::CompileError,
                    ExceptionKind::Runtime | ExceptionKind::Panic => FinishedStatus::Error,
                })
            }
        };

        let emitted = ctx.emitted();
        let registered = ctx.into_widget_ids();
        if status == Some(FinishedStatus::Success) && scope.is_app() {
            self.state.end_run(&registered);
        }
        *self.snapshot.lock().expect("widget snapshot lock poisoned") = self.state.widget_snapshot();

        match status {
            Some(status) => {
                log::debug!("Run {run_id} finished: {status:?}, {emitted} delta(s)");
                self.queue.enqueue(ForwardMsg::ScriptFinished { run_id, status });
            }
            None => log::info!("Run {run_id} abandoned for shutdown"),
        }
    }
}

fn exception_element(config: &Config, exception: &ScriptException) -> Element {
    if config.show_error_details {
        Element::exception(&exception.type_name, &exception.message, &exception.stack_trace)
    } else {
        Element::exception(&exception.type_name, constants::HIDDEN_ERROR_MESSAGE, &[])
    }
}
