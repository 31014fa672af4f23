//! Ways a script run can end early.
//!
//! Cancellation is ordinary control flow here: a builder call that observes
//! a pending stop, rerun or shutdown returns [`RunError::Interrupted`], and
//! `?` carries it out of the script. Only [`RunError::Failed`] is an actual
//! error from the user's point of view.

/// Request observed by a running script at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// A stop request is pending.
    Stop,
    /// A rerun request is pending; this run's output is superseded.
    Rerun,
    /// The session is shutting down; no further runs.
    Shutdown,
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop requested"),
            Self::Rerun => write!(f, "rerun requested"),
            Self::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Where an exception came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// The script could not be loaded or parsed.
    Compile,
    /// The script raised an error while running.
    Runtime,
    /// The script panicked.
    Panic,
}

/// An uncaught error from user code, shown to the user as an inline element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    /// Where it came from.
    pub kind: ExceptionKind,
    /// Short type label shown as the element heading.
    pub type_name: String,
    /// Human readable message.
    pub message: String,
    /// Innermost-last context lines, if any.
    pub stack_trace: Vec<String>,
}

impl ScriptException {
    /// Runtime exception with a message and no trace.
    pub fn runtime(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::Runtime,
            type_name: type_name.into(),
            message: message.into(),
            stack_trace: Vec::new(),
        }
    }

    /// Load/parse failure.
    pub fn compile(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ExceptionKind::Compile,
            ..Self::runtime(type_name, message)
        }
    }

    /// Exception built from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("unknown panic");
        Self {
            kind: ExceptionKind::Panic,
            ..Self::runtime("Panic", message)
        }
    }

    /// Attach trace lines.
    #[must_use]
    pub fn with_stack_trace(mut self, stack_trace: Vec<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}

impl std::fmt::Display for ScriptException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for ScriptException {}

/// Early end of a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// A pending request was observed at a checkpoint.
    Interrupted(Interrupt),
    /// The script asked to stop (its own early return, not an error).
    StopRequested,
    /// The script failed.
    Failed(ScriptException),
}

impl RunError {
    /// Shorthand for a runtime failure.
    pub fn failed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed(ScriptException::runtime(type_name, message))
    }

    /// True for the variants that end a run without anything going wrong.
    #[must_use]
    pub const fn is_halt(&self) -> bool {
        matches!(self, Self::Interrupted(_) | Self::StopRequested)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupted(interrupt) => write!(f, "Run interrupted: {interrupt}"),
            Self::StopRequested => write!(f, "Script requested stop"),
            Self::Failed(exception) => write!(f, "Script failed: {exception}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ScriptException> for RunError {
    fn from(exception: ScriptException) -> Self {
        Self::Failed(exception)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        let stack_trace = err.chain().skip(1).map(ToString::to_string).collect();
        Self::Failed(ScriptException::runtime("Error", err.to_string()).with_stack_trace(stack_trace))
    }
}
