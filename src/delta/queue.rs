//! Ordered, coalescing buffer of outgoing messages.
//!
//! A script reruns its whole body on every interaction, so most builder
//! calls re-send an element the client already has, or one still waiting
//! in this queue. Composition at enqueue time keeps the queue proportional
//! to the number of distinct UI locations touched, not to the number of
//! builder calls:
//!
//! - a `NewElement` / `AddBlock` at an already queued path replaces the
//!   queued delta in place (stable position, latest content);
//! - a queued `AddBlock` is never replaced: later deltas may be children of
//!   that container, so the new delta is appended and becomes the path's
//!   composition target;
//! - `AddRows` deltas and lifecycle messages are appended verbatim and never
//!   touch the path index.
//!
//! The script runner writes, the delivery loop flushes. One mutex guards the
//! sequence and the index together.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::{Delta, DeltaPath, ForwardMsg};

#[derive(Debug, Default)]
struct QueueInner {
    messages: Vec<ForwardMsg>,
    /// Path → position of the message new deltas at that path compose onto.
    index: HashMap<DeltaPath, usize>,
}

/// Outgoing message queue shared by a script runner and a delivery loop.
#[derive(Debug, Default)]
pub struct ForwardMsgQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
}

impl ForwardMsgQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message, composing it onto an earlier delta at the same path
    /// when allowed.
    pub fn enqueue(&self, msg: ForwardMsg) {
        let mut inner = self.inner.lock().expect("forward queue lock poisoned");

        let key = match msg.as_delta() {
            Some(delta) if !delta.is_add_rows() => delta.path().clone(),
            _ => {
                inner.messages.push(msg);
                self.ready.notify_all();
                return;
            }
        };

        if let Some(&position) = inner.index.get(&key) {
            let composable = inner.messages[position]
                .as_delta()
                .is_some_and(|old| !old.is_block());
            if composable {
                inner.messages[position] = msg;
                return;
            }
        }

        let position = inner.messages.len();
        inner.messages.push(msg);
        inner.index.insert(key, position);
        self.ready.notify_all();
    }

    /// Shorthand for enqueueing a bare delta.
    pub fn enqueue_delta(&self, delta: Delta) {
        self.enqueue(ForwardMsg::Delta(delta));
    }

    /// Take every queued message, oldest first, leaving the queue empty.
    ///
    /// Safe to call at any time; an empty flush returns an empty `Vec`.
    pub fn flush(&self) -> Vec<ForwardMsg> {
        let mut inner = self.inner.lock().expect("forward queue lock poisoned");
        inner.index.clear();
        std::mem::take(&mut inner.messages)
    }

    /// Block until at least one message is queued or `timeout` elapses.
    ///
    /// Returns `true` if messages are waiting.
    pub fn wait_for_messages(&self, timeout: Duration) -> bool {
        let inner = self.inner.lock().expect("forward queue lock poisoned");
        let (inner, _) = self
            .ready
            .wait_timeout_while(inner, timeout, |q| q.messages.is_empty())
            .expect("forward queue lock poisoned");
        !inner.messages.is_empty()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("forward queue lock poisoned").messages.len()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
