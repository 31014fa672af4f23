//! Run-on-save: rerun the script when its source file changes.
//!
//! [`ScriptWatcher`] registers an OS-native watch (inotify on Linux, kqueue
//! on macOS) on the script's directory. The `notify` callback runs on the
//! watcher's own thread; it filters events down to saves of the script file
//! and turns each into a rerun request with no widget snapshot. An editor
//! save usually fires several events in a row; the request mailbox
//! coalesces them into one pending rerun.
//!
//! ```text
//! editor save ──► notify thread ──► is_script_save? ──► ScriptRequests::request_rerun
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::runner::{RerunData, ScriptRequests};

/// Requests a rerun whenever the watched script file is saved.
///
/// Watching stops when this is dropped.
pub struct ScriptWatcher {
    _watcher: RecommendedWatcher,
    script_path: PathBuf,
}

impl std::fmt::Debug for ScriptWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptWatcher")
            .field("script_path", &self.script_path)
            .finish_non_exhaustive()
    }
}

impl ScriptWatcher {
    /// Watch `script_path` and send reruns to `requests`.
    ///
    /// # Errors
    ///
    /// Returns an error if the script path cannot be resolved or the OS
    /// watch cannot be registered (e.g., inotify limits).
    pub fn start(script_path: &Path, requests: Arc<ScriptRequests>) -> Result<Self> {
        let script_path = script_path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", script_path.display()))?;
        let dir = script_path
            .parent()
            .with_context(|| format!("{} has no parent directory", script_path.display()))?
            .to_path_buf();

        let target = script_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_script_save(&event, &target) => {
                log::info!("{} changed, requesting rerun", target.display());
                if !requests.request_rerun(RerunData::new()) {
                    log::debug!("Session closed; ignoring script change");
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("Script watcher error: {e}"),
        })
        .context("Failed to create script watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        log::info!("Watching {} for changes", script_path.display());

        Ok(Self {
            _watcher: watcher,
            script_path,
        })
    }

    /// The script being watched, canonicalized.
    #[must_use]
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

/// True for event kinds that can leave new content at a path.
///
/// Editors that save through a temp file and rename show up as a rename;
/// deletes and access events never trigger a rerun.
fn is_write(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// True if `event` is a save of `script_path`.
///
/// Only file names are compared: the watch covers the script's own
/// directory and nothing below it.
#[must_use]
pub fn is_script_save(event: &Event, script_path: &Path) -> bool {
    let Some(name) = script_path.file_name() else {
        return false;
    };
    is_write(&event.kind) && event.paths.iter().any(|p| p.file_name() == Some(name))
}
