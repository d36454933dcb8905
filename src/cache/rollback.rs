//! Rollback of a failed acquisition attempt
//!
//! Every resource an attempt acquires (the temp file, the heartbeat task)
//! is registered here. On failure the whole list runs once, in order,
//! before the error is reported. On success the list is disarmed. If the
//! attempt is torn down without either (panic, aborted task) `Drop`
//! releases whatever is still registered.

use std::mem;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A single registered rollback action
#[derive(Debug)]
pub enum Action {
    /// Delete a file that must not outlive a failed attempt
    RemoveFile(PathBuf),
    /// Stop a background task
    Abort(JoinHandle<()>),
}

/// Ordered list of rollback actions for one attempt
#[derive(Debug, Default)]
pub struct Rollback {
    actions: Vec<Action>,
}

impl Rollback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file for deletion on failure
    pub fn remove_file(&mut self, path: impl Into<PathBuf>) {
        self.actions.push(Action::RemoveFile(path.into()));
    }

    /// Register a task to abort on failure
    pub fn abort(&mut self, task: JoinHandle<()>) {
        self.actions.push(Action::Abort(task));
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Forget every registered action; the attempt succeeded
    pub fn disarm(mut self) {
        self.actions.clear();
    }

    /// Run every registered action in order.
    ///
    /// Failures of individual actions are logged and swallowed so the
    /// remaining actions still run.
    pub async fn run(mut self) {
        for action in mem::take(&mut self.actions) {
            match action {
                Action::Abort(task) => task.abort(),
                Action::RemoveFile(path) => match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!("Removed {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                },
            }
        }
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        if self.actions.is_empty() {
            return;
        }

        let mut paths = Vec::new();
        for action in mem::take(&mut self.actions) {
            match action {
                Action::Abort(task) => task.abort(),
                Action::RemoveFile(path) => paths.push(path),
            }
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for path in paths {
                        let _ = tokio::fs::remove_file(&path).await;
                    }
                });
            }
            Err(_) => {
                for path in paths {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }
    }
}
