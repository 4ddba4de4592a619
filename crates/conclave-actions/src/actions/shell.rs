//! Shell action (spec §4.4, §6): the one action with a smart-mode sync/async split.
//!
//! A command is spawned exactly once and never killed-and-restarted. If it finishes
//! before `shell_smart_mode_threshold_ms`, the Router replies synchronously with the
//! captured output. Otherwise the process keeps running in the background and the
//! Router replies with a `check_id`; a later `shell` action with that `check_id`
//! either gets the final result or another pending signal, and `terminate: true` kills
//! the tracked process. Continuations are serviceable without calling back into the
//! Agent Actor — `ShellRegistry` is the only state they need.

use conclave_core::{Error, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct ShellOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub enum ShellDispatch {
    Done(ShellOutcome),
    Pending,
}

struct ShellHandle {
    result_rx: Mutex<oneshot::Receiver<ShellOutcome>>,
    kill_tx: watch::Sender<bool>,
}

/// Shared across every short-lived `ActionRouter` for one agent, so a `check_id`
/// handed out by one dispatch is still resolvable by a later one.
#[derive(Clone, Default)]
pub struct ShellRegistry {
    inner: Arc<DashMap<String, ShellHandle>>,
}

impl ShellRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `command` exactly once. Returns the finished result if it completes
    /// before `threshold`, otherwise registers the still-running process under
    /// `check_id` and returns `Pending`.
    pub async fn run(
        &self,
        check_id: String,
        command: &str,
        working_dir: &Path,
        threshold: Duration,
    ) -> Result<ShellDispatch> {
        let mut child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::Internal(format!("failed to spawn shell: {e}")))?;

        let (result_tx, mut result_rx) = oneshot::channel();
        let (kill_tx, mut kill_rx) = watch::channel(false);

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        tokio::spawn(async move {
            use tokio::io::AsyncReadExt;

            let wait = async {
                tokio::select! {
                    status = child.wait() => status.ok(),
                    _ = kill_rx.changed() => {
                        let _ = child.kill().await;
                        child.wait().await.ok()
                    }
                }
            };
            let status = wait.await;

            let mut out_buf = Vec::new();
            if let Some(ref mut s) = stdout {
                let _ = s.read_to_end(&mut out_buf).await;
            }
            let mut err_buf = Vec::new();
            if let Some(ref mut s) = stderr {
                let _ = s.read_to_end(&mut err_buf).await;
            }

            let outcome = ShellOutcome {
                exit_code: status.and_then(|s| s.code()),
                stdout: String::from_utf8_lossy(&out_buf).to_string(),
                stderr: String::from_utf8_lossy(&err_buf).to_string(),
            };
            let _ = result_tx.send(outcome);
        });

        tokio::select! {
            res = &mut result_rx => {
                let outcome = res.map_err(|_| Error::Internal("shell task dropped".into()))?;
                debug!(check_id = %check_id, "shell completed within smart-mode threshold");
                Ok(ShellDispatch::Done(outcome))
            }
            _ = tokio::time::sleep(threshold) => {
                debug!(check_id = %check_id, "shell still running past smart-mode threshold, deferring");
                self.inner.insert(
                    check_id,
                    ShellHandle {
                        result_rx: Mutex::new(result_rx),
                        kill_tx,
                    },
                );
                Ok(ShellDispatch::Pending)
            }
        }
    }

    /// Polls a previously-deferred command without blocking.
    pub async fn check(&self, check_id: &str) -> Result<ShellDispatch> {
        let handle = self
            .inner
            .get(check_id)
            .ok_or_else(|| Error::Internal(format!("unknown check_id: {check_id}")))?;
        let mut rx = handle.result_rx.lock().await;
        match rx.try_recv() {
            Ok(outcome) => {
                drop(rx);
                self.inner.remove(check_id);
                Ok(ShellDispatch::Done(outcome))
            }
            Err(oneshot::error::TryRecvError::Empty) => Ok(ShellDispatch::Pending),
            Err(oneshot::error::TryRecvError::Closed) => {
                drop(rx);
                self.inner.remove(check_id);
                Err(Error::Internal("shell task dropped before reporting".into()))
            }
        }
    }

    /// Kills the tracked process for `check_id`. A subsequent `check` observes it as
    /// completed (non-zero/absent exit code).
    pub fn terminate(&self, check_id: &str) -> Result<()> {
        let handle = self
            .inner
            .get(check_id)
            .ok_or_else(|| Error::Internal(format!("unknown check_id: {check_id}")))?;
        let _ = handle.kill_tx.send(true);
        Ok(())
    }
}

pub fn resolve_working_dir(workspace_root: &Path, requested: Option<&str>) -> Result<PathBuf> {
    match requested {
        None => Ok(workspace_root.to_path_buf()),
        Some(dir) => {
            let candidate = Path::new(dir);
            let resolved = if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                workspace_root.join(candidate)
            };
            let normalized = normalize_lexically(&resolved);
            if normalized.starts_with(workspace_root) {
                Ok(normalized)
            } else {
                Err(Error::InvalidWorkingDir(dir.to_string()))
            }
        }
    }
}

/// Resolves `.`/`..` components without touching the filesystem (the directory may
/// not exist yet), so escape attempts can't hide behind `starts_with`'s literal
/// component comparison.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
