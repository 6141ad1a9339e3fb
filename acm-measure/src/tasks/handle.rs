//! Task state, separate from the work that drives it
//!
//! `TaskHandle` is shared between the registry, the spawned work (through
//! `TaskContext`), the reaper, and API handlers. All mutable fields sit behind
//! one short-lived `std::sync::Mutex`; waiters use `Notify` and re-check state
//! after every wake.

use acm_common::events::{EventBus, TaskEvent};
use acm_common::human_time::format_elapsed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Task lifecycle state
///
/// Cancellation is a flag on top of `Running`, not a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Initializing,
    Running,
    Finished,
    Released,
}

impl TaskState {
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Initializing | TaskState::Running)
    }
}

#[derive(Debug)]
struct TaskInner {
    state: TaskState,
    cancelling: bool,
    percent_complete: Option<u8>,
    status: String,
    last_error: Option<String>,
    result_path: Option<PathBuf>,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    finished: Option<Instant>,
    /// Idle deadline; only consulted once finished
    deadline: Instant,
    release_requested: bool,
}

/// Shared state of one named unit of work
#[derive(Debug)]
pub struct TaskHandle {
    id: Uuid,
    name: String,
    idle_timeout: Duration,
    created: Instant,
    cancel: CancellationToken,
    inner: Mutex<TaskInner>,
    changed: Notify,
    events: EventBus,
}

/// Point-in-time view of a task for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: Uuid,
    pub name: String,
    pub state: TaskState,
    pub cancelling: bool,
    pub percent_complete: Option<u8>,
    pub status: String,
    pub last_error: Option<String>,
    pub has_result: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Human-readable duration, e.g. `4.2s` or `1:05:09`
    pub duration: String,
    pub idle_timeout_secs: u64,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>, idle_timeout: Duration, events: EventBus) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            idle_timeout,
            created: now,
            cancel: CancellationToken::new(),
            inner: Mutex::new(TaskInner {
                state: TaskState::Initializing,
                cancelling: false,
                percent_complete: None,
                status: String::new(),
                last_error: None,
                result_path: None,
                started_at: None,
                started: None,
                finished: None,
                deadline: now + idle_timeout,
                release_requested: false,
            }),
            changed: Notify::new(),
            events,
        }
    }

    fn inner(&self) -> MutexGuard<'_, TaskInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub(crate) fn created(&self) -> Instant {
        self.created
    }

    pub fn state(&self) -> TaskState {
        self.inner().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn is_cancelling(&self) -> bool {
        self.inner().cancelling
    }

    pub fn percent_complete(&self) -> Option<u8> {
        self.inner().percent_complete
    }

    pub fn status(&self) -> String {
        self.inner().status.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner().last_error.clone()
    }

    pub fn result_path(&self) -> Option<PathBuf> {
        self.inner().result_path.clone()
    }

    /// Time since start; frozen once finished
    pub fn duration(&self) -> Duration {
        let inner = self.inner();
        match (inner.started, inner.finished) {
            (Some(started), Some(finished)) => finished.duration_since(started),
            (Some(started), None) => started.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Request cooperative cancellation
    ///
    /// Only the first call on an active task has any effect. Returns whether
    /// this call did anything.
    pub fn cancel(&self) -> bool {
        {
            let mut inner = self.inner();
            if inner.cancelling || !inner.state.is_active() {
                return false;
            }
            inner.cancelling = true;
            inner.status = "Cancelling".to_string();
        }
        self.cancel.cancel();
        info!(task_id = %self.id, name = %self.name, "Task cancellation requested");
        self.events.emit_lossy(TaskEvent::TaskCancelling {
            task_id: self.id,
            timestamp: Utc::now(),
        });
        self.changed.notify_waiters();
        true
    }

    /// Push the idle deadline to now + idle timeout
    pub fn keep_alive(&self) {
        self.inner().deadline = Instant::now() + self.idle_timeout;
        self.changed.notify_waiters();
    }

    /// End the idle wait immediately once the work is finished
    pub fn release(&self) {
        self.inner().release_requested = true;
        self.changed.notify_waiters();
    }

    /// Whether the reaper may remove this task at `now`
    pub fn is_reapable(&self, now: Instant) -> bool {
        let inner = self.inner();
        inner.state == TaskState::Finished && (inner.release_requested || now >= inner.deadline)
    }

    /// Wait until the work is finished
    pub async fn wait_until_finished(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.state().is_active() {
                return;
            }
            notified.await;
        }
    }

    /// Wait until the finished task has gone a full idle window without
    /// `keep_alive()`, or until it is released
    pub async fn wait_to_die(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = {
                let inner = self.inner();
                if inner.release_requested || inner.state == TaskState::Released {
                    return;
                }
                (inner.state == TaskState::Finished).then_some(inner.deadline)
            };

            match deadline {
                Some(deadline) if Instant::now() >= deadline => return,
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn mark_running(&self) {
        let started_at = Utc::now();
        {
            let mut inner = self.inner();
            inner.state = TaskState::Running;
            inner.started = Some(Instant::now());
            inner.started_at = Some(started_at);
            inner.status = "Running".to_string();
        }
        info!(task_id = %self.id, name = %self.name, "Task started");
        self.events.emit_lossy(TaskEvent::TaskStarted {
            task_id: self.id,
            name: self.name.clone(),
            timestamp: started_at,
        });
        self.changed.notify_waiters();
    }

    pub(crate) fn mark_finished(&self, error: Option<String>) {
        let now = Instant::now();
        let (cancelled, duration) = {
            let mut inner = self.inner();
            inner.state = TaskState::Finished;
            inner.finished = Some(now);
            inner.deadline = now + self.idle_timeout;
            match &error {
                Some(message) => inner.status = format!("Failed: {}", message),
                None if inner.cancelling => inner.status = "Cancelled".to_string(),
                None => inner.percent_complete = Some(100),
            }
            inner.last_error = error.clone();
            let duration = inner
                .started
                .map(|started| now.duration_since(started))
                .unwrap_or_default();
            (inner.cancelling, duration)
        };

        info!(
            task_id = %self.id,
            name = %self.name,
            cancelled,
            error = ?error,
            duration = %format_elapsed(duration),
            "Task finished"
        );
        self.events.emit_lossy(TaskEvent::TaskFinished {
            task_id: self.id,
            error,
            cancelled,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
        self.changed.notify_waiters();
    }

    pub(crate) fn mark_released(&self) {
        self.inner().state = TaskState::Released;
        debug!(task_id = %self.id, "Task released");
        self.events.emit_lossy(TaskEvent::TaskReleased {
            task_id: self.id,
            timestamp: Utc::now(),
        });
        self.changed.notify_waiters();
    }

    fn set_status(&self, status: String) {
        let percent_complete = {
            let mut inner = self.inner();
            inner.status = status.clone();
            inner.percent_complete
        };
        self.events.emit_lossy(TaskEvent::TaskProgress {
            task_id: self.id,
            percent_complete,
            status,
            timestamp: Utc::now(),
        });
    }

    fn set_percent(&self, percent: u8) {
        let status = {
            let mut inner = self.inner();
            if inner.percent_complete == Some(percent) {
                return;
            }
            inner.percent_complete = Some(percent);
            inner.status.clone()
        };
        self.events.emit_lossy(TaskEvent::TaskProgress {
            task_id: self.id,
            percent_complete: Some(percent),
            status,
            timestamp: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let duration = self.duration();
        let inner = self.inner();
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: inner.state,
            cancelling: inner.cancelling,
            percent_complete: inner.percent_complete,
            status: inner.status.clone(),
            last_error: inner.last_error.clone(),
            has_result: inner.result_path.is_some(),
            started_at: inner.started_at,
            duration_ms: duration.as_millis() as u64,
            duration: format_elapsed(duration),
            idle_timeout_secs: self.idle_timeout.as_secs(),
        }
    }
}

/// The work's view of its own task
#[derive(Debug, Clone)]
pub struct TaskContext {
    handle: Arc<TaskHandle>,
}

impl TaskContext {
    pub fn new(handle: Arc<TaskHandle>) -> Self {
        Self { handle }
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.handle.cancellation_token()
    }

    pub fn set_status(&self, status: impl Into<String>) {
        self.handle.set_status(status.into());
    }

    /// Percent complete from items done out of a pre-counted total
    pub fn set_progress(&self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        self.handle.set_percent(percent);
    }

    pub fn set_result_path(&self, path: PathBuf) {
        self.handle.inner().result_path = Some(path);
    }
}
