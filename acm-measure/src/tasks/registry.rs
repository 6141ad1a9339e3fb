//! Task registry
//!
//! Injectable, cloneable map of live tasks. At most one task per name is
//! active: starting a task cancels any active task with the same name first.

use acm_common::events::EventBus;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use super::handle::{TaskContext, TaskHandle, TaskSnapshot};

/// Concurrency-safe map of tasks by id
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, Arc<TaskHandle>>>>,
    events: EventBus,
    idle_timeout: Duration,
}

impl TaskRegistry {
    pub fn new(events: EventBus, idle_timeout: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            events,
            idle_timeout,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Register and spawn a named task
    ///
    /// Active tasks with the same name are cancelled before the new task is
    /// marked running. An `Err` from `work`, or a panic, becomes the task's
    /// last error; the task is marked finished either way.
    pub async fn start<F, Fut>(&self, name: impl Into<String>, work: F) -> Arc<TaskHandle>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = Arc::new(TaskHandle::new(name, self.idle_timeout, self.events.clone()));

        {
            let mut tasks = self.tasks.write().await;
            for other in tasks.values() {
                if other.name() == handle.name() && other.is_active() {
                    info!(
                        task_id = %other.id(),
                        replaced_by = %handle.id(),
                        name = %handle.name(),
                        "Cancelling task with the same name"
                    );
                    other.cancel();
                }
            }
            tasks.insert(handle.id(), handle.clone());
        }

        handle.mark_running();

        let ctx = TaskContext::new(handle.clone());
        let task = handle.clone();
        tokio::spawn(async move {
            let outcome = tokio::spawn(work(ctx)).await;
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{:#}", e)),
                Err(join_error) => {
                    error!(task_id = %task.id(), "Task work panicked: {}", join_error);
                    Some(format!("Task panicked: {}", join_error))
                }
            };
            task.mark_finished(error);
        });

        handle
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<Arc<TaskHandle>> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// The active task with `name`, else the most recently created one
    pub async fn find_by_name(&self, name: &str) -> Option<Arc<TaskHandle>> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|task| task.name() == name)
            .max_by_key(|task| (task.is_active(), task.created()))
            .cloned()
    }

    /// Snapshots of every registered task, oldest first
    pub async fn list(&self) -> Vec<TaskSnapshot> {
        let tasks = self.tasks.read().await;
        let mut handles: Vec<&Arc<TaskHandle>> = tasks.values().collect();
        handles.sort_by_key(|task| task.created());
        handles.iter().map(|task| task.snapshot()).collect()
    }

    /// Registered tasks, finished ones included until released or reaped
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Cancel every active task named `name`; returns how many were cancelled
    pub async fn cancel_by_name(&self, name: &str) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|task| task.name() == name)
            .filter(|task| task.cancel())
            .count()
    }

    /// Release a task; a finished task is removed immediately
    ///
    /// Returns `None` for an unknown id, otherwise whether it was removed.
    pub async fn release(&self, id: Uuid) -> Option<bool> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get(&id)?.clone();
        task.release();
        if task.is_reapable(Instant::now()) {
            tasks.remove(&id);
            drop(tasks);
            task.mark_released();
            return Some(true);
        }
        Some(false)
    }

    /// Remove every finished task that is released or idle past its deadline
    pub async fn reap(&self, now: Instant) -> Vec<Uuid> {
        let reaped: Vec<Arc<TaskHandle>> = {
            let mut tasks = self.tasks.write().await;
            let ids: Vec<Uuid> = tasks
                .values()
                .filter(|task| task.is_reapable(now))
                .map(|task| task.id())
                .collect();
            ids.iter().filter_map(|id| tasks.remove(id)).collect()
        };

        for task in &reaped {
            info!(task_id = %task.id(), name = %task.name(), "Reaped idle task");
            task.mark_released();
        }
        reaped.iter().map(|task| task.id()).collect()
    }
}
