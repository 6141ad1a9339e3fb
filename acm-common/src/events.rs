//! Task lifecycle events and the broadcast `EventBus`
//!
//! Events are broadcast via `EventBus` and serialized for SSE transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Task lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// Task registered and running
    ///
    /// Triggers:
    /// - SSE: Add task to monitoring views
    TaskStarted {
        task_id: Uuid,
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress or status text changed
    TaskProgress {
        task_id: Uuid,
        /// Percent complete, `None` while unknown
        percent_complete: Option<u8>,
        status: String,
        timestamp: DateTime<Utc>,
    },

    /// First cancellation request received
    TaskCancelling {
        task_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Work completed (successfully, by cancellation, or with an error)
    ///
    /// The task remains queryable until it is released or reaped.
    TaskFinished {
        task_id: Uuid,
        /// Error message when the work failed
        error: Option<String>,
        cancelled: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Task removed from the registry
    TaskReleased {
        task_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::TaskStarted { .. } => "TaskStarted",
            TaskEvent::TaskProgress { .. } => "TaskProgress",
            TaskEvent::TaskCancelling { .. } => "TaskCancelling",
            TaskEvent::TaskFinished { .. } => "TaskFinished",
            TaskEvent::TaskReleased { .. } => "TaskReleased",
        }
    }

    /// Task this event concerns
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::TaskStarted { task_id, .. }
            | TaskEvent::TaskProgress { task_id, .. }
            | TaskEvent::TaskCancelling { task_id, .. }
            | TaskEvent::TaskFinished { task_id, .. }
            | TaskEvent::TaskReleased { task_id, .. } => *task_id,
        }
    }
}

/// Broadcast bus for task events
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers drop old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let task_id = Uuid::new_v4();

        bus.emit_lossy(TaskEvent::TaskStarted {
            task_id,
            name: "formants".to_string(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "TaskStarted");
        assert_eq!(event.task_id(), task_id);
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(TaskEvent::TaskReleased {
            task_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_serialized_event_is_tagged() {
        let event = TaskEvent::TaskProgress {
            task_id: Uuid::nil(),
            percent_complete: Some(40),
            status: "Batch 2".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TaskProgress");
        assert_eq!(json["percent_complete"], 40);
    }
}
