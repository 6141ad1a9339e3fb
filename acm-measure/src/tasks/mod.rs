//! Named, cancellable, idle-reaped background tasks

pub mod handle;
pub mod reaper;
pub mod registry;

pub use handle::{TaskContext, TaskHandle, TaskSnapshot, TaskState};
pub use reaper::spawn_reaper;
pub use registry::TaskRegistry;
