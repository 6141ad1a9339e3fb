//! HTTP API handlers for acm-measure

pub mod health;
pub mod measure;
pub mod sse;
pub mod tasks;

pub use health::health_routes;
pub use measure::measure_routes;
pub use sse::event_stream;
pub use tasks::task_routes;
