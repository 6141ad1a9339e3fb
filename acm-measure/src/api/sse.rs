//! Task event stream

use acm_common::sse::task_event_sse_stream;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams TaskStarted, TaskProgress, TaskCancelling, TaskFinished and
/// TaskReleased events for every task.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    task_event_sse_stream(state.event_bus.subscribe())
}
