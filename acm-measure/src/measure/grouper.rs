//! Batch grouping
//!
//! Consecutive rows sharing (transcript, speaker) form one batch. A batch ends
//! exactly when the next row's key differs, and the final batch is flushed at
//! end of stream. Cancellation is checked before each row is consumed; once
//! seen, the rows gathered so far are flushed and the grouper is exhausted.
//! A stream error is reported after the rows gathered before it.

use tokio_util::sync::CancellationToken;

use super::rows::Row;
use super::MeasureError;

/// Maximal run of rows sharing (transcript, speaker), in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub transcript: String,
    pub speaker: String,
    pub rows: Vec<Row>,
}

impl Batch {
    fn start(row: Row) -> Self {
        Self {
            transcript: row.transcript.clone(),
            speaker: row.speaker.clone(),
            rows: vec![row],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Groups an ordered row stream into batches
pub struct BatchGrouper<I> {
    rows: I,
    /// First row of the next batch, already consumed
    pending: Option<Row>,
    cancel: CancellationToken,
    consumed: u64,
    /// Stream error held back until the batch before it is returned
    failed: Option<MeasureError>,
    finished: bool,
}

impl<I> BatchGrouper<I>
where
    I: Iterator<Item = Result<Row, MeasureError>>,
{
    pub fn new(rows: I, cancel: CancellationToken) -> Self {
        Self {
            rows,
            pending: None,
            cancel,
            consumed: 0,
            failed: None,
            finished: false,
        }
    }

    /// Rows taken from the underlying stream so far
    pub fn rows_consumed(&self) -> u64 {
        self.consumed
    }
}

impl<I> Iterator for BatchGrouper<I>
where
    I: Iterator<Item = Result<Row, MeasureError>>,
{
    type Item = Result<Batch, MeasureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.failed.take() {
            return Some(Err(e));
        }
        if self.finished {
            return None;
        }

        let mut batch = self.pending.take().map(Batch::start);

        loop {
            if self.cancel.is_cancelled() {
                self.finished = true;
                return batch.map(Ok);
            }

            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(e)) => {
                    self.finished = true;
                    return match batch {
                        Some(batch) => {
                            self.failed = Some(e);
                            Some(Ok(batch))
                        }
                        None => Some(Err(e)),
                    };
                }
                None => {
                    self.finished = true;
                    return batch.map(Ok);
                }
            };
            self.consumed += 1;

            match batch.as_mut() {
                None => batch = Some(Batch::start(row)),
                Some(current) if current.rows[0].same_key(&row) => current.rows.push(row),
                Some(_) => {
                    self.pending = Some(row);
                    return batch.map(Ok);
                }
            }
        }
    }
}
