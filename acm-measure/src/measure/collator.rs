//! Maps Praat output back onto batch rows

use tracing::warn;

use super::grouper::Batch;
use super::schema::OutputSchema;
use super::target::Target;
use super::MeasureError;

/// Turns one batch plus its script output into result rows
#[derive(Debug, Clone)]
pub struct Collator<'a> {
    schema: &'a OutputSchema,
    pass_through: bool,
    input_width: usize,
}

impl<'a> Collator<'a> {
    /// `input_width` is the header width; pass-through fields are padded or
    /// truncated to it so every result row has the same width. Truncation is
    /// noted in the row's Error cell unless the row already carries an error.
    pub fn new(schema: &'a OutputSchema, pass_through: bool, input_width: usize) -> Self {
        Self {
            schema,
            pass_through,
            input_width,
        }
    }

    /// Cells per result row
    pub fn row_width(&self) -> usize {
        let prefix = if self.pass_through { self.input_width } else { 0 };
        prefix + self.schema.width() + 1
    }

    /// Result rows for `batch`, in row order
    ///
    /// `output` is ignored when `batch_error` is set. Otherwise each valid
    /// target takes exactly `lines_per_target()` lines and the output must be
    /// used up exactly.
    pub fn collate(
        &self,
        batch: &Batch,
        targets: &[Target],
        output: &str,
        batch_error: Option<&str>,
    ) -> Result<Vec<Vec<String>>, MeasureError> {
        let per_target = self.schema.lines_per_target();
        let mut lines = output.lines();
        let mut results = Vec::with_capacity(batch.rows.len());

        for (row, target) in batch.rows.iter().zip(targets) {
            let mut cells = Vec::with_capacity(self.row_width());
            let dropped = if self.pass_through {
                row.fields.len().saturating_sub(self.input_width)
            } else {
                0
            };
            if dropped > 0 {
                warn!(row = row.number, dropped, "Row has more fields than the header; extra fields dropped");
            }
            if self.pass_through {
                cells.extend(
                    row.fields
                        .iter()
                        .cloned()
                        .chain(std::iter::repeat(String::new()))
                        .take(self.input_width),
                );
            }

            let error = match (batch_error, &target.error) {
                (Some(message), _) => {
                    cells.extend(std::iter::repeat(String::new()).take(per_target));
                    message.to_string()
                }
                (None, Some(message)) => {
                    cells.extend(std::iter::repeat(String::new()).take(per_target));
                    message.clone()
                }
                (None, None) => {
                    for _ in 0..per_target {
                        let line = lines.next().ok_or_else(|| {
                            MeasureError::Protocol(format!(
                                "output ended early at row {}",
                                row.number
                            ))
                        })?;
                        cells.push(line.trim().to_string());
                    }
                    String::new()
                }
            };
            let error = if error.is_empty() && dropped > 0 {
                format!("Row {}: {} field(s) beyond the header dropped", row.number, dropped)
            } else {
                error
            };
            cells.push(error);
            results.push(cells);
        }

        if batch_error.is_none() {
            let extra = lines.count();
            if extra > 0 {
                return Err(MeasureError::Protocol(format!(
                    "{} unexpected output line(s) for transcript {} speaker {}",
                    extra, batch.transcript, batch.speaker
                )));
            }
        }

        Ok(results)
    }
}
