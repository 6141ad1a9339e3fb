//! Measurement task body
//!
//! Count rows, write the header, then group → resolve → build → run →
//! collate → write, one batch at a time. Output is flushed after every batch,
//! so a fatal error leaves every earlier batch in the file followed by one
//! `Kind: message` line.

use acm_common::config::MeasurementDefaults;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::collator::Collator;
use super::grouper::BatchGrouper;
use super::media::MediaLocator;
use super::options::MeasurementOptions;
use super::profile::{custom_attribute_names, AttributeStore, ProfileResolver};
use super::rows::{count_rows, RowSource};
use super::runner::ScriptRunner;
use super::schema::OutputSchema;
use super::script::ScriptBuilder;
use super::target::Target;
use super::MeasureError;
use crate::tasks::TaskContext;

/// Outcome of a measurement run that did not fail
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementSummary {
    pub total_rows: u64,
    pub rows_written: u64,
    pub batches: u64,
    pub praat_runs: u64,
    pub cancelled: bool,
}

/// Message written for every row of a batch without audio
pub fn missing_media_message(transcript: &str) -> String {
    format!("No accessible audio for transcript {}", transcript)
}

/// Deletes the input file when dropped
struct InputFile<'a>(&'a Path);

impl Drop for InputFile<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.0) {
            Ok(()) => debug!(path = %self.0.display(), "Removed input file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), "Failed to remove input file: {}", e),
        }
    }
}

/// One measurement request with its collaborators
pub struct MeasurementJob {
    /// Input CSV; deleted when the job ends
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: MeasurementOptions,
    pub defaults: MeasurementDefaults,
    pub attributes: Arc<dyn AttributeStore>,
    pub media: Arc<dyn MediaLocator>,
    pub runner: Arc<dyn ScriptRunner>,
}

impl MeasurementJob {
    pub async fn run(self, ctx: &TaskContext) -> Result<MeasurementSummary, MeasureError> {
        let _input = InputFile(&self.input);
        self.options.validate()?;

        let delimiter = self.options.delimiter.unwrap_or(self.defaults.delimiter);
        let delimiter = u8::try_from(delimiter).map_err(|_| {
            MeasureError::InvalidOptions(format!("delimiter {:?} is not a single-byte character", delimiter))
        })?;
        let window_offset = self.options.window_offset.unwrap_or(self.defaults.window_offset);
        let pass_through = self.options.pass_through;
        let schema = OutputSchema::from_options(&self.options);
        let custom_script = self.options.custom.as_ref().map(|c| c.script.as_str());
        let extra_attributes = match custom_script {
            Some(script) => custom_attribute_names(script)?,
            None => Vec::new(),
        };
        let resolver = ProfileResolver::new(&self.defaults, extra_attributes);
        let builder = ScriptBuilder::new(&schema, window_offset, custom_script);

        ctx.set_status("Counting rows");
        let total_rows = count_rows(&self.input, delimiter)?;
        info!(task_id = %ctx.id(), total_rows, columns = schema.width(), "Measuring");

        let source = RowSource::open(&self.input, delimiter, self.options.columns.clone())?;
        let input_headers = source.headers().to_vec();
        let collator = Collator::new(&schema, pass_through, input_headers.len());

        let mut writer = WriterBuilder::new().from_path(&self.output)?;
        writer.write_record(schema.header_row(&input_headers, pass_through))?;
        writer.flush()?;
        ctx.set_result_path(self.output.clone());

        let scratch = tempfile::Builder::new().prefix("acm-measure-").tempdir()?;
        let mut summary = MeasurementSummary {
            total_rows,
            ..Default::default()
        };

        let outcome = async {
            let mut grouper = BatchGrouper::new(source, ctx.cancellation_token());
            while let Some(batch) = grouper.next() {
                let batch = batch?;
                summary.batches += 1;
                let batch_number = summary.batches;
                ctx.set_status(format!(
                    "Batch {}: transcript {} speaker {}",
                    batch_number, batch.transcript, batch.speaker
                ));

                let targets: Vec<Target> = batch
                    .rows
                    .iter()
                    .map(|row| Target::from_row(row, &self.options.columns))
                    .collect();

                let rows = match self.media.locate(&batch.transcript).await? {
                    None => {
                        debug!(task_id = %ctx.id(), transcript = %batch.transcript, "No audio");
                        let message = missing_media_message(&batch.transcript);
                        collator.collate(&batch, &targets, "", Some(&message))?
                    }
                    Some(audio) => {
                        let speaker = resolver.resolve(self.attributes.as_ref(), &batch.speaker).await?;
                        let program = builder.build(&audio, &targets, &speaker);
                        let output = if program.output_lines() == 0 {
                            String::new()
                        } else {
                            if ctx.is_cancelled() {
                                info!(task_id = %ctx.id(), batch = batch_number, "Cancelled before running Praat");
                                break;
                            }
                            let script = scratch.path().join(format!("batch-{}.praat", batch_number));
                            tokio::fs::write(&script, program.render()).await?;
                            summary.praat_runs += 1;
                            let output = self.runner.run(&script).await?;
                            if let Err(e) = tokio::fs::remove_file(&script).await {
                                warn!(script = %script.display(), "Failed to remove script: {}", e);
                            }
                            output
                        };
                        collator.collate(&batch, &targets, &output, None)?
                    }
                };

                for row in &rows {
                    writer.write_record(row)?;
                }
                writer.flush()?;
                summary.rows_written += rows.len() as u64;
                ctx.set_progress(grouper.rows_consumed(), total_rows);
                debug!(
                    task_id = %ctx.id(),
                    batch = batch_number,
                    rows = rows.len(),
                    "Batch written"
                );
            }
            Ok::<(), MeasureError>(())
        }
        .await;

        if let Err(e) = scratch.close() {
            warn!(task_id = %ctx.id(), "Failed to remove scratch directory: {}", e);
        }

        match outcome {
            Ok(()) => {
                writer.flush()?;
                summary.cancelled = ctx.is_cancelled();
                ctx.set_status(format!(
                    "{} of {} rows written",
                    summary.rows_written, summary.total_rows
                ));
                Ok(summary)
            }
            Err(e) => {
                warn!(task_id = %ctx.id(), batches = summary.batches, "Measurement failed: {}", e);
                if let Err(write_error) = append_terminal_line(writer, &e) {
                    warn!(task_id = %ctx.id(), "Failed to write terminal error line: {}", write_error);
                }
                Err(e)
            }
        }
    }
}

fn append_terminal_line(writer: csv::Writer<File>, error: &MeasureError) -> std::io::Result<()> {
    let mut file = writer.into_inner().map_err(|e| e.into_error())?;
    writeln!(file, "{}", error.terminal_line())?;
    file.flush()
}
