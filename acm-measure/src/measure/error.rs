//! Measurement pipeline errors
//!
//! Row-level and batch-level problems are not errors here: they are written
//! into the affected rows' `Error` cells. Everything in `MeasureError` aborts
//! the enclosing task.

use thiserror::Error;

use super::runner::PraatError;

/// Fatal measurement pipeline error
#[derive(Debug, Error)]
pub enum MeasureError {
    /// Input CSV could not be read or output CSV could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (script file, output file, temp directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Praat could not be run or reported an error
    #[error(transparent)]
    Praat(#[from] PraatError),

    /// Speaker attribute or media lookup failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Measurement options rejected before the task starts
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Praat output does not match the generated script
    #[error("Praat output mismatch: {0}")]
    Protocol(String),
}

impl MeasureError {
    /// Stable name written in front of the message on the terminal output line
    pub fn kind(&self) -> &'static str {
        match self {
            MeasureError::Csv(_) => "CsvError",
            MeasureError::Io(_) => "IoError",
            MeasureError::Praat(_) => "PraatError",
            MeasureError::Database(_) => "DatabaseError",
            MeasureError::InvalidOptions(_) => "InvalidOptions",
            MeasureError::Protocol(_) => "ProtocolError",
        }
    }

    /// Single-line `Kind: message` form
    pub fn terminal_line(&self) -> String {
        let message = self.to_string().replace(['\r', '\n'], " ");
        format!("{}: {}", self.kind(), message.trim())
    }
}
