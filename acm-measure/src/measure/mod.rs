//! Batch acoustic measurement
//!
//! Streams an input CSV of targets, groups rows by (transcript, speaker),
//! measures each batch with one generated Praat script, and writes result
//! rows in input order.

pub mod collator;
pub mod error;
pub mod grouper;
pub mod media;
pub mod options;
pub mod pipeline;
pub mod profile;
pub mod rows;
pub mod runner;
pub mod schema;
pub mod script;
pub mod target;

pub use error::MeasureError;
pub use media::{MediaDirectory, MediaLocator};
pub use options::{ColumnLayout, CustomScript, FormantOptions, MeasurementOptions, PitchOptions};
pub use pipeline::{missing_media_message, MeasurementJob, MeasurementSummary};
pub use profile::AttributeStore;
pub use runner::{PraatError, PraatRunner, ScriptRunner};
pub use schema::OutputSchema;
