//! Measurement request options
//!
//! Options arrive with the task request and are validated once, before the
//! task is registered. Unset values fall back to `MeasurementDefaults`.

use serde::{Deserialize, Serialize};

use super::MeasureError;

/// Input CSV column positions (0-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Transcript (recording) id column
    pub transcript: usize,
    /// Participant (speaker) name column
    pub speaker: usize,
    /// Target start time column (seconds)
    pub mark: usize,
    /// Target end time column (seconds); point targets when absent
    #[serde(default)]
    pub mark_end: Option<usize>,
}

/// Formant extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormantOptions {
    /// Formant numbers to report (1-5)
    #[serde(default = "default_formants")]
    pub formants: Vec<u8>,

    /// Relative positions across the target span (0.0-1.0)
    #[serde(default = "default_sample_points")]
    pub sample_points: Vec<f64>,
}

impl Default for FormantOptions {
    fn default() -> Self {
        Self {
            formants: default_formants(),
            sample_points: default_sample_points(),
        }
    }
}

/// Pitch statistics to report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitchOptions {
    #[serde(default)]
    pub minimum: bool,
    #[serde(default)]
    pub mean: bool,
    #[serde(default)]
    pub maximum: bool,
}

impl PitchOptions {
    pub fn any(&self) -> bool {
        self.minimum || self.mean || self.maximum
    }
}

/// User-supplied Praat snippet run once per valid target
///
/// The snippet must print exactly one line per declared output column, in
/// column order. Speaker attributes are available as `participant_<name>$`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomScript {
    pub script: String,
    #[serde(default)]
    pub output_columns: Vec<String>,
}

/// Complete option set for one measurement task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementOptions {
    pub columns: ColumnLayout,

    /// Input field delimiter (default from configuration)
    #[serde(default)]
    pub delimiter: Option<char>,

    /// Copy every input column in front of the measurements (default: true)
    #[serde(default = "default_pass_through")]
    pub pass_through: bool,

    /// Seconds of context either side of each target (default from configuration)
    #[serde(default)]
    pub window_offset: Option<f64>,

    /// Formant settings; `None` disables formant extraction
    #[serde(default = "default_formant_options")]
    pub formants: Option<FormantOptions>,

    #[serde(default)]
    pub pitch: PitchOptions,

    /// Report maximum intensity (dB)
    #[serde(default)]
    pub maximum_intensity: bool,

    /// Spectral centre of gravity powers (e.g. 1.0, 2.0, 0.67)
    #[serde(default)]
    pub centre_of_gravity: Vec<f64>,

    #[serde(default)]
    pub custom: Option<CustomScript>,
}

impl MeasurementOptions {
    /// Options measuring F1 and F2 at the target midpoint
    pub fn new(columns: ColumnLayout) -> Self {
        Self {
            columns,
            delimiter: None,
            pass_through: default_pass_through(),
            window_offset: None,
            formants: default_formant_options(),
            pitch: PitchOptions::default(),
            maximum_intensity: false,
            centre_of_gravity: Vec::new(),
            custom: None,
        }
    }

    /// Reject option sets that cannot produce a consistent column plan
    pub fn validate(&self) -> Result<(), MeasureError> {
        if let Some(formants) = &self.formants {
            if formants.formants.is_empty() || formants.sample_points.is_empty() {
                return Err(MeasureError::InvalidOptions(
                    "formant extraction needs at least one formant and one sample point".to_string(),
                ));
            }
            if let Some(n) = formants.formants.iter().find(|n| !(1..=5).contains(*n)) {
                return Err(MeasureError::InvalidOptions(format!(
                    "formant number {} outside 1-5",
                    n
                )));
            }
            if let Some(p) = formants
                .sample_points
                .iter()
                .find(|p| !(0.0..=1.0).contains(*p))
            {
                return Err(MeasureError::InvalidOptions(format!(
                    "sample point {} outside 0.0-1.0",
                    p
                )));
            }
        }

        if let Some(power) = self.centre_of_gravity.iter().find(|p| !p.is_finite() || **p <= 0.0) {
            return Err(MeasureError::InvalidOptions(format!(
                "centre of gravity power {} must be positive",
                power
            )));
        }

        if let Some(offset) = self.window_offset {
            if !offset.is_finite() || offset < 0.0 {
                return Err(MeasureError::InvalidOptions(format!(
                    "window offset {} must be zero or positive",
                    offset
                )));
            }
        }

        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err(MeasureError::InvalidOptions(format!(
                    "delimiter {:?} is not a single-byte character",
                    delimiter
                )));
            }
        }

        if let Some(custom) = &self.custom {
            if custom.script.trim().is_empty() {
                return Err(MeasureError::InvalidOptions("custom script is empty".to_string()));
            }
        }

        let custom_columns = self.custom.as_ref().map_or(0, |c| c.output_columns.len());
        let measures_something = self.formants.is_some()
            || self.pitch.any()
            || self.maximum_intensity
            || !self.centre_of_gravity.is_empty()
            || custom_columns > 0;
        if !measures_something {
            return Err(MeasureError::InvalidOptions(
                "no measurements requested".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_formants() -> Vec<u8> {
    vec![1, 2]
}

fn default_sample_points() -> Vec<f64> {
    vec![0.5]
}

fn default_formant_options() -> Option<FormantOptions> {
    Some(FormantOptions::default())
}

fn default_pass_through() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ColumnLayout {
        ColumnLayout {
            transcript: 0,
            speaker: 1,
            mark: 2,
            mark_end: None,
        }
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let options: MeasurementOptions = serde_json::from_str(
            r#"{ "columns": { "transcript": 0, "speaker": 1, "mark": 2 } }"#,
        )
        .unwrap();

        assert!(options.pass_through);
        let formants = options.formants.as_ref().unwrap();
        assert_eq!(formants.formants, vec![1, 2]);
        assert_eq!(formants.sample_points, vec![0.5]);
        assert!(!options.pitch.any());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_null_formants_disable_extraction() {
        let options: MeasurementOptions = serde_json::from_str(
            r#"{ "columns": { "transcript": 0, "speaker": 1, "mark": 2 },
                 "formants": null, "maximum_intensity": true }"#,
        )
        .unwrap();
        assert!(options.formants.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_plan() {
        let mut options = MeasurementOptions::new(layout());
        options.formants = None;
        assert!(matches!(options.validate(), Err(MeasureError::InvalidOptions(_))));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut options = MeasurementOptions::new(layout());
        options.formants = Some(FormantOptions {
            formants: vec![1, 6],
            sample_points: vec![0.5],
        });
        assert!(options.validate().is_err());

        let mut options = MeasurementOptions::new(layout());
        options.formants = Some(FormantOptions {
            formants: vec![1],
            sample_points: vec![1.5],
        });
        assert!(options.validate().is_err());

        let mut options = MeasurementOptions::new(layout());
        options.window_offset = Some(-0.1);
        assert!(options.validate().is_err());

        let mut options = MeasurementOptions::new(layout());
        options.centre_of_gravity = vec![0.0];
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_custom_only_plan_is_valid() {
        let mut options = MeasurementOptions::new(layout());
        options.formants = None;
        options.custom = Some(CustomScript {
            script: "appendInfoLine: 1".to_string(),
            output_columns: vec!["one".to_string()],
        });
        assert!(options.validate().is_ok());
    }
}
