//! Output column plan
//!
//! `OutputSchema` is computed once from the options before any row is read.
//! The script builder walks `columns()` to decide what each valid target
//! prints, and the collator walks the same list to decide how many lines each
//! valid target consumes, so the two cannot drift apart.

use super::options::MeasurementOptions;

/// One measurement column, in output order
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// Absolute time of a relative sample point
    SampleTime { point: f64 },
    /// Formant frequency at a relative sample point
    Formant { number: u8, point: f64 },
    MinPitch,
    MeanPitch,
    MaxPitch,
    MaxIntensity,
    /// Spectral centre of gravity at the given power
    CentreOfGravity { power: f64 },
    /// Named output of the custom script
    Custom { name: String },
}

impl Measurement {
    /// Output CSV header for this column
    pub fn header(&self) -> String {
        match self {
            Measurement::SampleTime { point } => format!("time_{}", point),
            Measurement::Formant { number, point } => format!("F{}-time_{}", number, point),
            Measurement::MinPitch => "minPitch".to_string(),
            Measurement::MeanPitch => "meanPitch".to_string(),
            Measurement::MaxPitch => "maxPitch".to_string(),
            Measurement::MaxIntensity => "maxIntensity".to_string(),
            Measurement::CentreOfGravity { power } => format!("cog{}", power),
            Measurement::Custom { name } => name.clone(),
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Measurement::Custom { .. })
    }
}

/// Declared measurement columns for one task
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    columns: Vec<Measurement>,
}

impl OutputSchema {
    pub fn from_options(options: &MeasurementOptions) -> Self {
        let mut columns = Vec::new();

        if let Some(formants) = &options.formants {
            for &point in &formants.sample_points {
                columns.push(Measurement::SampleTime { point });
                for &number in &formants.formants {
                    columns.push(Measurement::Formant { number, point });
                }
            }
        }

        if options.pitch.minimum {
            columns.push(Measurement::MinPitch);
        }
        if options.pitch.mean {
            columns.push(Measurement::MeanPitch);
        }
        if options.pitch.maximum {
            columns.push(Measurement::MaxPitch);
        }
        if options.maximum_intensity {
            columns.push(Measurement::MaxIntensity);
        }
        for &power in &options.centre_of_gravity {
            columns.push(Measurement::CentreOfGravity { power });
        }
        if let Some(custom) = &options.custom {
            for name in &custom.output_columns {
                columns.push(Measurement::Custom { name: name.clone() });
            }
        }

        Self { columns }
    }

    pub fn columns(&self) -> &[Measurement] {
        &self.columns
    }

    /// Number of measurement cells per row (excluding `Error`)
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Praat output lines consumed by one valid target
    pub fn lines_per_target(&self) -> usize {
        self.columns.len()
    }

    /// Full output header: pass-through headers, measurements, then `Error`
    pub fn header_row(&self, input_headers: &[String], pass_through: bool) -> Vec<String> {
        let mut header = Vec::with_capacity(input_headers.len() + self.columns.len() + 1);
        if pass_through {
            header.extend(input_headers.iter().cloned());
        }
        header.extend(self.columns.iter().map(Measurement::header));
        header.push("Error".to_string());
        header
    }
}
