//! Praat script generation
//!
//! A batch becomes a `ScriptProgram`: a flat list of typed instructions that
//! `render` turns into Praat script text. Every instruction knows how many
//! output lines it prints, and the builder emits them by walking
//! `OutputSchema::columns()`, so a valid target always prints exactly
//! `lines_per_target()` lines in column order. Invalid targets get no
//! instructions at all.
//!
//! All analysis runs on a sub-clip extracted with `preserve times = no`, so
//! times inside a target block are relative to the window start.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::profile::SpeakerProfile;
use super::schema::{Measurement, OutputSchema};
use super::target::Target;

/// Pitch statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchStat {
    Minimum,
    Mean,
    Maximum,
}

/// One step of a generated script
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    ReadSound {
        path: PathBuf,
    },
    /// Extract the analysis window and set per-target variables
    BeginTarget {
        window_start: f64,
        window_end: f64,
        target_start: f64,
        target_end: f64,
        window_offset: f64,
        sample_number: u64,
    },
    ToFormant {
        ceiling: f64,
    },
    ToPitch {
        floor: f64,
        ceiling: f64,
        voicing_threshold: f64,
    },
    ToIntensity {
        floor: f64,
    },
    /// Spectrum of the target span, or the whole window when `None`
    ToSpectrum {
        span: Option<(f64, f64)>,
    },
    /// Absolute (recording) time of a sample point
    EmitTime {
        absolute: f64,
    },
    EmitFormant {
        number: u8,
        at: f64,
    },
    /// Pitch statistic over `from..to`; `0, 0` covers the whole window
    EmitPitch {
        stat: PitchStat,
        from: f64,
        to: f64,
    },
    EmitMaxIntensity {
        from: f64,
        to: f64,
    },
    EmitCentreOfGravity {
        power: f64,
    },
    /// User snippet with speaker attributes bound as string variables
    RunCustom {
        snippet: String,
        variables: Vec<(String, String)>,
        outputs: usize,
    },
    EndTarget {
        objects: Vec<&'static str>,
    },
    RemoveSound,
}

impl Instruction {
    /// Lines this instruction prints to stdout
    pub fn output_lines(&self) -> usize {
        match self {
            Instruction::EmitTime { .. }
            | Instruction::EmitFormant { .. }
            | Instruction::EmitPitch { .. }
            | Instruction::EmitMaxIntensity { .. }
            | Instruction::EmitCentreOfGravity { .. } => 1,
            Instruction::RunCustom { outputs, .. } => *outputs,
            _ => 0,
        }
    }

    /// Praat objects created inside a target block
    fn objects(&self) -> &'static [&'static str] {
        match self {
            Instruction::ToFormant { .. } => &["formant"],
            Instruction::ToPitch { .. } => &["pitch"],
            Instruction::ToIntensity { .. } => &["intensity"],
            Instruction::ToSpectrum { span: Some(_) } => &["spectrumPart", "spectrum"],
            Instruction::ToSpectrum { span: None } => &["spectrum"],
            _ => &[],
        }
    }

    fn render(&self, out: &mut String) {
        // Writing to a String cannot fail
        let _ = match self {
            Instruction::ReadSound { path } => {
                writeln!(out, "sound = Read from file: {}", quote(&path.to_string_lossy()))
            }
            Instruction::BeginTarget {
                window_start,
                window_end,
                target_start,
                target_end,
                window_offset,
                sample_number,
            } => writeln!(
                out,
                "\n# target {sample_number}\n\
                 sampleNumber = {sample_number}\n\
                 windowOffset = {window_offset}\n\
                 windowAbsoluteStart = {window_start}\n\
                 targetStart = {target_start}\n\
                 targetEnd = {target_end}\n\
                 selectObject: sound\n\
                 samples = Extract part: {window_start}, {window_end}, \"rectangular\", 1.0, \"no\""
            ),
            Instruction::ToFormant { ceiling } => writeln!(
                out,
                "selectObject: samples\nformant = To Formant (burg): 0, 5, {ceiling}, 0.025, 50"
            ),
            Instruction::ToPitch {
                floor,
                ceiling,
                voicing_threshold,
            } => writeln!(
                out,
                "selectObject: samples\n\
                 pitch = To Pitch (ac): 0, {floor}, 15, \"no\", 0.03, {voicing_threshold}, 0.01, 0.35, 0.14, {ceiling}"
            ),
            Instruction::ToIntensity { floor } => writeln!(
                out,
                "selectObject: samples\nintensity = To Intensity: {floor}, 0, \"yes\""
            ),
            Instruction::ToSpectrum { span: Some((from, to)) } => writeln!(
                out,
                "selectObject: samples\n\
                 spectrumPart = Extract part: {from}, {to}, \"rectangular\", 1.0, \"no\"\n\
                 spectrum = To Spectrum: \"yes\""
            ),
            Instruction::ToSpectrum { span: None } => writeln!(
                out,
                "selectObject: samples\nspectrum = To Spectrum: \"yes\""
            ),
            Instruction::EmitTime { absolute } => {
                writeln!(out, "appendInfoLine: fixed$({absolute}, 3)")
            }
            Instruction::EmitFormant { number, at } => writeln!(
                out,
                "selectObject: formant\n\
                 value = Get value at time: {number}, {at}, \"hertz\", \"linear\"\n\
                 appendInfoLine: fixed$(value, 0)"
            ),
            Instruction::EmitPitch { stat, from, to } => {
                let query = match stat {
                    PitchStat::Minimum => format!("Get minimum: {from}, {to}, \"Hertz\", \"parabolic\""),
                    PitchStat::Mean => format!("Get mean: {from}, {to}, \"Hertz\""),
                    PitchStat::Maximum => format!("Get maximum: {from}, {to}, \"Hertz\", \"parabolic\""),
                };
                writeln!(
                    out,
                    "selectObject: pitch\nvalue = {query}\nappendInfoLine: fixed$(value, 2)"
                )
            }
            Instruction::EmitMaxIntensity { from, to } => writeln!(
                out,
                "selectObject: intensity\n\
                 value = Get maximum: {from}, {to}, \"parabolic\"\n\
                 appendInfoLine: fixed$(value, 2)"
            ),
            Instruction::EmitCentreOfGravity { power } => writeln!(
                out,
                "selectObject: spectrum\n\
                 value = Get centre of gravity: {power}\n\
                 appendInfoLine: fixed$(value, 2)"
            ),
            Instruction::RunCustom {
                snippet, variables, ..
            } => {
                for (name, value) in variables {
                    let _ = writeln!(out, "{}$ = {}", name, quote(value));
                }
                let _ = writeln!(out, "selectObject: samples");
                out.push_str(snippet);
                if !snippet.ends_with('\n') {
                    out.push('\n');
                }
                Ok(())
            }
            Instruction::EndTarget { objects } => writeln!(out, "removeObject: {}", objects.join(", ")),
            Instruction::RemoveSound => writeln!(out, "\nremoveObject: sound"),
        };
    }
}

/// Praat string literal; line breaks become spaces
fn quote(value: &str) -> String {
    let escaped: String = value
        .chars()
        .map(|c| match c {
            '\r' | '\n' => ' ',
            c => c,
        })
        .collect();
    format!("\"{}\"", escaped.replace('"', "\"\""))
}

/// Whether `name` can be bound as a `participant_<name>$` string variable
fn is_attribute_variable(name: &str) -> bool {
    name.strip_prefix("participant_").is_some_and(|rest| {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Instructions for one batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptProgram {
    instructions: Vec<Instruction>,
}

impl ScriptProgram {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Total stdout lines the script prints
    pub fn output_lines(&self) -> usize {
        self.instructions.iter().map(Instruction::output_lines).sum()
    }

    /// Praat script text
    pub fn render(&self) -> String {
        let mut out = String::from("# measurement script\n");
        for instruction in &self.instructions {
            instruction.render(&mut out);
        }
        out
    }
}

/// Builds batch programs from the output schema
#[derive(Debug, Clone)]
pub struct ScriptBuilder<'a> {
    schema: &'a OutputSchema,
    window_offset: f64,
    custom_script: Option<&'a str>,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(schema: &'a OutputSchema, window_offset: f64, custom_script: Option<&'a str>) -> Self {
        Self {
            schema,
            window_offset,
            custom_script,
        }
    }

    /// Program measuring every valid target of a batch, in target order
    pub fn build(&self, audio: &Path, targets: &[Target], speaker: &SpeakerProfile) -> ScriptProgram {
        let mut instructions = vec![Instruction::ReadSound {
            path: audio.to_path_buf(),
        }];

        for (index, target) in targets.iter().enumerate() {
            if !target.is_valid() {
                continue;
            }
            self.build_target(&mut instructions, index as u64 + 1, target, speaker);
        }

        instructions.push(Instruction::RemoveSound);
        ScriptProgram { instructions }
    }

    fn build_target(
        &self,
        instructions: &mut Vec<Instruction>,
        sample_number: u64,
        target: &Target,
        speaker: &SpeakerProfile,
    ) {
        let window_start = (target.start - self.window_offset).max(0.0);
        let window_end = target.end + self.window_offset;
        let relative = |t: f64| t - window_start;
        let target_start = relative(target.start);
        let target_end = relative(target.end);
        // Point targets are measured across the whole window
        let (span_from, span_to) = if target.is_point() {
            (0.0, 0.0)
        } else {
            (target_start, target_end)
        };

        instructions.push(Instruction::BeginTarget {
            window_start,
            window_end,
            target_start,
            target_end,
            window_offset: target.start - window_start,
            sample_number,
        });

        let profile = &speaker.profile;
        let mut objects = vec!["samples"];
        let mut prepare = |instructions: &mut Vec<Instruction>, step: Instruction| {
            let created = step.objects();
            if created.iter().all(|name| objects.contains(name)) {
                return;
            }
            objects.extend_from_slice(created);
            instructions.push(step);
        };
        let mut custom_done = false;

        for column in self.schema.columns() {
            match column {
                Measurement::SampleTime { point } => {
                    instructions.push(Instruction::EmitTime {
                        absolute: target.time_at(*point),
                    });
                }
                Measurement::Formant { number, point } => {
                    prepare(
                        instructions,
                        Instruction::ToFormant {
                            ceiling: profile.formant_ceiling,
                        },
                    );
                    instructions.push(Instruction::EmitFormant {
                        number: *number,
                        at: relative(target.time_at(*point)),
                    });
                }
                Measurement::MinPitch | Measurement::MeanPitch | Measurement::MaxPitch => {
                    prepare(
                        instructions,
                        Instruction::ToPitch {
                            floor: profile.pitch_floor,
                            ceiling: profile.pitch_ceiling,
                            voicing_threshold: profile.voicing_threshold,
                        },
                    );
                    let stat = match column {
                        Measurement::MinPitch => PitchStat::Minimum,
                        Measurement::MeanPitch => PitchStat::Mean,
                        _ => PitchStat::Maximum,
                    };
                    instructions.push(Instruction::EmitPitch {
                        stat,
                        from: span_from,
                        to: span_to,
                    });
                }
                Measurement::MaxIntensity => {
                    prepare(
                        instructions,
                        Instruction::ToIntensity {
                            floor: profile.pitch_floor,
                        },
                    );
                    instructions.push(Instruction::EmitMaxIntensity {
                        from: span_from,
                        to: span_to,
                    });
                }
                Measurement::CentreOfGravity { power } => {
                    let span = (!target.is_point()).then_some((target_start, target_end));
                    prepare(instructions, Instruction::ToSpectrum { span });
                    instructions.push(Instruction::EmitCentreOfGravity { power: *power });
                }
                Measurement::Custom { .. } => {
                    if custom_done {
                        continue;
                    }
                    custom_done = true;
                    instructions.push(Instruction::RunCustom {
                        snippet: self.custom_script.unwrap_or_default().to_string(),
                        variables: speaker
                            .attributes
                            .iter()
                            .filter(|(name, _)| is_attribute_variable(name))
                            .map(|(name, value)| (name.clone(), value.clone()))
                            .collect(),
                        outputs: self.schema.columns().iter().filter(|c| c.is_custom()).count(),
                    });
                }
            }
        }

        instructions.push(Instruction::EndTarget { objects });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::options::{ColumnLayout, CustomScript, FormantOptions, MeasurementOptions};
    use acm_common::config::{AcousticProfile, Gender};
    use std::collections::BTreeMap;

    fn speaker() -> SpeakerProfile {
        let mut attributes = BTreeMap::new();
        attributes.insert("participant_gender".to_string(), "M".to_string());
        attributes.insert("participant_region".to_string(), "O\"Hara".to_string());
        SpeakerProfile {
            gender: Gender::Male,
            profile: AcousticProfile::MALE,
            attributes,
        }
    }

    fn full_options() -> MeasurementOptions {
        let mut options = MeasurementOptions::new(ColumnLayout {
            transcript: 0,
            speaker: 1,
            mark: 2,
            mark_end: Some(3),
        });
        options.formants = Some(FormantOptions {
            formants: vec![1, 2, 3],
            sample_points: vec![0.2, 0.8],
        });
        options.pitch.minimum = true;
        options.pitch.mean = true;
        options.maximum_intensity = true;
        options.centre_of_gravity = vec![1.0, 2.0];
        options.custom = Some(CustomScript {
            script: "appendInfoLine: targetEnd - targetStart\nappendInfoLine: participant_region$".to_string(),
            output_columns: vec!["duration".to_string(), "region".to_string()],
        });
        options
    }

    fn emitted_kinds(program: &ScriptProgram) -> Vec<&'static str> {
        program
            .instructions()
            .iter()
            .flat_map(|i| {
                let kind = match i {
                    Instruction::EmitTime { .. } => "time",
                    Instruction::EmitFormant { .. } => "formant",
                    Instruction::EmitPitch { .. } => "pitch",
                    Instruction::EmitMaxIntensity { .. } => "intensity",
                    Instruction::EmitCentreOfGravity { .. } => "cog",
                    Instruction::RunCustom { .. } => "custom",
                    _ => "",
                };
                std::iter::repeat(kind).take(i.output_lines())
            })
            .collect()
    }

    fn schema_kinds(schema: &OutputSchema) -> Vec<&'static str> {
        schema
            .columns()
            .iter()
            .map(|c| match c {
                Measurement::SampleTime { .. } => "time",
                Measurement::Formant { .. } => "formant",
                Measurement::MinPitch | Measurement::MeanPitch | Measurement::MaxPitch => "pitch",
                Measurement::MaxIntensity => "intensity",
                Measurement::CentreOfGravity { .. } => "cog",
                Measurement::Custom { .. } => "custom",
            })
            .collect()
    }

    #[test]
    fn test_output_lines_follow_schema_for_valid_targets() {
        let options = full_options();
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.025, options.custom.as_ref().map(|c| c.script.as_str()));
        let targets = vec![
            Target::new(1.0, 1.2),
            Target::invalid("Row 2: could not parse mark \"abc\""),
            Target::new(2.0, 2.0),
            Target::invalid("Row 4: no mark column (2)"),
            Target::new(0.01, 0.3),
        ];

        let program = builder.build(Path::new("/audio/a.wav"), &targets, &speaker());
        assert_eq!(program.output_lines(), 3 * schema.lines_per_target());

        let per_target = schema_kinds(&schema);
        let expected: Vec<&str> = per_target.iter().cycle().take(3 * per_target.len()).copied().collect();
        assert_eq!(emitted_kinds(&program), expected);
    }

    #[test]
    fn test_all_invalid_targets_emit_nothing() {
        let options = full_options();
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.025, None);
        let program = builder.build(
            Path::new("a.wav"),
            &[Target::invalid("bad"), Target::invalid("worse")],
            &speaker(),
        );
        assert_eq!(program.output_lines(), 0);
        assert!(!program
            .instructions()
            .iter()
            .any(|i| matches!(i, Instruction::BeginTarget { .. })));
    }

    #[test]
    fn test_window_is_clamped_and_times_relative() {
        let options = MeasurementOptions::new(ColumnLayout {
            transcript: 0,
            speaker: 1,
            mark: 2,
            mark_end: Some(3),
        });
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.5, None);
        let program = builder.build(Path::new("a.wav"), &[Target::new(0.25, 1.25)], &speaker());

        let begin = program
            .instructions()
            .iter()
            .find(|i| matches!(i, Instruction::BeginTarget { .. }))
            .unwrap();
        assert_eq!(
            begin,
            &Instruction::BeginTarget {
                window_start: 0.0,
                window_end: 1.75,
                target_start: 0.25,
                target_end: 1.25,
                window_offset: 0.25,
                sample_number: 1,
            }
        );

        assert!(program
            .instructions()
            .contains(&Instruction::EmitTime { absolute: 0.75 }));
        assert!(program
            .instructions()
            .contains(&Instruction::EmitFormant { number: 1, at: 0.75 }));
    }

    #[test]
    fn test_analysis_objects_created_once_per_target() {
        let options = full_options();
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.025, Some("appendInfoLine: 1\nappendInfoLine: 2"));
        let program = builder.build(Path::new("a.wav"), &[Target::new(1.0, 1.5)], &speaker());

        let count = |pred: fn(&Instruction) -> bool| program.instructions().iter().filter(|i| pred(i)).count();
        assert_eq!(count(|i| matches!(i, Instruction::ToFormant { .. })), 1);
        assert_eq!(count(|i| matches!(i, Instruction::ToPitch { .. })), 1);
        assert_eq!(count(|i| matches!(i, Instruction::ToSpectrum { .. })), 1);
        assert_eq!(count(|i| matches!(i, Instruction::RunCustom { .. })), 1);

        let end = program.instructions().iter().rev().nth(1).unwrap();
        assert_eq!(
            end,
            &Instruction::EndTarget {
                objects: vec!["samples", "formant", "pitch", "intensity", "spectrumPart", "spectrum"],
            }
        );
    }

    #[test]
    fn test_render_uses_profile_and_escapes_strings() {
        let options = full_options();
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.025, options.custom.as_ref().map(|c| c.script.as_str()));
        let program = builder.build(Path::new("/data/say \"hi\".wav"), &[Target::new(1.0, 1.5)], &speaker());
        let text = program.render();

        assert!(text.contains("sound = Read from file: \"/data/say \"\"hi\"\".wav\""));
        assert!(text.contains("To Formant (burg): 0, 5, 5000, 0.025, 50"));
        assert!(text.contains("To Pitch (ac): 0, 30, 15, \"no\", 0.03, 0.4, 0.01, 0.35, 0.14, 250"));
        assert!(text.contains("participant_region$ = \"O\"\"Hara\""));
        assert!(text.contains("appendInfoLine: participant_region$\n"));
        assert!(text.contains("Get centre of gravity: 2"));
        assert!(text.trim_end().ends_with("removeObject: sound"));
    }

    #[test]
    fn test_custom_variables_are_single_line_and_well_named() {
        let options = full_options();
        let schema = OutputSchema::from_options(&options);
        let builder = ScriptBuilder::new(&schema, 0.025, options.custom.as_ref().map(|c| c.script.as_str()));
        let mut speaker = speaker();
        speaker
            .attributes
            .insert("participant_region".to_string(), "north\r\nwest".to_string());
        speaker.attributes.insert("sex".to_string(), "M".to_string());
        speaker
            .attributes
            .insert("participant_first-language".to_string(), "en".to_string());

        let text = builder
            .build(Path::new("/data/a.wav"), &[Target::new(1.0, 1.5)], &speaker)
            .render();

        assert!(text.contains("participant_region$ = \"north  west\"\n"));
        assert!(text.contains("participant_gender$ = \"M\""));
        assert!(!text.contains("sex$"));
        assert!(!text.contains("participant_first-language$"));
    }
}
