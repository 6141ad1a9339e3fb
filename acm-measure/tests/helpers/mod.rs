//! Test helper utilities
//!
//! Fake collaborators standing in for Praat, the attribute database and the
//! media store.

#![allow(dead_code)]

use acm_measure::measure::{
    AttributeStore, ColumnLayout, MeasureError, MediaLocator, MeasurementOptions, PraatError,
    ScriptRunner,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Praat stand-in
///
/// Prints one line per `appendInfoLine` in the script, valued
/// `r<call>-<line>`. Call numbers start at 1.
#[derive(Default)]
pub struct FakeRunner {
    calls: AtomicUsize,
    scripts: Mutex<Vec<String>>,
    fail_on_call: Option<(usize, String)>,
    on_call: Option<CallHook>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `stderr` instead of output on call `call`
    pub fn failing_on(call: usize, stderr: &str) -> Self {
        Self {
            fail_on_call: Some((call, stderr.to_string())),
            ..Self::default()
        }
    }

    /// Run `hook` with the call number at the start of every call
    pub fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            on_call: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptRunner for FakeRunner {
    async fn run(&self, script: &Path) -> Result<String, PraatError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.on_call {
            hook(call);
        }

        let text = std::fs::read_to_string(script).expect("script file should exist during run");
        self.scripts.lock().unwrap().push(text.clone());

        if let Some((fail_call, stderr)) = &self.fail_on_call {
            if *fail_call == call {
                return Err(PraatError::Stderr(stderr.clone()));
            }
        }

        let lines = text
            .lines()
            .filter(|line| line.trim_start().starts_with("appendInfoLine"))
            .count();
        Ok((1..=lines).map(|i| format!("r{}-{}\n", call, i)).collect())
    }
}

/// In-memory participant attributes
#[derive(Default)]
pub struct FakeAttributes {
    labels: HashMap<(String, String), String>,
    queries: Mutex<Vec<(String, String)>>,
}

impl FakeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, speaker: &str, attribute: &str, label: &str) -> Self {
        self.labels
            .insert((speaker.to_string(), attribute.to_string()), label.to_string());
        self
    }

    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttributeStore for FakeAttributes {
    async fn attribute(&self, speaker: &str, attribute: &str) -> Result<Option<String>, MeasureError> {
        self.queries
            .lock()
            .unwrap()
            .push((speaker.to_string(), attribute.to_string()));
        Ok(self
            .labels
            .get(&(speaker.to_string(), attribute.to_string()))
            .cloned())
    }
}

/// Media store where only listed transcripts have audio
#[derive(Default)]
pub struct FakeMedia {
    available: HashSet<String>,
}

impl FakeMedia {
    pub fn with_audio(transcripts: &[&str]) -> Self {
        Self {
            available: transcripts.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[async_trait]
impl MediaLocator for FakeMedia {
    async fn locate(&self, transcript: &str) -> Result<Option<PathBuf>, MeasureError> {
        Ok(self
            .available
            .contains(transcript)
            .then(|| PathBuf::from(format!("/media/{}.wav", transcript))))
    }
}

/// transcript, speaker, mark, word
pub fn layout() -> ColumnLayout {
    ColumnLayout {
        transcript: 0,
        speaker: 1,
        mark: 2,
        mark_end: None,
    }
}

/// F1 and F2 at the midpoint: 3 measurement lines per valid target
pub fn default_options() -> MeasurementOptions {
    MeasurementOptions::new(layout())
}

/// Write `transcript,speaker,mark,word` rows to `dir/name`
pub fn write_input(dir: &Path, name: &str, rows: &[(&str, &str, &str)]) -> PathBuf {
    let mut text = String::from("transcript,speaker,mark,word\n");
    for (i, (transcript, speaker, mark)) in rows.iter().enumerate() {
        text.push_str(&format!("{},{},{},w{}\n", transcript, speaker, mark, i + 1));
    }
    let path = dir.join(name);
    std::fs::write(&path, text).expect("Failed to write input CSV");
    path
}

/// Output CSV as records; a trailing non-CSV terminal line comes back as a
/// one-field record
pub fn read_output(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .expect("Failed to open output CSV");
    reader
        .records()
        .map(|r| r.expect("Failed to read output record").iter().map(str::to_string).collect())
        .collect()
}
