//! Transcript audio lookup

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::MeasureError;

/// Maps a transcript id to a readable local audio file
#[async_trait]
pub trait MediaLocator: Send + Sync {
    /// `None` when the transcript has no accessible audio
    async fn locate(&self, transcript: &str) -> Result<Option<PathBuf>, MeasureError>;
}

/// Finds `<transcript stem>.wav` in a media directory
#[derive(Debug, Clone)]
pub struct MediaDirectory {
    root: PathBuf,
}

impl MediaDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidate(&self, transcript: &str) -> Option<PathBuf> {
        let name = Path::new(transcript).file_name()?;
        let stem = Path::new(name).file_stem()?;
        let mut file = stem.to_os_string();
        file.push(".wav");
        Some(self.root.join(file))
    }
}

#[async_trait]
impl MediaLocator for MediaDirectory {
    async fn locate(&self, transcript: &str) -> Result<Option<PathBuf>, MeasureError> {
        let Some(path) = self.candidate(transcript) else {
            return Ok(None);
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
