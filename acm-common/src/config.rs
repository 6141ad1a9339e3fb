//! Configuration loading and path resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every section is
//! optional; missing values fall back to built-in defaults.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--root-folder`)
//! 2. Environment variables (`ACM_CONFIG`, `ACM_ROOT_FOLDER`, `ACM_PRAAT_PATH`)
//! 3. TOML configuration file
//! 4. OS-dependent compiled defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "ACM_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "ACM_ROOT_FOLDER";

/// Environment variable naming the Praat installation directory
pub const PRAAT_PATH_ENV_VAR: &str = "ACM_PRAAT_PATH";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database, media and results (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Praat installation
    #[serde(default)]
    pub praat: PraatConfig,

    /// Task lifecycle tuning
    #[serde(default)]
    pub tasks: TaskConfig,

    /// Measurement defaults applied when a request leaves them unset
    #[serde(default)]
    pub measurement: MeasurementDefaults,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Praat installation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PraatConfig {
    /// Directory containing the Praat executable
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Task lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Seconds a finished task survives without a keep-alive
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds between reaper sweeps
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,
}

impl TaskConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
        }
    }
}

/// Speaker gender used to pick an acoustic profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Gender-dependent analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcousticProfile {
    /// Maximum formant frequency (Hz)
    pub formant_ceiling: f64,
    /// Pitch floor (Hz)
    pub pitch_floor: f64,
    /// Pitch ceiling (Hz)
    pub pitch_ceiling: f64,
    /// Voicing threshold (0.0-1.0)
    pub voicing_threshold: f64,
}

impl AcousticProfile {
    /// Praat's customary settings for adult male speakers
    pub const MALE: AcousticProfile = AcousticProfile {
        formant_ceiling: 5000.0,
        pitch_floor: 30.0,
        pitch_ceiling: 250.0,
        voicing_threshold: 0.4,
    };

    /// Praat's customary settings for adult female speakers
    pub const FEMALE: AcousticProfile = AcousticProfile {
        formant_ceiling: 5500.0,
        pitch_floor: 60.0,
        pitch_ceiling: 500.0,
        voicing_threshold: 0.5,
    };
}

/// Measurement defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementDefaults {
    /// Seconds of context extracted either side of each target
    #[serde(default = "default_window_offset")]
    pub window_offset: f64,

    /// Participant attribute holding the speaker's gender
    #[serde(default = "default_gender_attribute")]
    pub gender_attribute: String,

    /// Profile used when the gender attribute is missing or unrecognised
    #[serde(default = "default_fallback_gender")]
    pub fallback_gender: Gender,

    #[serde(default = "default_male_profile")]
    pub male: AcousticProfile,

    #[serde(default = "default_female_profile")]
    pub female: AcousticProfile,

    /// Input CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for MeasurementDefaults {
    fn default() -> Self {
        Self {
            window_offset: default_window_offset(),
            gender_attribute: default_gender_attribute(),
            fallback_gender: default_fallback_gender(),
            male: default_male_profile(),
            female: default_female_profile(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:5790".to_string()
}

fn default_idle_timeout_secs() -> u64 {
    120
}

fn default_reaper_interval_secs() -> u64 {
    5
}

fn default_window_offset() -> f64 {
    0.025
}

fn default_gender_attribute() -> String {
    "participant_gender".to_string()
}

fn default_fallback_gender() -> Gender {
    Gender::Female
}

fn default_male_profile() -> AcousticProfile {
    AcousticProfile::MALE
}

fn default_female_profile() -> AcousticProfile {
    AcousticProfile::FEMALE
}

fn default_delimiter() -> char {
    ','
}

/// Locate the TOML config file
///
/// Returns `None` when no file is configured and none exists at the
/// platform default location; callers then run on built-in defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("acm").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/acm/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load TOML configuration, or defaults when `path` is `None`
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        debug!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Root folder resolution: CLI → environment → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Praat installation directory: environment → TOML → platform default
pub fn resolve_praat_path(config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var(PRAAT_PATH_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.praat.path {
        return path.clone();
    }

    default_praat_path()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("acm"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/acm"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("acm"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/acm"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("acm"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\acm"))
    } else {
        PathBuf::from("./acm_data")
    }
}

fn default_praat_path() -> PathBuf {
    if cfg!(target_os = "windows") {
        PathBuf::from("C:\\Program Files\\Praat")
    } else if cfg!(target_os = "macos") {
        PathBuf::from("/Applications")
    } else {
        PathBuf::from("/usr/bin")
    }
}
