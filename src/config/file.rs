//! TOML configuration file loading
//!
//! Supports `~/.config/sketchbooth/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::trigger::TriggerEvent;
use crate::voice::{DeviceSelector, KeywordBinding};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Drawing dataset
    #[serde(default)]
    pub drawings: DrawingsFileConfig,

    /// Microphone and keywords
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// LED and button
    #[serde(default)]
    pub hardware: HardwareFileConfig,

    /// Snapshot camera
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Object detector
    #[serde(default)]
    pub detector: DetectorFileConfig,

    /// Capture pipeline tuning
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// Printer output
    #[serde(default)]
    pub printer: PrinterFileConfig,

    /// Control loop
    #[serde(default)]
    pub orchestrator: OrchestratorFileConfig,
}

/// Drawing dataset configuration
#[derive(Debug, Default, Deserialize)]
pub struct DrawingsFileConfig {
    /// Directory of `<category>.ndjson` files
    pub dataset_dir: Option<PathBuf>,

    /// JSON alias table (detector class → category)
    pub label_map: Option<PathBuf>,

    /// Category drawn for unknown classes
    pub default_category: Option<String>,
}

/// Voice trigger configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// "default", "auto" or a device index
    pub device: Option<DeviceSelector>,

    /// Detection sensitivity in [0, 1]
    pub sensitivity: Option<f32>,

    /// Keyword table, in classifier index order
    pub keywords: Option<Vec<KeywordBinding>>,

    /// Save the session's audio here on shutdown
    pub recording_path: Option<PathBuf>,

    /// Longest recording kept, in seconds
    pub recording_limit_secs: Option<u64>,
}

/// LED and button configuration
#[derive(Debug, Default, Deserialize)]
pub struct HardwareFileConfig {
    pub led: Option<String>,
    pub led_root: Option<PathBuf>,
    pub button_gpio: Option<u32>,
    pub gpio_root: Option<PathBuf>,
    pub button_active_low: Option<bool>,
}

/// Snapshot camera configuration
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Snapshot program writing an image to stdout
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// Device node that must exist (e.g. "/dev/video0")
    pub device: Option<PathBuf>,
    /// Frame-skip option of the program; "" disables it
    pub skip_option: Option<String>,
}

/// Object detector configuration
#[derive(Debug, Default, Deserialize)]
pub struct DetectorFileConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    /// JSON map of class id → class name
    pub labels: Option<PathBuf>,
}

/// Capture pipeline tuning
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    pub discard_frames: Option<usize>,
    pub score_threshold: Option<f32>,
    pub canny_low: Option<f32>,
    pub canny_high: Option<f32>,
    pub dilation_iterations: Option<u32>,
    /// 0 prints at camera resolution
    pub print_width: Option<u32>,
    pub feed_lines: Option<u32>,
}

/// Printer backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterKind {
    /// Submit through a spooler command
    Command,
    /// Write PNG files to a directory
    Spool,
}

/// Printer configuration
#[derive(Debug, Default, Deserialize)]
pub struct PrinterFileConfig {
    pub kind: Option<PrinterKind>,
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub spool_dir: Option<PathBuf>,
}

/// Control loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct OrchestratorFileConfig {
    pub poll_interval_ms: Option<u64>,
}

/// Default config file location
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "sketchbooth", "sketchbooth")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Parse a config file
///
/// # Errors
///
/// Returns a configuration error if the file can't be read or parsed
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the default config file, if present
///
/// # Errors
///
/// Returns a configuration error if the file exists but is malformed
pub fn load_config_file() -> Result<ConfigFile> {
    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }

    let file = read_config_file(&path)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(file)
}

/// Keywords used when none are configured
#[must_use]
pub fn default_keywords() -> Vec<KeywordBinding> {
    vec![
        KeywordBinding {
            phrase: "snapshot".to_string(),
            event: TriggerEvent::PrintRequest,
        },
        KeywordBinding {
            phrase: "outline".to_string(),
            event: TriggerEvent::EdgePrintRequest,
        },
    ]
}
