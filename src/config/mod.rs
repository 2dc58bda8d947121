//! Configuration management for the booth
//!
//! Precedence: built-in defaults, then the TOML file, then `SKETCHBOOTH_*`
//! environment variables.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{EdgeSettings, PipelineSettings};
use crate::drawing::DEFAULT_CATEGORY;
use crate::hardware::HardwareConfig;
use crate::orchestrator::POLL_INTERVAL;
use crate::voice::{DeviceSelector, KeywordBinding};
use crate::{Error, Result};

pub use file::{ConfigFile, PrinterKind};

/// Booth configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Drawing dataset
    pub drawings: DrawingConfig,

    /// Microphone and keywords
    pub voice: VoiceConfig,

    /// LED and button
    pub hardware: HardwareConfig,

    /// Snapshot camera
    pub camera: CameraConfig,

    /// Object detector
    pub detector: DetectorConfig,

    /// Capture pipeline tuning
    pub capture: PipelineSettings,

    /// Printer output
    pub printer: PrinterConfig,

    /// How often the control loop checks for triggers
    pub poll_interval: Duration,
}

/// Drawing dataset configuration
#[derive(Debug, Clone)]
pub struct DrawingConfig {
    /// Directory of `<category>.ndjson` files
    pub dataset_dir: PathBuf,

    /// JSON alias table (detector class → category)
    pub label_map: PathBuf,

    /// Category drawn for classes without a dataset
    pub default_category: String,
}

/// Voice trigger configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Input device choice
    pub device: DeviceSelector,

    /// Detection sensitivity in [0, 1]
    pub sensitivity: f32,

    /// Keyword index → phrase and event
    pub keywords: Vec<KeywordBinding>,

    /// Save the session's audio here on shutdown
    ///
    /// The recording is held in memory until then, about 1.9 MB per minute
    /// at 16 kHz.
    pub recording_path: Option<PathBuf>,

    /// Longest recording kept; later audio is dropped
    pub recording_limit: Duration,
}

/// Default cap on the session recording (about 115 MB at 16 kHz)
pub const RECORDING_LIMIT: Duration = Duration::from_secs(60 * 60);

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            device: DeviceSelector::default(),
            sensitivity: 0.5,
            keywords: file::default_keywords(),
            recording_path: None,
            recording_limit: RECORDING_LIMIT,
        }
    }
}

/// Snapshot camera configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub program: String,
    pub args: Vec<String>,
    pub device: Option<PathBuf>,
    /// Option the program takes to skip N frames itself
    pub skip_option: Option<String>,
}

/// Object detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub labels: PathBuf,
}

/// Where prints go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterConfig {
    /// Spooler command (`lp` by default)
    Command { program: String, args: Vec<String> },
    /// PNG files in a directory
    Spool { dir: PathBuf },
}

impl Config {
    /// Load configuration
    ///
    /// With `path`, that file must exist. Without it, the default location is
    /// used when present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file is unreadable or malformed,
    /// or if an override or value is out of range
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                let file = file::read_config_file(path)?;
                tracing::info!(path = %path.display(), "loaded config file");
                file
            }
            None => file::load_config_file()?,
        };

        let mut config = Self::from_file(file);
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay a parsed file on the defaults
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_file(file: ConfigFile) -> Self {
        let data_dir = data_dir();
        let defaults = PipelineSettings::default();

        let drawings = DrawingConfig {
            dataset_dir: file
                .drawings
                .dataset_dir
                .unwrap_or_else(|| data_dir.join("drawings")),
            label_map: file
                .drawings
                .label_map
                .unwrap_or_else(|| data_dir.join("label_mapping.json")),
            default_category: file
                .drawings
                .default_category
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            device: file.voice.device.unwrap_or(voice_defaults.device),
            sensitivity: file.voice.sensitivity.unwrap_or(voice_defaults.sensitivity),
            keywords: file.voice.keywords.unwrap_or(voice_defaults.keywords),
            recording_path: file.voice.recording_path,
            recording_limit: file
                .voice
                .recording_limit_secs
                .map_or(voice_defaults.recording_limit, Duration::from_secs),
        };

        let hw_defaults = HardwareConfig::default();
        let hardware = HardwareConfig {
            led: file.hardware.led,
            led_root: file.hardware.led_root.unwrap_or(hw_defaults.led_root),
            button_gpio: file.hardware.button_gpio,
            gpio_root: file.hardware.gpio_root.unwrap_or(hw_defaults.gpio_root),
            button_active_low: file
                .hardware
                .button_active_low
                .unwrap_or(hw_defaults.button_active_low),
        };

        let default_camera = file.camera.program.is_none();
        let camera = CameraConfig {
            skip_option: match file.camera.skip_option {
                Some(option) => Some(option).filter(|o| !o.is_empty()),
                None if default_camera => Some("-S".to_string()),
                None => None,
            },
            program: file.camera.program.unwrap_or_else(|| "fswebcam".to_string()),
            args: file.camera.args.unwrap_or_else(|| {
                ["-q", "--no-banner", "-r", "640x480", "--png", "0", "-"]
                    .map(String::from)
                    .to_vec()
            }),
            device: file
                .camera
                .device
                .or_else(|| Some(PathBuf::from("/dev/video0"))),
        };

        let detector = DetectorConfig {
            program: file
                .detector
                .program
                .unwrap_or_else(|| "sketchbooth-detect".to_string()),
            args: file.detector.args.unwrap_or_default(),
            labels: file
                .detector
                .labels
                .unwrap_or_else(|| data_dir.join("coco_labels.json")),
        };

        let capture = PipelineSettings {
            discard_frames: file.capture.discard_frames.unwrap_or(defaults.discard_frames),
            score_threshold: file.capture.score_threshold.unwrap_or(defaults.score_threshold),
            edge: EdgeSettings {
                low_threshold: file.capture.canny_low.unwrap_or(defaults.edge.low_threshold),
                high_threshold: file.capture.canny_high.unwrap_or(defaults.edge.high_threshold),
                dilation_iterations: file
                    .capture
                    .dilation_iterations
                    .unwrap_or(defaults.edge.dilation_iterations),
            },
            print_width: match file.capture.print_width {
                Some(0) => None,
                Some(width) => Some(width),
                None => defaults.print_width,
            },
            feed_lines: file.capture.feed_lines.unwrap_or(defaults.feed_lines),
        };

        let printer = match file.printer.kind.unwrap_or(PrinterKind::Command) {
            PrinterKind::Command => PrinterConfig::Command {
                program: file.printer.program.unwrap_or_else(|| "lp".to_string()),
                args: file.printer.args.unwrap_or_default(),
            },
            PrinterKind::Spool => PrinterConfig::Spool {
                dir: file
                    .printer
                    .spool_dir
                    .unwrap_or_else(|| data_dir.join("prints")),
            },
        };

        let poll_interval = file
            .orchestrator
            .poll_interval_ms
            .map_or(POLL_INTERVAL, Duration::from_millis);

        Self {
            drawings,
            voice,
            hardware,
            camera,
            detector,
            capture,
            printer,
            poll_interval,
        }
    }

    /// Apply `SKETCHBOOTH_*` overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an override can't be parsed
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SKETCHBOOTH_DATASET_DIR") {
            self.drawings.dataset_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("SKETCHBOOTH_LABEL_MAP") {
            self.drawings.label_map = PathBuf::from(path);
        }
        if let Some(device) = lookup("SKETCHBOOTH_AUDIO_DEVICE") {
            self.voice.device = device
                .parse()
                .map_err(|e| Error::Config(format!("SKETCHBOOTH_AUDIO_DEVICE: {e}")))?;
        }
        if let Some(sensitivity) = lookup("SKETCHBOOTH_SENSITIVITY") {
            self.voice.sensitivity = sensitivity.trim().parse().map_err(|_| {
                Error::Config(format!("SKETCHBOOTH_SENSITIVITY: not a number: {sensitivity}"))
            })?;
        }
        if let Some(led) = lookup("SKETCHBOOTH_LED") {
            self.hardware.led = Some(led).filter(|name| !name.is_empty());
        }
        Ok(())
    }

    /// Reject values no component can work with
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending value
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.voice.sensitivity) {
            return Err(Error::Config(format!(
                "sensitivity must be in [0, 1], got {}",
                self.voice.sensitivity
            )));
        }
        if self.voice.keywords.is_empty() {
            return Err(Error::Config("at least one keyword is required".to_string()));
        }
        if !(0.0..=1.0).contains(&self.capture.score_threshold) {
            return Err(Error::Config(format!(
                "score_threshold must be in [0, 1], got {}",
                self.capture.score_threshold
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.voice.recording_path.is_some() && self.voice.recording_limit.is_zero() {
            return Err(Error::Config("recording_limit_secs must be positive".to_string()));
        }
        if self.drawings.default_category.is_empty() {
            return Err(Error::Config("default_category must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

/// Data directory (`~/.local/share/sketchbooth` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "sketchbooth", "sketchbooth")
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerEvent;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.drawings.default_category, "scorpion");
        assert!(config.drawings.dataset_dir.ends_with("drawings"));
        assert!((config.voice.sensitivity - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.voice.keywords[0].event, TriggerEvent::PrintRequest);
        assert_eq!(config.voice.keywords[1].event, TriggerEvent::EdgePrintRequest);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.voice.recording_limit, RECORDING_LIMIT);
        assert_eq!(config.camera.skip_option.as_deref(), Some("-S"));
        assert_eq!(
            config.printer,
            PrinterConfig::Command {
                program: "lp".to_string(),
                args: Vec::new()
            }
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = file::parse_config(
            r#"
            [drawings]
            dataset_dir = "/srv/drawings"

            [capture]
            print_width = 0
            score_threshold = 0.3

            [printer]
            kind = "spool"
            spool_dir = "/tmp/prints"
            "#,
        )
        .unwrap();

        let config = Config::from_file(file);
        assert_eq!(config.drawings.dataset_dir, PathBuf::from("/srv/drawings"));
        assert_eq!(config.capture.print_width, None);
        assert!((config.capture.score_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(
            config.printer,
            PrinterConfig::Spool {
                dir: PathBuf::from("/tmp/prints")
            }
        );
    }

    #[test]
    fn test_camera_skip_option() {
        let custom = file::parse_config("[camera]\nprogram = \"snap\"").unwrap();
        assert_eq!(Config::from_file(custom).camera.skip_option, None);

        let custom =
            file::parse_config("[camera]\nprogram = \"snap\"\nskip_option = \"--skip\"").unwrap();
        assert_eq!(
            Config::from_file(custom).camera.skip_option.as_deref(),
            Some("--skip")
        );

        let disabled = file::parse_config("[camera]\nskip_option = \"\"").unwrap();
        assert_eq!(Config::from_file(disabled).camera.skip_option, None);
    }

    #[test]
    fn test_recording_limit() {
        let file = file::parse_config(
            "[voice]\nrecording_path = \"/tmp/session.wav\"\nrecording_limit_secs = 90",
        )
        .unwrap();
        let mut config = Config::from_file(file);
        assert_eq!(config.voice.recording_limit, Duration::from_secs(90));
        config.validate().unwrap();

        config.voice.recording_limit = Duration::ZERO;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = file::parse_config("[drawings]\ndataset_dir = \"/srv/drawings\"").unwrap();
        let mut config = Config::from_file(file);

        config
            .apply_env(env(&[
                ("SKETCHBOOTH_DATASET_DIR", "/data/quickdraw"),
                ("SKETCHBOOTH_AUDIO_DEVICE", "3"),
                ("SKETCHBOOTH_SENSITIVITY", "0.8"),
                ("SKETCHBOOTH_LED", "led1"),
            ]))
            .unwrap();

        assert_eq!(config.drawings.dataset_dir, PathBuf::from("/data/quickdraw"));
        assert_eq!(config.voice.device, DeviceSelector::Index(3));
        assert!((config.voice.sensitivity - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.hardware.led.as_deref(), Some("led1"));
    }

    #[test]
    fn test_bad_env_is_config_error() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("SKETCHBOOTH_SENSITIVITY", "loud")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = config.apply_env(env(&[("SKETCHBOOTH_AUDIO_DEVICE", "mic")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.voice.sensitivity = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.voice.keywords.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[voice\nsensitivity = ").unwrap();

        assert!(matches!(Config::load(Some(&path)), Err(Error::Config(_))));
    }
}
