//! Camera access
//!
//! A camera is opened for a single capture and released when the session
//! is dropped.

use std::path::PathBuf;
use std::process::Command;

use image::RgbImage;

use crate::{Error, Result};

/// Something that can be opened for a capture
pub trait Camera {
    /// Acquire the device
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the camera can't be opened
    fn open(&mut self) -> Result<Box<dyn CameraSession>>;
}

/// An open camera; dropping it releases the device
pub trait CameraSession {
    /// Discard a frame before the next read
    ///
    /// # Errors
    ///
    /// Returns error if the capture fails
    fn grab(&mut self) -> Result<()>;

    /// Capture a frame
    ///
    /// # Errors
    ///
    /// Returns error if the capture fails or can't be decoded
    fn read(&mut self) -> Result<RgbImage>;
}

/// Camera driven by a snapshot program that writes an encoded image to
/// stdout (e.g. `fswebcam -q --no-banner -`)
///
/// With a skip option, discarded frames are handed to the program as
/// `<option> N` and the capture runs as a single process. Without one, every
/// discarded frame is a separate snapshot.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    device: Option<PathBuf>,
    skip_option: Option<String>,
}

impl CommandCamera {
    /// Create a camera running `program args..`
    ///
    /// When `device` is set it must exist for the camera to open.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>, device: Option<PathBuf>) -> Self {
        Self {
            program,
            args,
            device,
            skip_option: None,
        }
    }

    /// Program option taking a number of frames to skip (`-S` for fswebcam)
    #[must_use]
    pub fn with_skip_option(mut self, option: Option<String>) -> Self {
        self.skip_option = option;
        self
    }
}

impl Camera for CommandCamera {
    fn open(&mut self) -> Result<Box<dyn CameraSession>> {
        if let Some(device) = &self.device {
            if !device.exists() {
                return Err(Error::DeviceUnavailable(format!(
                    "could not open video device {}",
                    device.display()
                )));
            }
        }

        let program = which::which(&self.program).map_err(|e| {
            Error::DeviceUnavailable(format!("camera program {}: {e}", self.program))
        })?;

        tracing::debug!(program = %program.display(), "camera opened");
        Ok(Box::new(CommandSession {
            program,
            args: self.args.clone(),
            skip_option: self.skip_option.clone(),
            skipped: 0,
            snapshots: 0,
        }))
    }
}

struct CommandSession {
    program: PathBuf,
    args: Vec<String>,
    skip_option: Option<String>,
    skipped: usize,
    snapshots: usize,
}

impl CommandSession {
    /// Arguments for the next snapshot, with pending skips folded in
    fn snapshot_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        if let (Some(option), 1..) = (&self.skip_option, self.skipped) {
            args.push(option.clone());
            args.push(self.skipped.to_string());
        }
        args.extend(self.args.iter().cloned());
        args
    }

    /// Run the program once
    ///
    /// A failure of the session's first run means the device could not be
    /// opened at all.
    fn snapshot(&mut self) -> Result<Vec<u8>> {
        let args = self.snapshot_args();
        let first = self.snapshots == 0;
        self.snapshots += 1;
        self.skipped = 0;

        let failed = |message: String| {
            if first {
                Error::DeviceUnavailable(message)
            } else {
                Error::Camera(message)
            }
        };

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| failed(format!("failed to run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Camera("camera returned no image data".to_string()));
        }

        Ok(output.stdout)
    }
}

impl CameraSession for CommandSession {
    fn grab(&mut self) -> Result<()> {
        if self.skip_option.is_some() {
            self.skipped += 1;
            return Ok(());
        }
        self.snapshot().map(drop)
    }

    fn read(&mut self) -> Result<RgbImage> {
        let bytes = self.snapshot()?;
        Ok(image::load_from_memory(&bytes)?.to_rgb8())
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        tracing::debug!("camera released");
    }
}
