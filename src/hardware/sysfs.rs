//! Linux sysfs LED and GPIO button drivers

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::LedDriver;
use crate::{Error, Result};

/// Default LED class directory
pub const LED_ROOT: &str = "/sys/class/leds";

/// Default GPIO class directory
pub const GPIO_ROOT: &str = "/sys/class/gpio";

/// Button sampling period
const BUTTON_POLL: Duration = Duration::from_millis(20);

/// Duration of each half of the pulse fade, in milliseconds
const PULSE_FADE_MS: u32 = 1000;

/// LED exposed through `/sys/class/leds/<name>`
#[derive(Debug)]
pub struct SysfsLed {
    dir: PathBuf,
    max_brightness: u32,
}

impl SysfsLed {
    /// Probe for an LED named `name` under `root`
    ///
    /// Returns `None` when the LED isn't present on this machine.
    #[must_use]
    pub fn probe(root: &Path, name: &str) -> Option<Self> {
        let dir = root.join(name);
        if !dir.join("brightness").is_file() {
            return None;
        }

        let max_brightness = std::fs::read_to_string(dir.join("max_brightness"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1);

        Some(Self {
            dir,
            max_brightness,
        })
    }

    fn write(&self, attribute: &str, value: &str) {
        let path = self.dir.join(attribute);
        if let Err(e) = std::fs::write(&path, value) {
            tracing::warn!(path = %path.display(), error = %e, "led write failed");
        }
    }
}

impl LedDriver for SysfsLed {
    fn on(&mut self) {
        self.write("trigger", "none");
        self.write("brightness", &self.max_brightness.to_string());
    }

    fn off(&mut self) {
        self.write("trigger", "none");
        self.write("brightness", "0");
    }

    fn pulse(&mut self) {
        // ledtrig-pattern interpolates linearly between (brightness, ms) pairs
        self.write("trigger", "pattern");
        self.write(
            "pattern",
            &format!(
                "0 {PULSE_FADE_MS} {max} {PULSE_FADE_MS}",
                max = self.max_brightness
            ),
        );
    }

    fn blink(&mut self, on: Duration, off: Duration) {
        self.write("trigger", "timer");
        self.write("delay_on", &on.as_millis().to_string());
        self.write("delay_off", &off.as_millis().to_string());
    }
}

/// Background thread watching a GPIO input for presses
pub struct ButtonWatcher {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ButtonWatcher {
    /// Path of the value file for GPIO `pin` under `root`
    #[must_use]
    pub fn value_path(root: &Path, pin: u32) -> PathBuf {
        root.join(format!("gpio{pin}")).join("value")
    }

    /// Start watching `value_path`, invoking `on_press` on every press
    ///
    /// `on_press` runs on the watcher thread and must not block.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the value file doesn't exist or the
    /// thread can't be spawned
    pub fn spawn(
        value_path: PathBuf,
        active_low: bool,
        on_press: Arc<dyn Fn() + Send + Sync>,
    ) -> Result<Self> {
        if !value_path.is_file() {
            return Err(Error::DeviceUnavailable(format!(
                "button gpio {} not exported",
                value_path.display()
            )));
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("button-watcher".to_string())
            .spawn(move || {
                let mut was_pressed = is_pressed(&value_path, active_low);
                while flag.load(Ordering::SeqCst) {
                    let pressed = is_pressed(&value_path, active_low);
                    if pressed && !was_pressed {
                        tracing::debug!("button pressed");
                        on_press();
                    }
                    was_pressed = pressed;
                    std::thread::sleep(BUTTON_POLL);
                }
            })
            .map_err(|e| Error::DeviceUnavailable(format!("button watcher: {e}")))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the watcher thread and wait for it to exit
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("button watcher panicked");
            }
        }
    }
}

impl Drop for ButtonWatcher {
    fn drop(&mut self) {
        self.join();
    }
}

fn is_pressed(path: &Path, active_low: bool) -> bool {
    match std::fs::read_to_string(path) {
        Ok(value) => (value.trim() == "1") != active_low,
        Err(e) => {
            tracing::trace!(error = %e, "button read failed");
            false
        }
    }
}
