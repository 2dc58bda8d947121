//! Status LED and manual trigger button
//!
//! The LED driver is picked once, at construction: a sysfs LED when the
//! configured one exists, otherwise a driver that ignores every call.

mod sysfs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use sysfs::{ButtonWatcher, GPIO_ROOT, LED_ROOT, SysfsLed};

/// Fast blink timing (on, off)
pub const FAST_BLINK: (Duration, Duration) = (Duration::from_millis(100), Duration::from_millis(400));

/// Default blink timing (on, off)
pub const SLOW_BLINK: (Duration, Duration) = (Duration::from_secs(1), Duration::from_secs(1));

/// Fire-and-forget LED control
pub trait LedDriver: Send {
    /// Solid on
    fn on(&mut self);
    /// Off
    fn off(&mut self);
    /// Repeating fade in/out
    fn pulse(&mut self);
    /// Repeating on/off
    fn blink(&mut self, on: Duration, off: Duration);
}

/// Driver for machines without an indicator
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLed;

impl LedDriver for NullLed {
    fn on(&mut self) {}
    fn off(&mut self) {}
    fn pulse(&mut self) {}
    fn blink(&mut self, _on: Duration, _off: Duration) {}
}

/// Hardware settings
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    /// LED name under `led_root` (e.g. "led0")
    pub led: Option<String>,
    /// LED class directory
    pub led_root: PathBuf,
    /// GPIO pin of the manual trigger button
    pub button_gpio: Option<u32>,
    /// GPIO class directory
    pub gpio_root: PathBuf,
    /// Button reads 0 when pressed
    pub button_active_low: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            led: None,
            led_root: PathBuf::from(LED_ROOT),
            button_gpio: None,
            gpio_root: PathBuf::from(GPIO_ROOT),
            button_active_low: false,
        }
    }
}

/// LED indicator plus optional button, released exactly once
pub struct Indicator {
    led: Option<Box<dyn LedDriver>>,
    button: Option<ButtonWatcher>,
}

impl Indicator {
    /// Probe the platform and build the indicator
    ///
    /// `on_press` is called from the button thread on every press; it must
    /// only record the request.
    pub fn detect<F>(config: &HardwareConfig, on_press: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let host = hostname::get()
            .map_or_else(|_| "unknown".to_string(), |h| h.to_string_lossy().to_string());

        let led: Box<dyn LedDriver> = match config
            .led
            .as_deref()
            .and_then(|name| SysfsLed::probe(&config.led_root, name))
        {
            Some(led) => {
                tracing::info!(host, led = ?config.led, "status led available");
                Box::new(led)
            }
            None => {
                tracing::info!(host, "no status led, indicator disabled");
                Box::new(NullLed)
            }
        };

        let button = config.button_gpio.and_then(|pin| {
            let path = ButtonWatcher::value_path(&config.gpio_root, pin);
            match ButtonWatcher::spawn(path, config.button_active_low, Arc::new(on_press)) {
                Ok(watcher) => {
                    tracing::info!(pin, "button watcher started");
                    Some(watcher)
                }
                Err(e) => {
                    tracing::warn!(pin, error = %e, "button unavailable");
                    None
                }
            }
        });

        Self {
            led: Some(led),
            button,
        }
    }

    /// Build an indicator around an explicit driver, without a button
    #[must_use]
    pub fn with_driver(led: Box<dyn LedDriver>) -> Self {
        Self {
            led: Some(led),
            button: None,
        }
    }

    /// Whether a button watcher is running
    #[must_use]
    pub const fn has_button(&self) -> bool {
        self.button.is_some()
    }

    /// Solid on
    pub fn on(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.on();
        }
    }

    /// Off
    pub fn off(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.off();
        }
    }

    /// Repeating fade
    pub fn pulse(&mut self) {
        if let Some(led) = self.led.as_mut() {
            led.pulse();
        }
    }

    /// Repeating on/off
    pub fn blink(&mut self, on: Duration, off: Duration) {
        if let Some(led) = self.led.as_mut() {
            led.blink(on, off);
        }
    }

    /// Short flashes
    pub fn blink_fast(&mut self) {
        let (on, off) = FAST_BLINK;
        self.blink(on, off);
    }

    /// Stop the button, turn the LED off and release it
    ///
    /// Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if let Some(button) = self.button.take() {
            button.stop();
        }
        if let Some(mut led) = self.led.take() {
            led.off();
            drop(led);
            tracing::debug!("indicator released");
        }
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
