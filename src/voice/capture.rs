//! Audio input from the microphone

use std::fmt;
use std::str::FromStr;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleRate, Stream, StreamConfig};
use serde::Deserialize;

use super::{AudioStream, FrameProcessor};
use crate::{Error, Result};

/// Which input device to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DeviceSelector {
    /// Host default input
    Default,
    /// Device at this position in the host's input list
    Index(usize),
    /// First USB input, falling back to the default
    #[default]
    Auto,
}

impl FromStr for DeviceSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "auto" | "usb" => Ok(Self::Auto),
            other => other.parse().map(Self::Index).map_err(|_| {
                Error::Config(format!(
                    "audio device must be \"default\", \"auto\" or an index, got {s:?}"
                ))
            }),
        }
    }
}

impl TryFrom<String> for DeviceSelector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Index(i) => write!(f, "{i}"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Summary of an input device
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    /// Position in the host's input list
    pub index: usize,
    /// Device name
    pub name: String,
    /// Default sample rate, if the device reports one
    pub default_sample_rate: Option<u32>,
    /// Default channel count, if the device reports one
    pub channels: Option<u16>,
}

impl InputDeviceInfo {
    /// Whether auto-selection treats this as a USB microphone
    #[must_use]
    pub fn is_usb(&self) -> bool {
        is_usb_name(&self.name)
    }
}

fn is_usb_name(name: &str) -> bool {
    name.to_lowercase().contains("usb")
}

/// List input devices on the default host
///
/// # Errors
///
/// Returns error if the host cannot enumerate devices
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let default_config = device.default_input_config().ok();
            InputDeviceInfo {
                index,
                name: device.name().unwrap_or_default(),
                default_sample_rate: default_config.as_ref().map(|c| c.sample_rate().0),
                channels: default_config.as_ref().map(cpal::SupportedStreamConfig::channels),
            }
        })
        .collect())
}

fn select_device(host: &Host, selector: DeviceSelector) -> Result<Device> {
    let default = || {
        host.default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))
    };

    match selector {
        DeviceSelector::Default => default(),
        DeviceSelector::Index(index) => host
            .input_devices()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .nth(index)
            .ok_or_else(|| Error::DeviceUnavailable(format!("no input device at index {index}"))),
        DeviceSelector::Auto => {
            let usb = host
                .input_devices()
                .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
                .find(|d| d.name().is_ok_and(|name| is_usb_name(&name)));

            if let Some(device) = usb {
                tracing::info!(device = device.name().unwrap_or_default(), "located usb input device");
                Ok(device)
            } else {
                tracing::info!("no usb input device found, using default");
                default()
            }
        }
    }
}

fn stream_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports_rate =
        |c: &cpal::SupportedStreamConfigRange| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate;

    let supported = device
        .supported_input_configs()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
        .find(|c| c.channels() == 1 && supports_rate(c))
        .or_else(|| {
            // Fallback: multi-channel, first channel is used
            device
                .supported_input_configs()
                .ok()?
                .find(|c| supports_rate(c))
        })
        .ok_or_else(|| {
            Error::DeviceUnavailable(format!("no input config supports {sample_rate} Hz"))
        })?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Live cpal input stream
pub struct CpalStream {
    stream: Option<Stream>,
}

impl AudioStream for CpalStream {
    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!(error = %e, "failed to pause input stream");
            }
            drop(stream);
        }
    }
}

/// Open `selector` at `sample_rate` and feed its samples to `processor`
///
/// # Errors
///
/// Returns `DeviceUnavailable` if the device or a matching stream can't be
/// opened
pub fn open_input_stream(
    selector: &DeviceSelector,
    sample_rate: u32,
    mut processor: FrameProcessor,
) -> Result<Box<dyn AudioStream>> {
    let host = cpal::default_host();
    let device = select_device(&host, *selector)?;
    let config = stream_config(&device, sample_rate)?;
    let channels = usize::from(config.channels.max(1));

    let mut scratch: Vec<i16> = Vec::with_capacity(processor.frame_length() * 2);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().step_by(channels).map(|&s| to_i16(s)));
                processor.push(&scratch);
            },
            |err| {
                tracing::error!(error = %err, "audio input error");
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    stream
        .play()
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio input started"
    );

    Ok(Box::new(CpalStream {
        stream: Some(stream),
    }))
}

/// Convert f32 [-1.0, 1.0] to i16
#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
