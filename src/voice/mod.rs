//! Voice trigger
//!
//! Audio capture, keyword classification and the monitor that turns
//! detected keywords into trigger flags.

mod capture;
mod classifier;
mod monitor;
mod recording;

pub use capture::{CpalStream, DeviceSelector, InputDeviceInfo, list_input_devices, open_input_stream};
pub use classifier::{DetectorState, EnergyKeywordClassifier, FRAME_LENGTH, SAMPLE_RATE};
pub use monitor::{AudioStream, FrameProcessor, KeywordBinding, WakeWordMonitor};
pub use recording::write_wav;

use crate::Result;

/// A keyword spotting engine
///
/// Implementations are driven from the audio callback thread and must
/// return within one frame period.
pub trait KeywordClassifier: Send {
    /// Sample rate the engine requires
    fn sample_rate(&self) -> u32;

    /// Number of samples per frame
    fn frame_length(&self) -> usize;

    /// Number of keywords the engine was configured with
    fn keyword_count(&self) -> usize;

    /// Classify one frame, returning the index of a detected keyword
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails on this frame
    fn process(&mut self, frame: &[i16]) -> Result<Option<usize>>;
}
