//! Wake word monitor
//!
//! The audio callback re-chunks samples into classifier frames and raises a
//! trigger flag whenever a keyword is spotted. Nothing on that path touches
//! disk or the printer.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;

use super::{KeywordClassifier, open_input_stream, write_wav};
use crate::config::VoiceConfig;
use crate::trigger::{TriggerEvent, TriggerFlags};
use crate::{Error, Result};

/// A configured keyword and the request it raises
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeywordBinding {
    /// Spoken phrase
    pub phrase: String,
    /// Request raised on detection
    pub event: TriggerEvent,
}

/// An open input stream that can be shut down
pub trait AudioStream {
    /// Stop delivering callbacks and release the device
    fn close(&mut self);
}

struct MonitorShared {
    accepting: AtomicBool,
    classifier: Mutex<Option<Box<dyn KeywordClassifier>>>,
    events: Vec<TriggerEvent>,
    phrases: Vec<String>,
    flags: Arc<TriggerFlags>,
    recording: Option<Mutex<Recording>>,
}

/// Session audio, capped at `limit` samples
struct Recording {
    samples: Vec<i16>,
    limit: usize,
    truncated: bool,
}

impl Recording {
    fn new(limit: Duration, sample_rate: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let limit = (u128::from(sample_rate) * limit.as_millis() / 1000) as usize;
        Self {
            samples: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn append(&mut self, frame: &[i16]) {
        let room = self.limit.saturating_sub(self.samples.len());
        if frame.len() > room && !self.truncated {
            self.truncated = true;
            tracing::warn!(
                samples = self.limit,
                "session recording reached its limit, later audio is not kept"
            );
        }
        self.samples.extend_from_slice(&frame[..frame.len().min(room)]);
    }
}

/// Callback-side half of the monitor
///
/// Owned by the audio stream; feeds whole frames to the classifier.
pub struct FrameProcessor {
    shared: Arc<MonitorShared>,
    pending: Vec<i16>,
    frame_length: usize,
}

impl FrameProcessor {
    /// Accept raw mono samples from the audio device
    pub fn push(&mut self, samples: &[i16]) {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return;
        }

        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_length {
            process_frame(&self.shared, &self.pending[..self.frame_length]);
            self.pending.drain(..self.frame_length);
        }
    }

    /// Samples per classifier frame
    #[must_use]
    pub const fn frame_length(&self) -> usize {
        self.frame_length
    }
}

fn process_frame(shared: &MonitorShared, frame: &[i16]) {
    let result = {
        let mut guard = lock(&shared.classifier);
        let Some(classifier) = guard.as_mut() else {
            return;
        };
        std::panic::catch_unwind(AssertUnwindSafe(|| classifier.process(frame)))
    };

    match result {
        Ok(Ok(Some(index))) => match shared.events.get(index) {
            Some(&event) => {
                shared.flags.raise(event);
                tracing::info!(
                    keyword = %shared.phrases[index],
                    index,
                    %event,
                    "keyword detected"
                );
            }
            None => tracing::warn!(index, "classifier reported unknown keyword"),
        },
        Ok(Ok(None)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "keyword classification failed"),
        Err(_) => tracing::error!("keyword classifier panicked"),
    }

    if let Some(recording) = &shared.recording {
        lock(recording).append(frame);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Owns the input stream and the classifier
pub struct WakeWordMonitor {
    shared: Arc<MonitorShared>,
    stream: Option<Box<dyn AudioStream>>,
    recording_path: Option<PathBuf>,
    sample_rate: u32,
    stopped: bool,
}

impl WakeWordMonitor {
    /// Open the configured input device and start listening
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid keywords or sensitivity and
    /// `DeviceUnavailable` if no input stream can be opened
    pub fn start(
        config: &VoiceConfig,
        classifier: Box<dyn KeywordClassifier>,
        flags: Arc<TriggerFlags>,
    ) -> Result<Self> {
        Self::start_with(config, classifier, flags, |sample_rate, processor| {
            open_input_stream(&config.device, sample_rate, processor)
        })
    }

    /// Start listening on a stream built by `open`
    ///
    /// `open` receives the sample rate the classifier requires and the
    /// processor the stream callback must feed.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid keywords or sensitivity, or
    /// whatever `open` fails with
    pub fn start_with<F>(
        config: &VoiceConfig,
        classifier: Box<dyn KeywordClassifier>,
        flags: Arc<TriggerFlags>,
        open: F,
    ) -> Result<Self>
    where
        F: FnOnce(u32, FrameProcessor) -> Result<Box<dyn AudioStream>>,
    {
        if !(0.0..=1.0).contains(&config.sensitivity) {
            return Err(Error::Config(format!(
                "sensitivity {} outside [0, 1]",
                config.sensitivity
            )));
        }
        if config.keywords.is_empty() {
            return Err(Error::Config("no keywords configured".to_string()));
        }
        if config.keywords.len() > classifier.keyword_count() {
            return Err(Error::Config(format!(
                "{} keywords configured but classifier supports {}",
                config.keywords.len(),
                classifier.keyword_count()
            )));
        }

        let sample_rate = classifier.sample_rate();
        let frame_length = classifier.frame_length();
        if frame_length == 0 {
            return Err(Error::Config("classifier frame length is zero".to_string()));
        }

        let shared = Arc::new(MonitorShared {
            accepting: AtomicBool::new(true),
            classifier: Mutex::new(Some(classifier)),
            events: config.keywords.iter().map(|k| k.event).collect(),
            phrases: config.keywords.iter().map(|k| k.phrase.clone()).collect(),
            flags,
            recording: config
                .recording_path
                .as_ref()
                .map(|_| Mutex::new(Recording::new(config.recording_limit, sample_rate))),
        });

        let processor = FrameProcessor {
            shared: Arc::clone(&shared),
            pending: Vec::with_capacity(frame_length * 2),
            frame_length,
        };

        let stream = open(sample_rate, processor)?;

        tracing::info!(
            device = %config.device,
            sample_rate,
            frame_length,
            keywords = ?shared.phrases,
            recording = ?config.recording_path,
            "listening for keywords"
        );

        Ok(Self {
            shared,
            stream: Some(stream),
            recording_path: config.recording_path.clone(),
            sample_rate,
            stopped: false,
        })
    }

    /// Whether the monitor is still listening
    #[must_use]
    pub const fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Sample rate of the input stream
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Tear down the stream, then the classifier, then flush the recording
    ///
    /// Later calls are no-ops.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.shared.accepting.store(false, Ordering::SeqCst);

        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!("audio stream closed");
        }

        // Taking the lock waits out any callback still inside the classifier
        let classifier = lock(&self.shared.classifier).take();
        if classifier.is_some() {
            drop(classifier);
            tracing::debug!("keyword classifier released");
        }

        self.flush_recording();
    }

    fn flush_recording(&self) {
        let (Some(path), Some(recording)) = (&self.recording_path, &self.shared.recording) else {
            return;
        };

        let samples = std::mem::take(&mut lock(recording).samples);
        if samples.is_empty() {
            return;
        }

        match write_wav(path, &samples, self.sample_rate) {
            Ok(()) => tracing::info!(
                path = %path.display(),
                samples = samples.len(),
                "session recording saved"
            ),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to save recording"),
        }
    }
}

impl Drop for WakeWordMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
