//! Built-in keyword classifier
//!
//! Counts short bursts of sound (spoken syllables, claps, knocks) separated
//! by brief pauses. Once the utterance ends in silence, `N` bursts report
//! keyword index `N - 1`.

use super::KeywordClassifier;
use crate::{Error, Result};

/// Sample rate the classifier expects
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per frame (32 ms at 16 kHz)
pub const FRAME_LENGTH: usize = 512;

/// Energy gate at sensitivity 0; sensitivity 0.5 gives 0.03
const MAX_ENERGY_THRESHOLD: f32 = 0.06;

/// Energy gate floor at sensitivity 1
const MIN_ENERGY_THRESHOLD: f32 = 0.005;

/// Minimum sound needed to count as a burst (0.1 s)
const MIN_BURST_SAMPLES: usize = 1600;

/// Sound longer than this is talking or noise, not a trigger (1.5 s)
const MAX_BURST_SAMPLES: usize = 24000;

/// Silence that ends an utterance (0.5 s)
const SILENCE_SAMPLES: usize = 8000;

/// State of the burst counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for sound
    Idle,
    /// Inside a burst
    Burst,
    /// Between bursts, waiting for more sound or the end of the utterance
    Gap,
    /// Sound went on too long, waiting for it to stop
    Sustained,
}

/// Energy-gated burst counter
#[derive(Debug)]
pub struct EnergyKeywordClassifier {
    keyword_count: usize,
    threshold: f32,
    state: DetectorState,
    bursts: usize,
    burst_samples: usize,
    silence_samples: usize,
}

impl EnergyKeywordClassifier {
    /// Create a classifier for `keyword_count` keywords
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `sensitivity` is outside `[0, 1]` or
    /// no keywords are configured
    pub fn new(keyword_count: usize, sensitivity: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(Error::Config(format!(
                "sensitivity {sensitivity} outside [0, 1]"
            )));
        }
        if keyword_count == 0 {
            return Err(Error::Config("at least one keyword is required".to_string()));
        }

        let threshold = (MAX_ENERGY_THRESHOLD * (1.0 - sensitivity)).max(MIN_ENERGY_THRESHOLD);
        tracing::debug!(keyword_count, sensitivity, threshold, "energy classifier initialized");

        Ok(Self {
            keyword_count,
            threshold,
            state: DetectorState::Idle,
            bursts: 0,
            burst_samples: 0,
            silence_samples: 0,
        })
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Energy gate in normalized RMS units
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Forget any partial utterance
    pub const fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.bursts = 0;
        self.burst_samples = 0;
        self.silence_samples = 0;
    }

    fn end_burst(&mut self) {
        if self.burst_samples >= MIN_BURST_SAMPLES {
            self.bursts += 1;
        }
        self.burst_samples = 0;
        self.state = if self.bursts == 0 {
            DetectorState::Idle
        } else {
            DetectorState::Gap
        };
    }
}

impl KeywordClassifier for EnergyKeywordClassifier {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn frame_length(&self) -> usize {
        FRAME_LENGTH
    }

    fn keyword_count(&self) -> usize {
        self.keyword_count
    }

    fn process(&mut self, frame: &[i16]) -> Result<Option<usize>> {
        let is_sound = calculate_energy(frame) > self.threshold;

        match self.state {
            DetectorState::Idle => {
                if is_sound {
                    self.state = DetectorState::Burst;
                    self.burst_samples = frame.len();
                    self.silence_samples = 0;
                }
            }
            DetectorState::Burst => {
                if is_sound {
                    self.burst_samples += frame.len();
                    if self.burst_samples > MAX_BURST_SAMPLES {
                        tracing::trace!("sustained sound, discarding utterance");
                        self.reset();
                        self.state = DetectorState::Sustained;
                    }
                } else {
                    self.end_burst();
                    self.silence_samples = frame.len();
                }
            }
            DetectorState::Gap => {
                if is_sound {
                    self.state = DetectorState::Burst;
                    self.burst_samples = frame.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += frame.len();
                    if self.silence_samples >= SILENCE_SAMPLES {
                        let bursts = self.bursts;
                        self.reset();
                        tracing::trace!(bursts, "utterance complete");
                        if bursts <= self.keyword_count {
                            return Ok(Some(bursts - 1));
                        }
                    }
                }
            }
            DetectorState::Sustained => {
                if !is_sound {
                    self.reset();
                }
            }
        }

        Ok(None)
    }
}

/// RMS energy of 16-bit samples, normalized to [0, 1]
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    fn tone(secs: f32) -> Vec<i16> {
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 32767.0) as i16
            })
            .collect()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    fn silence(secs: f32) -> Vec<i16> {
        vec![0; (SAMPLE_RATE as f32 * secs) as usize]
    }

    fn feed(classifier: &mut EnergyKeywordClassifier, samples: &[i16]) -> Vec<usize> {
        samples
            .chunks_exact(FRAME_LENGTH)
            .filter_map(|frame| classifier.process(frame).unwrap())
            .collect()
    }

    #[test]
    fn test_energy_calculation() {
        assert!(calculate_energy(&[0; 100]) < 0.001);
        assert!(calculate_energy(&[16384; 100]) > 0.4);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_sensitivity_range() {
        assert!(EnergyKeywordClassifier::new(1, -0.1).is_err());
        assert!(EnergyKeywordClassifier::new(1, 1.5).is_err());
        assert!(EnergyKeywordClassifier::new(1, f32::NAN).is_err());
        assert!(EnergyKeywordClassifier::new(0, 0.5).is_err());

        let low = EnergyKeywordClassifier::new(1, 0.0).unwrap();
        let high = EnergyKeywordClassifier::new(1, 1.0).unwrap();
        assert!(high.threshold() < low.threshold());
    }

    #[test]
    fn test_single_burst_is_first_keyword() {
        let mut classifier = EnergyKeywordClassifier::new(2, 0.5).unwrap();

        let mut audio = tone(0.3);
        audio.extend(silence(0.6));

        assert_eq!(feed(&mut classifier, &audio), vec![0]);
        assert_eq!(classifier.state(), DetectorState::Idle);
    }

    #[test]
    fn test_two_bursts_is_second_keyword() {
        let mut classifier = EnergyKeywordClassifier::new(2, 0.5).unwrap();

        let mut audio = tone(0.3);
        audio.extend(silence(0.2));
        audio.extend(tone(0.3));
        audio.extend(silence(0.6));

        assert_eq!(feed(&mut classifier, &audio), vec![1]);
    }

    #[test]
    fn test_too_many_bursts_ignored() {
        let mut classifier = EnergyKeywordClassifier::new(1, 0.5).unwrap();

        let mut audio = tone(0.3);
        audio.extend(silence(0.2));
        audio.extend(tone(0.3));
        audio.extend(silence(0.6));

        assert!(feed(&mut classifier, &audio).is_empty());
    }

    #[test]
    fn test_sustained_sound_ignored() {
        let mut classifier = EnergyKeywordClassifier::new(1, 0.5).unwrap();

        let mut audio = tone(3.0);
        audio.extend(silence(0.6));

        assert!(feed(&mut classifier, &audio).is_empty());
    }

    #[test]
    fn test_blip_is_not_a_burst() {
        let mut classifier = EnergyKeywordClassifier::new(1, 0.5).unwrap();

        let mut audio = silence(0.1);
        audio.extend(tone(0.04));
        audio.extend(silence(0.6));

        assert!(feed(&mut classifier, &audio).is_empty());
        assert_eq!(classifier.state(), DetectorState::Idle);
    }
}
