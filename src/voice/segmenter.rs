//! Energy-based speech endpointing
//!
//! Decides when a phrase starts and ends in a stream of audio chunks.
//! A chunk whose RMS energy exceeds the calibrated threshold counts as speech.

use std::time::Duration;

/// Floor for the calibrated energy threshold
pub const MIN_ENERGY_THRESHOLD: f32 = 0.01;

/// Ambient energy is multiplied by this to get the speech threshold
const AMBIENT_MULTIPLIER: f32 = 1.5;

/// Trailing silence that ends a phrase
const PAUSE_DURATION: Duration = Duration::from_millis(800);

/// Bursts shorter than this are treated as noise
const MIN_SPEECH_DURATION: Duration = Duration::from_millis(300);

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech to start
    Waiting,
    /// Speech started, accumulating the phrase
    InPhrase,
}

/// Result of feeding a chunk
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// Keep feeding audio
    Pending,
    /// A phrase ended; holds every sample since speech started
    Complete(Vec<f32>),
    /// No speech started within the listen timeout
    TimedOut,
}

/// Splits one phrase out of an audio stream
#[derive(Debug)]
pub struct SpeechSegmenter {
    threshold: f32,
    timeout_samples: usize,
    phrase_limit_samples: usize,
    pause_samples: usize,
    min_speech_samples: usize,
    state: SegmenterState,
    waited: usize,
    silence: usize,
    buffer: Vec<f32>,
}

impl SpeechSegmenter {
    /// Create a segmenter for one listen
    #[must_use]
    pub fn new(
        threshold: f32,
        sample_rate: u32,
        listen_timeout: Duration,
        phrase_time_limit: Duration,
    ) -> Self {
        Self {
            threshold,
            timeout_samples: duration_to_samples(listen_timeout, sample_rate),
            phrase_limit_samples: duration_to_samples(phrase_time_limit, sample_rate).max(1),
            pause_samples: duration_to_samples(PAUSE_DURATION, sample_rate),
            min_speech_samples: duration_to_samples(MIN_SPEECH_DURATION, sample_rate),
            state: SegmenterState::Waiting,
            waited: 0,
            silence: 0,
            buffer: Vec::new(),
        }
    }

    /// Feed the next chunk of mono samples
    pub fn process(&mut self, samples: &[f32]) -> SegmentEvent {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmenterState::Waiting => {
                if is_speech {
                    self.state = SegmenterState::InPhrase;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence = 0;
                    tracing::trace!(energy, "speech started");
                    return self.check_phrase_limit();
                }

                self.waited += samples.len();
                if self.waited >= self.timeout_samples {
                    tracing::trace!(waited = self.waited, "listen timed out");
                    return SegmentEvent::TimedOut;
                }
            }
            SegmenterState::InPhrase => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence = 0;
                } else {
                    self.silence += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.buffer.len(),
                    silence = self.silence,
                    energy,
                    "in phrase"
                );

                if self.silence >= self.pause_samples {
                    let speech = self.buffer.len().saturating_sub(self.silence);
                    if speech >= self.min_speech_samples {
                        tracing::debug!(samples = self.buffer.len(), "phrase complete");
                        return SegmentEvent::Complete(self.take_buffer());
                    }

                    // Too short to be a phrase, keep waiting
                    tracing::trace!(speech, "discarding noise burst");
                    self.waited += self.buffer.len();
                    self.reset_phrase();
                    if self.waited >= self.timeout_samples {
                        return SegmentEvent::TimedOut;
                    }
                    return SegmentEvent::Pending;
                }

                return self.check_phrase_limit();
            }
        }

        SegmentEvent::Pending
    }

    fn check_phrase_limit(&mut self) -> SegmentEvent {
        if self.buffer.len() >= self.phrase_limit_samples {
            tracing::debug!(samples = self.buffer.len(), "phrase time limit reached");
            SegmentEvent::Complete(self.take_buffer())
        } else {
            SegmentEvent::Pending
        }
    }

    fn take_buffer(&mut self) -> Vec<f32> {
        self.state = SegmenterState::Waiting;
        self.silence = 0;
        std::mem::take(&mut self.buffer)
    }

    fn reset_phrase(&mut self) {
        self.state = SegmenterState::Waiting;
        self.buffer.clear();
        self.silence = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Energy threshold in use
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Derive a speech threshold from ambient-noise samples
#[must_use]
pub fn calibrate_threshold(ambient: &[f32]) -> f32 {
    (calculate_energy(ambient) * AMBIENT_MULTIPLIER).max(MIN_ENERGY_THRESHOLD)
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn duration_to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}
