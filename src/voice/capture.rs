//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};

use super::devices::{MicPreference, resolve_device};
use super::segmenter::{SegmentEvent, SpeechSegmenter, calibrate_threshold};
use crate::{Error, Result};

/// Preferred sample rate for capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// How often the listen loop drains the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extra time a listen may run before a silent stream is considered broken
const STALL_GRACE: Duration = Duration::from_secs(2);

/// One captured phrase
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
}

impl CapturedAudio {
    /// Length of the phrase
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let samples = self.samples.len() as f64;
        Duration::from_secs_f64(samples / f64::from(self.sample_rate))
    }

    /// Encode as 16-bit mono WAV
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }
}

/// Result of one listen
#[derive(Debug, Clone, PartialEq)]
pub enum ListenResult {
    /// No speech started before the listen timeout
    Timeout,
    /// A phrase was captured
    Audio(CapturedAudio),
}

/// A source of spoken phrases
///
/// Futures are not `Send`: cpal streams must stay on the thread that built them.
#[async_trait(?Send)]
pub trait MicrophoneSource {
    /// Measure ambient noise and set the speech threshold
    ///
    /// # Errors
    ///
    /// Returns error if the microphone cannot be read
    async fn calibrate(&mut self, duration: Duration) -> Result<f32>;

    /// Wait for one phrase
    ///
    /// `listen_timeout` bounds the wait for speech to start and
    /// `phrase_time_limit` bounds the phrase itself.
    ///
    /// # Errors
    ///
    /// Returns error if the audio stream fails
    async fn listen(
        &mut self,
        listen_timeout: Duration,
        phrase_time_limit: Duration,
    ) -> Result<ListenResult>;
}

/// Exclusive hold on an open input stream
///
/// Samples accumulate until taken; dropping the guard closes the stream.
pub struct MicrophoneGuard {
    stream: Stream,
    buffer: Arc<Mutex<Vec<f32>>>,
}

impl MicrophoneGuard {
    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Get captured audio buffer without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

impl Drop for MicrophoneGuard {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::trace!(error = %e, "failed to pause stream on release");
        }
        tracing::trace!("microphone released");
    }
}

/// Microphone backed by a cpal input device
pub struct CpalMicrophone {
    device: Device,
    name: String,
    config: StreamConfig,
    sample_format: SampleFormat,
    threshold: f32,
}

impl CpalMicrophone {
    /// Select and open a microphone
    ///
    /// The device is opened once to prove it works, then released until
    /// the first listen.
    ///
    /// # Errors
    ///
    /// Returns error if no device is available or the device cannot be opened
    pub fn open(preference: &MicPreference) -> Result<Self> {
        let (device, name) = resolve_device(preference)?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::MicrophoneOpen(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)));

        let supported_config = match supported_config {
            Some(c) => c,
            None => device
                .default_input_config()
                .map_err(|e| Error::MicrophoneOpen(e.to_string()))?,
        };

        let sample_format = supported_config.sample_format();
        let config = supported_config.config();

        tracing::debug!(
            device = %name,
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            "audio capture initialized"
        );

        let mic = Self {
            device,
            name,
            config,
            sample_format,
            threshold: super::segmenter::MIN_ENERGY_THRESHOLD,
        };

        drop(
            mic.acquire()
                .map_err(|e| Error::MicrophoneOpen(format!("{}: {e}", mic.name)))?,
        );

        Ok(mic)
    }

    /// Start capturing into a fresh buffer
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started
    pub fn acquire(&self) -> Result<MicrophoneGuard> {
        let buffer = Arc::new(Mutex::new(Vec::new()));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(Arc::clone(&buffer)),
            SampleFormat::I16 => self.build_stream::<i16>(Arc::clone(&buffer)),
            SampleFormat::U16 => self.build_stream::<u16>(Arc::clone(&buffer)),
            other => Err(Error::Audio(format!("unsupported sample format {other:?}"))),
        }?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        tracing::trace!("microphone acquired");

        Ok(MicrophoneGuard { stream, buffer })
    }

    fn build_stream<T>(&self, buffer: Arc<Mutex<Vec<f32>>>) -> Result<Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(self.config.channels.max(1));

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        // Downmix interleaved frames to mono
                        for frame in data.chunks(channels) {
                            let sum: f32 = frame.iter().map(|s| f32::from_sample_(*s)).sum();
                            #[allow(clippy::cast_precision_loss)]
                            let len = frame.len() as f32;
                            buf.push(sum / len);
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }

    /// Device name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Current speech threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[async_trait(?Send)]
impl MicrophoneSource for CpalMicrophone {
    async fn calibrate(&mut self, duration: Duration) -> Result<f32> {
        let guard = self.acquire()?;
        tokio::time::sleep(duration).await;
        let ambient = guard.take_buffer();
        drop(guard);

        self.threshold = calibrate_threshold(&ambient);
        tracing::info!(
            samples = ambient.len(),
            threshold = self.threshold,
            "ambient noise calibrated"
        );
        Ok(self.threshold)
    }

    async fn listen(
        &mut self,
        listen_timeout: Duration,
        phrase_time_limit: Duration,
    ) -> Result<ListenResult> {
        let guard = self.acquire()?;
        let sample_rate = self.sample_rate();
        let mut segmenter =
            SpeechSegmenter::new(self.threshold, sample_rate, listen_timeout, phrase_time_limit);

        let deadline = tokio::time::Instant::now() + listen_timeout + phrase_time_limit + STALL_GRACE;

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            let chunk = guard.take_buffer();
            if chunk.is_empty() {
                if tokio::time::Instant::now() >= deadline {
                    return Err(Error::Audio("microphone stopped delivering audio".to_string()));
                }
                continue;
            }

            match segmenter.process(&chunk) {
                SegmentEvent::Pending => {}
                SegmentEvent::TimedOut => return Ok(ListenResult::Timeout),
                SegmentEvent::Complete(samples) => {
                    return Ok(ListenResult::Audio(CapturedAudio {
                        samples,
                        sample_rate,
                    }));
                }
            }
        }
    }
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
