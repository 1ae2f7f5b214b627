//! Shared test utilities
//!
//! Deterministic stand-ins for the microphone, the transcription service
//! and the light.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use voice_light::config::Config;
use voice_light::voice::{
    CapturedAudio, ListenResult, MicrophoneSource, SAMPLE_RATE, TranscribeResult, Transcriber,
};
use voice_light::{Error, LightActuator, LightState, Result};

/// Generate sine wave audio samples
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Configuration with test-friendly defaults
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.light.on_url = "http://light.test/on".to_string();
    config.light.off_url = "http://light.test/off".to_string();
    config
}

/// One scripted microphone listen
#[derive(Debug, Clone, Copy)]
pub enum MicStep {
    /// Nobody spoke
    Silence,
    /// A phrase was captured
    Speech,
    /// The audio stream broke
    Fail,
}

/// Microphone replaying a script, then reporting silence
///
/// When the script runs out it fires the optional shutdown sender so a
/// running loop stops.
pub struct FakeMicrophone {
    script: VecDeque<MicStep>,
    listens: Arc<Mutex<usize>>,
    shutdown_when_done: Option<mpsc::Sender<()>>,
    fail_calibration: bool,
}

impl FakeMicrophone {
    pub fn new(script: impl IntoIterator<Item = MicStep>) -> Self {
        Self {
            script: script.into_iter().collect(),
            listens: Arc::new(Mutex::new(0)),
            shutdown_when_done: None,
            fail_calibration: false,
        }
    }

    /// Speech on every listen, `count` times
    pub fn speaking(count: usize) -> Self {
        Self::new(std::iter::repeat_n(MicStep::Speech, count))
    }

    pub fn shutdown_when_done(mut self, tx: mpsc::Sender<()>) -> Self {
        self.shutdown_when_done = Some(tx);
        self
    }

    pub const fn failing_calibration(mut self) -> Self {
        self.fail_calibration = true;
        self
    }

    /// Shared counter of listen calls
    pub fn listens(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.listens)
    }
}

#[async_trait(?Send)]
impl MicrophoneSource for FakeMicrophone {
    async fn calibrate(&mut self, _duration: Duration) -> Result<f32> {
        if self.fail_calibration {
            return Err(Error::MicrophoneOpen("device busy".to_string()));
        }
        Ok(0.02)
    }

    async fn listen(
        &mut self,
        _listen_timeout: Duration,
        _phrase_time_limit: Duration,
    ) -> Result<ListenResult> {
        *self.listens.lock().unwrap() += 1;

        let Some(step) = self.script.pop_front() else {
            if let Some(tx) = self.shutdown_when_done.take() {
                let _ = tx.try_send(());
            }
            return Ok(ListenResult::Timeout);
        };

        match step {
            MicStep::Silence => Ok(ListenResult::Timeout),
            MicStep::Speech => Ok(ListenResult::Audio(CapturedAudio {
                samples: generate_sine_samples(440.0, 0.5, 0.3),
                sample_rate: SAMPLE_RATE,
            })),
            MicStep::Fail => Err(Error::Audio("stream closed".to_string())),
        }
    }
}

/// Transcriber replaying scripted results
pub struct FakeTranscriber {
    script: Mutex<VecDeque<TranscribeResult>>,
}

impl FakeTranscriber {
    pub fn new(script: impl IntoIterator<Item = TranscribeResult>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// Every phrase transcribes to the given texts, in order
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| TranscribeResult::Text((*t).to_string())),
        )
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &CapturedAudio) -> TranscribeResult {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TranscribeResult::Unintelligible)
    }
}

/// Light recording every request
#[derive(Clone, Default)]
pub struct FakeLight {
    calls: Arc<Mutex<Vec<LightState>>>,
    completed: Arc<Mutex<usize>>,
    unreachable: bool,
    delay: Option<Duration>,
}

impl FakeLight {
    pub fn new() -> Self {
        Self::default()
    }

    /// A light whose every request fails
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// A light that takes `delay` to answer
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<LightState> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests that ran to the end
    pub fn completed(&self) -> usize {
        *self.completed.lock().unwrap()
    }
}

#[async_trait]
impl LightActuator for FakeLight {
    async fn set(&self, state: LightState) -> Result<u16> {
        self.calls.lock().unwrap().push(state);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *self.completed.lock().unwrap() += 1;
        if self.unreachable {
            return Err(Error::Actuator("connection refused".to_string()));
        }
        Ok(200)
    }
}
