//! Command loops
//!
//! The voice loop listens, transcribes, looks for the wake word and an
//! on/off directive, and switches the light, with a cooldown between
//! accepted triggers. The text loop does the same from typed lines.
//!
//! ```text
//! IDLE ──▶ LISTENING ──┬─▶ TIMEOUT ──────────────┐
//!                      ├─▶ TRANSCRIBED ─▶ decide ┼─▶ IDLE
//!                      └─▶ ERROR ─▶ backoff ─────┘
//! IDLE ──(Ctrl+C)──▶ SHUTDOWN
//! ```

use std::io::Write as _;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::actuator::LightActuator;
use crate::command::{Decision, LightState, TextCommand, decide, normalize, parse_text_command};
use crate::config::{Config, ListenConfig};
use crate::voice::{ListenResult, MicrophoneSource, TranscribeResult, Transcriber};
use crate::Result;

/// What happened in one voice cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nobody spoke before the listen timeout
    Timeout,
    /// Speech was captured but not recognized
    Unintelligible,
    /// The transcription service failed
    TranscriptionFailed,
    /// Transcript without the wake word
    NoWakeWord,
    /// Wake word heard inside the cooldown window
    CooledDown,
    /// Wake word heard without "on" or "off"
    NoCommand,
    /// The light was asked to change state
    Triggered(LightState),
}

impl CycleOutcome {
    /// Whether a phrase reached the recognizer this cycle
    #[must_use]
    pub const fn heard_speech(self) -> bool {
        !matches!(self, Self::Timeout)
    }
}

/// Suppresses triggers that follow too closely on the previous one
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    /// Create a debouncer with the given cooldown window
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether `now` falls inside the window after the last trigger
    #[must_use]
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.last
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
    }

    /// Remember a trigger attempt
    pub fn record(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Cooldown window
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

/// Voice command loop
pub struct CommandLoop<M, T, A> {
    mic: M,
    transcriber: T,
    actuator: A,
    wake_word: String,
    timings: ListenConfig,
    debouncer: Debouncer,
}

impl<M, T, A> CommandLoop<M, T, A>
where
    M: MicrophoneSource,
    T: Transcriber,
    A: LightActuator,
{
    /// Create a loop around the given capabilities
    #[must_use]
    pub fn new(config: &Config, mic: M, transcriber: T, actuator: A) -> Self {
        Self {
            mic,
            transcriber,
            actuator,
            wake_word: config.wake_word.clone(),
            timings: config.listen.clone(),
            debouncer: Debouncer::new(config.listen.cooldown),
        }
    }

    /// Calibrate the microphone against ambient noise
    ///
    /// # Errors
    ///
    /// Returns error if the microphone cannot be read
    pub async fn calibrate(&mut self) -> Result<f32> {
        println!("Calibrating for ambient noise, please stay quiet...");
        let threshold = self.mic.calibrate(self.timings.calibration).await?;
        println!("Energy threshold set to {threshold:.4}");
        Ok(threshold)
    }

    /// Run one listen → transcribe → decide → act cycle
    ///
    /// Benign conditions come back as a `CycleOutcome`.
    ///
    /// # Errors
    ///
    /// Returns error only if the microphone fails mid-cycle
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        println!("\nListening...");

        let listened = self
            .mic
            .listen(self.timings.listen_timeout, self.timings.phrase_time_limit)
            .await?;

        let audio = match listened {
            ListenResult::Timeout => {
                tracing::debug!("no speech before listen timeout");
                return Ok(CycleOutcome::Timeout);
            }
            ListenResult::Audio(audio) => audio,
        };

        tracing::debug!(duration = ?audio.duration(), "phrase captured");

        let text = match self.transcriber.transcribe(&audio).await {
            TranscribeResult::Text(text) => text,
            TranscribeResult::Unintelligible => {
                println!("Could not understand audio");
                return Ok(CycleOutcome::Unintelligible);
            }
            TranscribeResult::ServiceError(e) => {
                tracing::warn!(error = %e, "transcription failed");
                println!("Speech recognition error: {e}");
                return Ok(CycleOutcome::TranscriptionFailed);
            }
        };

        println!("Recognized: {text}");
        Ok(self.handle_transcript(&text).await)
    }

    /// Act on one transcript
    pub async fn handle_transcript(&mut self, text: &str) -> CycleOutcome {
        let tokens = normalize(text);
        let decision = decide(&tokens, &self.wake_word);

        if decision == Decision::NoWakeWord {
            tracing::debug!(transcript = text, "no wake word");
            return CycleOutcome::NoWakeWord;
        }

        if self.debouncer.is_cooling_down(Instant::now()) {
            tracing::info!(
                cooldown = ?self.debouncer.window(),
                "wake word ignored during cooldown"
            );
            println!("(cooldown) ignoring repeated command");
            return CycleOutcome::CooledDown;
        }

        match decision {
            Decision::Trigger(state) => {
                println!("→ Command: {}", state.as_str().to_uppercase());
                switch_light(&self.actuator, state).await;
                // Debounce attempts, not successes
                self.debouncer.record(Instant::now());
                CycleOutcome::Triggered(state)
            }
            Decision::NoCommand | Decision::NoWakeWord => {
                tracing::info!(transcript = text, "wake word without on/off");
                println!("Heard \"{}\" but no on/off command", self.wake_word);
                CycleOutcome::NoCommand
            }
        }
    }

    /// One cycle plus the pause that follows it
    ///
    /// Errors are logged and absorbed here; nothing escapes a cycle.
    pub async fn step(&mut self) -> Option<CycleOutcome> {
        match self.run_cycle().await {
            Ok(outcome) => {
                if outcome.heard_speech() {
                    tokio::time::sleep(self.timings.settle).await;
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "voice cycle failed");
                println!("Error: {e}");
                tokio::time::sleep(self.timings.error_backoff).await;
                None
            }
        }
    }

    /// Calibrate, then loop until a shutdown signal arrives
    ///
    /// The signal is checked between cycles, so a listen or light request
    /// in flight always runs to completion.
    ///
    /// # Errors
    ///
    /// Returns error if calibration fails; the loop itself never does
    pub async fn run(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        self.calibrate().await?;
        tracing::info!(wake_word = %self.wake_word, "listening for wake word");

        loop {
            if shutdown_rx.try_recv().is_ok() {
                tracing::info!("shutdown requested");
                break;
            }

            let outcome = self.step().await;
            tracing::trace!(?outcome, "cycle finished");
        }

        println!("\n\nShutting down...");
        Ok(())
    }
}

/// Send one light request and report the result on the console
///
/// Returns whether the device answered.
pub async fn switch_light<A: LightActuator>(actuator: &A, state: LightState) -> bool {
    match actuator.set(state).await {
        Ok(status) => {
            println!("✓ Light turned {state} (Status: {status})");
            true
        }
        Err(e) => {
            println!("✗ Error: {e}");
            false
        }
    }
}

/// Text-input command loop
///
/// Reads one command per line until "quit", end of input, or shutdown.
///
/// # Errors
///
/// Returns error if reading input fails
pub async fn run_text_loop<R, A>(
    input: R,
    actuator: &A,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
    A: LightActuator,
{
    println!("Type 'on' to turn on, 'off' to turn off");
    println!("Type 'quit' or 'exit' to stop");

    let mut lines = input.lines();

    loop {
        print!("\nEnter command (on/off): ");
        if let Err(e) = std::io::stdout().flush() {
            tracing::trace!(error = %e, "failed to flush prompt");
        }

        let line = tokio::select! {
            biased;
            Some(()) = shutdown_rx.recv() => {
                tracing::info!("shutdown requested");
                break;
            }
            line = lines.next_line() => line,
        };

        // A garbled line is skipped; the stream stays readable
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(error = %e, "unreadable input line");
                println!("Error: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(line) = line else {
            tracing::debug!("end of input");
            break;
        };

        match parse_text_command(&line) {
            TextCommand::Light(state) => {
                switch_light(actuator, state).await;
            }
            TextCommand::Quit => break,
            TextCommand::Unknown(input) => {
                println!("Unknown command: '{input}'. Please enter 'on' or 'off'");
            }
        }
    }

    println!("\nShutting down...");
    Ok(())
}
