//! Error types for voice-light

use thiserror::Error;

/// Result type alias for voice-light operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in voice-light
///
/// Only the startup variants (`Config`, `DeviceEnumeration`, `NoInputDevices`,
/// `MicrophoneOpen`) end the process. Everything else is absorbed by the
/// command loop and reported on the console.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Input devices could not be enumerated
    #[error("failed to enumerate input devices: {0}")]
    DeviceEnumeration(String),

    /// Enumeration succeeded but found nothing to listen with
    #[error("no audio input devices found")]
    NoInputDevices,

    /// The selected microphone could not be opened
    #[error("failed to open microphone: {0}")]
    MicrophoneOpen(String),

    /// Audio stream error during a listen cycle
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Light endpoint request failed
    #[error("light request failed: {0}")]
    Actuator(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether this error must abort startup rather than skip a cycle
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::DeviceEnumeration(_)
                | Self::NoInputDevices
                | Self::MicrophoneOpen(_)
        )
    }
}
