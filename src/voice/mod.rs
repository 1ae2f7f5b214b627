//! Voice processing module
//!
//! Handles microphone selection, audio capture, speech endpointing and
//! transcription.

mod capture;
mod devices;
mod segmenter;
mod stt;

pub use capture::{
    CapturedAudio, CpalMicrophone, ListenResult, MicrophoneGuard, MicrophoneSource, SAMPLE_RATE,
    samples_to_wav,
};
pub use devices::{
    DeviceSelection, MicPreference, list_input_devices, print_devices, resolve_device,
    select_device,
};
pub use segmenter::{
    MIN_ENERGY_THRESHOLD, SegmentEvent, SegmenterState, SpeechSegmenter, calculate_energy,
    calibrate_threshold,
};
pub use stt::{SpeechToText, TranscribeResult, Transcriber};
