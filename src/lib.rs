//! voice-light - Voice-controlled switch for a network smart light
//!
//! Listens on a microphone, transcribes each phrase, and when the wake word
//! is heard together with "on" or "off", sends `GET /on` or `GET /off` to the
//! light. A text-input loop offers the same control from the keyboard.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Microphone │──▶│ Transcriber  │──▶│  Normalizer  │
//! │  (cpal)    │   │ (Whisper/DG) │   │  + decision  │
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │ debounce
//!                                     ┌──────▼───────┐
//!                                     │ Light (HTTP) │
//!                                     └──────────────┘
//! ```

pub mod actuator;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod voice;

pub use actuator::{HttpLight, LightActuator};
pub use command::{Decision, LightState, TextCommand, decide, normalize, parse_text_command};
pub use config::Config;
pub use control::{CommandLoop, CycleOutcome, Debouncer, run_text_loop, switch_light};
pub use error::{Error, Result};
