//! Transcript normalization and command decisions

use std::collections::HashSet;
use std::fmt;

/// Desired state of the light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightState {
    On,
    Off,
}

impl LightState {
    /// Lowercase name, also the path segment on the light endpoint
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transcript asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wake word absent, transcript is ignored
    NoWakeWord,
    /// Wake word present but neither "on" nor "off"
    NoCommand,
    /// Switch the light
    Trigger(LightState),
}

/// A typed line in the text-input variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCommand {
    Light(LightState),
    Quit,
    Unknown(String),
}

/// Normalize free text into a set of lowercase alphanumeric tokens
///
/// Punctuation becomes whitespace, so `"Jarvis, on!"` yields `{"jarvis", "on"}`.
#[must_use]
pub fn normalize(text: &str) -> HashSet<String> {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

/// Decide what to do with a token set
///
/// The wake word is normalized like a transcript; every one of its tokens
/// must be present. "off" takes precedence when both directives appear.
#[must_use]
pub fn decide(tokens: &HashSet<String>, wake_word: &str) -> Decision {
    let wake_tokens = normalize(wake_word);
    if wake_tokens.is_empty() || !wake_tokens.is_subset(tokens) {
        return Decision::NoWakeWord;
    }

    let has_on = tokens.contains("on");
    let has_off = tokens.contains("off");

    if has_on && !has_off {
        Decision::Trigger(LightState::On)
    } else if has_off {
        Decision::Trigger(LightState::Off)
    } else {
        Decision::NoCommand
    }
}

/// Parse a typed command, matched verbatim after trimming and case-folding
#[must_use]
pub fn parse_text_command(line: &str) -> TextCommand {
    let input = line.trim().to_lowercase();
    match input.as_str() {
        "on" => TextCommand::Light(LightState::On),
        "off" => TextCommand::Light(LightState::Off),
        "quit" | "exit" | "q" => TextCommand::Quit,
        _ => TextCommand::Unknown(input),
    }
}
