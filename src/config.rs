//! Configuration management for voice-light

use std::str::FromStr;
use std::time::Duration;

use crate::command::LightState;
use crate::voice::MicPreference;
use crate::{Error, Result};

/// Default address of the light controller
pub const DEFAULT_LIGHT_HOST: &str = "http://192.168.0.29";

/// Default wake word
pub const DEFAULT_WAKE_WORD: &str = "jarvis";

/// voice-light configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Light endpoint configuration
    pub light: LightConfig,

    /// Token that must appear before a command is acted on
    pub wake_word: String,

    /// Microphone selection
    pub mic: MicPreference,

    /// Listening and debounce timings
    pub listen: ListenConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,
}

/// Light endpoint configuration
#[derive(Debug, Clone)]
pub struct LightConfig {
    /// URL requested to switch the light on
    pub on_url: String,

    /// URL requested to switch the light off
    pub off_url: String,

    /// Request timeout
    pub timeout: Duration,
}

impl LightConfig {
    /// URL associated with a desired state
    #[must_use]
    pub fn url_for(&self, state: LightState) -> &str {
        match state {
            LightState::On => &self.on_url,
            LightState::Off => &self.off_url,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            on_url: format!("{DEFAULT_LIGHT_HOST}/on"),
            off_url: format!("{DEFAULT_LIGHT_HOST}/off"),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Listening and debounce timings
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Time allowed for speech to start
    pub listen_timeout: Duration,

    /// Maximum length of one phrase
    pub phrase_time_limit: Duration,

    /// Ambient-noise calibration at startup
    pub calibration: Duration,

    /// Minimum time between two accepted triggers
    pub cooldown: Duration,

    /// Pause after a cycle that raised an error
    pub error_backoff: Duration,

    /// Pause after a transcript was handled
    pub settle: Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen_timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(5),
            calibration: Duration::from_secs(1),
            cooldown: Duration::from_millis(1500),
            error_backoff: Duration::from_secs(1),
            settle: Duration::from_millis(300),
        }
    }
}

/// STT provider backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    #[default]
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Speech-to-text configuration
#[derive(Clone, Default)]
pub struct SttConfig {
    /// Which transcription API to call
    pub provider: SttProvider,

    /// Provider model identifier
    pub model: String,

    /// API key for the selected provider
    pub api_key: Option<String>,
}

impl std::fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SttConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            light: LightConfig::default(),
            wake_word: DEFAULT_WAKE_WORD.to_string(),
            mic: MicPreference::Default,
            listen: ListenConfig::default(),
            stt: SttConfig {
                provider: SttProvider::Whisper,
                model: SttProvider::Whisper.default_model().to_string(),
                api_key: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but cannot be parsed
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let light = LightConfig {
            on_url: lookup("LIGHT_ON_URL").unwrap_or(defaults.light.on_url),
            off_url: lookup("LIGHT_OFF_URL").unwrap_or(defaults.light.off_url),
            timeout: parse_millis(&lookup, "LIGHT_TIMEOUT_MS")?
                .unwrap_or(defaults.light.timeout),
        };

        let wake_word = lookup("WAKE_WORD").unwrap_or(defaults.wake_word);
        if wake_word.trim().is_empty() {
            return Err(Error::Config("WAKE_WORD must not be empty".to_string()));
        }

        // An explicit index wins over a name hint
        let mic_index = lookup("MIC_INDEX")
            .map(|s| {
                s.trim()
                    .parse::<usize>()
                    .map_err(|e| Error::Config(format!("MIC_INDEX: {e}")))
            })
            .transpose()?;
        let mic = MicPreference::from_parts(mic_index, lookup("MIC_NAME"));

        let listen = ListenConfig {
            listen_timeout: parse_secs(&lookup, "LISTEN_TIMEOUT_SECS")?
                .unwrap_or(defaults.listen.listen_timeout),
            phrase_time_limit: parse_secs(&lookup, "PHRASE_TIME_LIMIT_SECS")?
                .unwrap_or(defaults.listen.phrase_time_limit),
            calibration: parse_secs(&lookup, "CALIBRATION_SECS")?
                .unwrap_or(defaults.listen.calibration),
            cooldown: parse_millis(&lookup, "COOLDOWN_MS")?.unwrap_or(defaults.listen.cooldown),
            ..defaults.listen
        };

        let provider = lookup("STT_PROVIDER")
            .map(|s| s.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();
        let api_key = match provider {
            SttProvider::Whisper => lookup("OPENAI_API_KEY"),
            SttProvider::Deepgram => lookup("DEEPGRAM_API_KEY"),
        }
        .filter(|k| !k.is_empty());
        let stt = SttConfig {
            provider,
            model: lookup("STT_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            api_key,
        };

        Ok(Self {
            light,
            wake_word,
            mic,
            listen,
            stt,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(Duration::from_secs_f64)
                .ok_or_else(|| Error::Config(format!("{key}: invalid duration '{s}'")))
        })
        .transpose()
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.light.on_url, "http://192.168.0.29/on");
        assert_eq!(config.light.off_url, "http://192.168.0.29/off");
        assert_eq!(config.light.timeout, Duration::from_secs(2));
        assert_eq!(config.wake_word, "jarvis");
        assert_eq!(config.mic, MicPreference::Default);
        assert_eq!(config.listen.cooldown, Duration::from_millis(1500));
        assert_eq!(config.listen.listen_timeout, Duration::from_secs(5));
        assert_eq!(config.stt.provider, SttProvider::Whisper);
        assert_eq!(config.stt.model, "whisper-1");
        assert!(config.stt.api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("LIGHT_ON_URL", "http://10.0.0.5/relay/on"),
            ("WAKE_WORD", "bibl"),
            ("MIC_NAME", "usb"),
            ("PHRASE_TIME_LIMIT_SECS", "2.5"),
            ("COOLDOWN_MS", "250"),
            ("STT_PROVIDER", "Deepgram"),
            ("DEEPGRAM_API_KEY", "dg-key"),
        ])
        .unwrap();

        assert_eq!(config.light.url_for(LightState::On), "http://10.0.0.5/relay/on");
        assert_eq!(config.light.url_for(LightState::Off), "http://192.168.0.29/off");
        assert_eq!(config.wake_word, "bibl");
        assert_eq!(config.mic, MicPreference::Name("usb".to_string()));
        assert_eq!(config.listen.phrase_time_limit, Duration::from_millis(2500));
        assert_eq!(config.listen.cooldown, Duration::from_millis(250));
        assert_eq!(config.stt.provider, SttProvider::Deepgram);
        assert_eq!(config.stt.model, "nova-2");
        assert_eq!(config.stt.api_key.as_deref(), Some("dg-key"));
    }

    #[test]
    fn test_mic_index_wins_over_name() {
        let config = load(&[("MIC_INDEX", "3"), ("MIC_NAME", "usb")]).unwrap();
        assert_eq!(config.mic, MicPreference::Index(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(load(&[("MIC_INDEX", "abc")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("COOLDOWN_MS", "-1")]), Err(Error::Config(_))));
        assert!(matches!(
            load(&[("LISTEN_TIMEOUT_SECS", "soon")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(load(&[("STT_PROVIDER", "google")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("WAKE_WORD", "  ")]), Err(Error::Config(_))));
    }
}
