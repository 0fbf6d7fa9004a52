//! Environment variable loading with defaults, per spec §6 Configuration.

use crate::error::ConfigError;

/// The 24 official EU languages, short codes, consistent with the
/// reference implementation's Microsoft-translation-code convention.
pub const EU_LANGUAGES: &[&str] = &[
    "en", "fr", "de", "es", "it", "pt", "nl", "pl", "ro", "cs", "da", "sv", "fi", "el", "hu",
    "bg", "hr", "sk", "sl", "et", "lv", "lt", "mt", "ga",
];

/// Top-level relay configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique translator identifier matched against inbound
    /// `externalTranslations[].translator`. Required, no default.
    pub translator_name: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub translation_provider: String,
    pub translategemma_endpoint: String,
    pub translategemma_model: String,
    pub translategemma_max_tokens: u32,
    pub change_threshold: f64,
    pub min_new_chars: usize,
    pub partial_debounce_ms: u64,
    pub stability_threshold: f64,
    pub max_hold_seconds: f64,
    pub max_consecutive_holds: u32,
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Only `TRANSLATOR_NAME` is required with no default; every other
    /// variable falls back to the documented default — including when
    /// present but unparsable, since a single malformed numeric env var
    /// should not crash a long-running relay.
    pub fn from_env() -> Result<Self, ConfigError> {
        let translator_name = std::env::var("TRANSLATOR_NAME")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRequired("TRANSLATOR_NAME"))?;

        Ok(Self {
            translator_name,
            broker_host: env_string("BROKER_HOST", "localhost"),
            broker_port: env_parsed("BROKER_PORT", 1883),
            translation_provider: env_string("TRANSLATION_PROVIDER", "echo"),
            translategemma_endpoint: env_string("TRANSLATEGEMMA_ENDPOINT", ""),
            translategemma_model: env_string(
                "TRANSLATEGEMMA_MODEL",
                "Infomaniak-AI/vllm-translategemma-4b-it",
            ),
            translategemma_max_tokens: env_parsed("TRANSLATEGEMMA_MAX_TOKENS", 500),
            change_threshold: env_parsed("CHANGE_THRESHOLD", 85.0),
            min_new_chars: env_parsed("MIN_NEW_CHARS", 10),
            partial_debounce_ms: env_parsed("PARTIAL_DEBOUNCE_MS", 300),
            stability_threshold: env_parsed("STABILITY_THRESHOLD", 0.6),
            max_hold_seconds: env_parsed("MAX_HOLD_SECONDS", 2.0),
            max_consecutive_holds: env_parsed("MAX_CONSECUTIVE_HOLDS", 2),
            log_level: env_string("LOG_LEVEL", "info"),
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "could not parse environment variable, using default");
            default
        }),
        Err(_) => default,
    }
}
