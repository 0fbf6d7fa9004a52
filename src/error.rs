//! Typed errors at the provider and config boundaries.
//!
//! Malformed-inbound / no-matching-translator / empty-text drops are not
//! modeled here — the bus adapter filters those out before anything
//! reaches the pipeline, so there is no `Result` to wrap.

use thiserror::Error;

/// Failures from a [`crate::provider::TranslationProvider`] call.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("translation request timed out")]
    Timeout,

    #[error("transport error calling translation provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("translation provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("translation provider returned an empty response")]
    EmptyResponse,
}

/// Startup / configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingRequired(&'static str),
}
