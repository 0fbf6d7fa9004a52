//! Wire types shared between the bus adapter and the pipeline.

use serde::{Deserialize, Serialize};

/// An `externalTranslations` directive from an inbound transcription event.
///
/// An event is only honored for target languages whose directive names
/// this relay (`translator == configured name`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTranslation {
    pub target_lang: String,
    pub translator: String,
}

/// Inbound transcription event, as published by the transcriber on
/// `transcriber/out/{sessionId}/{channelId}/{partial,final}`.
///
/// Only the fields the pipeline needs are modeled; unrecognized fields in
/// the source payload are ignored by `serde` rather than rejected.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionEvent {
    pub segment_id: i64,
    #[serde(default)]
    pub astart: Option<String>,
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    /// BCP-47 source language (e.g. "fr-FR"). Absent/empty packets are
    /// dropped before they reach the pipeline.
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub locutor: Option<String>,
    #[serde(default)]
    pub external_translations: Vec<ExternalTranslation>,
}

/// Outbound translation payload. The key set is a contract with
/// downstream consumers: exactly these 8 keys, no more, no fewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationPayload {
    pub segment_id: i64,
    pub astart: Option<String>,
    pub text: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub source_lang: Option<String>,
    pub target_lang: String,
    pub locutor: Option<String>,
}

impl TranslationPayload {
    pub fn build(event: &TranscriptionEvent, translated_text: String, target_lang: &str) -> Self {
        Self {
            segment_id: event.segment_id,
            astart: event.astart.clone(),
            text: translated_text,
            start: event.start,
            end: event.end,
            source_lang: event.lang.clone(),
            target_lang: target_lang.to_string(),
            locutor: event.locutor.clone(),
        }
    }
}

/// `action` segment of the outbound publish topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Partial,
    Final,
}

impl PublishAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Partial => "partial",
            Self::Final => "final",
        }
    }
}

/// Key identifying a `(sessionId, channelId, targetLang)` triple — the
/// natural unit of per-target pipeline state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripleKey {
    pub session_id: String,
    pub channel_id: String,
    pub target_lang: String,
}

impl TripleKey {
    pub fn new(session_id: impl Into<String>, channel_id: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            channel_id: channel_id.into(),
            target_lang: target_lang.into(),
        }
    }
}

impl std::fmt::Display for TripleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.session_id, self.channel_id, self.target_lang)
    }
}
