use super::{primary_subtag, TranslationProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reference HTTP backend: a chat-completion endpoint (TranslateGemma or
/// anything exposing the same contract) invoked with a single delimited
/// user message.
pub struct HttpChatProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

impl HttpChatProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl TranslationProvider for HttpChatProvider {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError> {
        let src = primary_subtag(source_lang);
        let tgt = primary_subtag(target_lang);
        let content = format!("<<<source>>>{src}<<<target>>>{tgt}<<<text>>>{text}");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user".to_string(), content }],
            max_tokens: self.max_tokens,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(ProviderError::Http { status: response.status().as_u16() });
        }

        let parsed: ChatResponse = response.json().await.map_err(ProviderError::Transport)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ProviderError::EmptyResponse)?;

        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(trimmed)
    }
}
