use super::TranslationProvider;
use crate::error::ProviderError;
use async_trait::async_trait;

/// Returns the input text unchanged. Used in tests and local development
/// where no real translation backend is configured.
#[derive(Debug, Default)]
pub struct EchoProvider;

#[async_trait]
impl TranslationProvider for EchoProvider {
    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<String, ProviderError> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_input_unchanged() {
        let provider = EchoProvider;
        let out = provider.translate("Bonjour le monde", "fr", "en").await.unwrap();
        assert_eq!(out, "Bonjour le monde");
    }
}
