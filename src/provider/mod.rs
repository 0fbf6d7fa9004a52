//! Translation backends. The pipeline depends only on [`TranslationProvider`];
//! concrete backends are swapped by configuration string (`echo` / `http`).

mod echo;
mod http;

pub use echo::EchoProvider;
pub use http::HttpChatProvider;

use crate::error::ProviderError;
use async_trait::async_trait;

/// Minimal capability the pipeline needs from a translation backend.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError>;
}

/// Reduce a BCP-47 language code to its primary subtag (`"fr-FR"` -> `"fr"`).
pub fn primary_subtag(lang: &str) -> &str {
    lang.split('-').next().unwrap_or(lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_subtag_strips_region() {
        assert_eq!(primary_subtag("fr-FR"), "fr");
        assert_eq!(primary_subtag("en"), "en");
    }
}
