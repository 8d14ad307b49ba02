use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::GoogleApi;
use crate::capabilities::Translator;
use crate::error::CapabilityError;

/// Cloud Translation (v2 REST).
pub struct TranslateClient {
    api: GoogleApi,
    base_url: String,
    source_language: String,
}

impl TranslateClient {
    pub fn new(api: GoogleApi, base_url: String, source_language: String) -> Self {
        Self { api, base_url, source_language }
    }
}

#[async_trait]
impl Translator for TranslateClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, CapabilityError> {
        if self.api.is_demo() {
            info!("Using demo mode - echoing text for '{}'", target_language);
            return Ok(format!("[{}] {}", target_language, text));
        }

        let body = json!({
            "q": [text],
            "source": self.source_language,
            "target": target_language,
            "format": "text"
        });
        let response: TranslateResponse = self.api.post_json(&self.base_url, &body).await?;
        first_translation(response)
    }
}

fn first_translation(response: TranslateResponse) -> Result<String, CapabilityError> {
    response.data.translations.into_iter().next()
        .map(|t| t.translated_text)
        .ok_or_else(|| CapabilityError::MalformedResponse("no translations in response".into()))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    data: TranslateData,
}

#[derive(Debug, Deserialize, Default)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}
