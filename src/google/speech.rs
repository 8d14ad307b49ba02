use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::GoogleApi;
use crate::capabilities::{AudioInput, LanguageHints, Transcriber};
use crate::error::CapabilityError;

pub struct SpeechClient {
    api: GoogleApi,
    base_url: String,
}

impl SpeechClient {
    pub fn new(api: GoogleApi, base_url: String) -> Self {
        Self { api, base_url }
    }
}

#[async_trait]
impl Transcriber for SpeechClient {
    async fn transcribe(&self, audio: &AudioInput, hints: &LanguageHints) -> Result<String, CapabilityError> {
        if self.api.is_demo() {
            info!("Using demo mode - returning empty transcript");
            return Ok(String::new());
        }

        let body = json!({
            "config": {
                "encoding": audio.encoding,
                "sampleRateHertz": audio.sample_rate_hertz,
                "languageCode": hints.language_code,
                "alternativeLanguageCodes": hints.alternatives,
                "model": "latest_long",
                "enableAutomaticPunctuation": true,
                "enableSpokenPunctuation": true
            },
            "audio": { "content": audio.content }
        });

        let url = format!("{}/speech:recognize", self.base_url);
        let response: RecognizeResponse = self.api.post_json(&url, &body).await?;
        let transcript = join_transcript(response);
        info!("🎙️ Transcribed {} chars", transcript.len());
        Ok(transcript)
    }
}

fn join_transcript(response: RecognizeResponse) -> String {
    response.results.into_iter()
        .filter_map(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}
