use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::GoogleApi;
use crate::capabilities::LanguageAnalyzer;
use crate::error::CapabilityError;
use crate::models::{Entity, LinguisticAnalysis, Sentiment, TextCategory, Token};

pub struct LanguageClient {
    api: GoogleApi,
    base_url: String,
}

impl LanguageClient {
    pub fn new(api: GoogleApi, base_url: String) -> Self {
        Self { api, base_url }
    }

    /// Classification rejects short texts, so an error here only costs the categories.
    async fn classify(&self, text: &str) -> Vec<TextCategory> {
        let url = format!("{}/documents:classifyText", self.base_url);
        let body = json!({ "document": { "type": "PLAIN_TEXT", "content": text } });
        match self.api.post_json::<_, ClassifyResponse>(&url, &body).await {
            Ok(resp) => resp.categories,
            Err(e) => {
                warn!("⚠️ Text classification unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl LanguageAnalyzer for LanguageClient {
    async fn analyze(&self, text: &str) -> Result<LinguisticAnalysis, CapabilityError> {
        if self.api.is_demo() {
            info!("Using demo mode - neutral sentiment, whitespace tokens");
            let tokens = text.split_whitespace()
                .map(|w| Token { text: w.to_string(), part_of_speech: "UNKNOWN".into(), head_token_index: 0, dependency_label: String::new() })
                .collect();
            return Ok(LinguisticAnalysis { tokens, ..Default::default() });
        }

        let url = format!("{}/documents:annotateText", self.base_url);
        let body = json!({
            "document": { "type": "PLAIN_TEXT", "content": text },
            "features": {
                "extractSyntax": true,
                "extractEntities": true,
                "extractDocumentSentiment": true
            },
            "encodingType": "UTF8"
        });
        let annotated: AnnotateTextResponse = self.api.post_json(&url, &body).await?;
        let categories = self.classify(text).await;

        let analysis = into_analysis(annotated, categories);
        info!("🧠 Sentiment {:.2} (magnitude {:.2}), {} entities", analysis.sentiment.score, analysis.sentiment.magnitude, analysis.entities.len());
        Ok(analysis)
    }
}

fn into_analysis(resp: AnnotateTextResponse, categories: Vec<TextCategory>) -> LinguisticAnalysis {
    let entities = resp.entities.into_iter()
        .map(|e| Entity { name: e.name, entity_type: e.entity_type, salience: e.salience, metadata: e.metadata })
        .collect();
    let tokens = resp.tokens.into_iter()
        .map(|t| Token {
            text: t.text.content,
            part_of_speech: t.part_of_speech.tag,
            head_token_index: t.dependency_edge.head_token_index,
            dependency_label: t.dependency_edge.label,
        })
        .collect();

    LinguisticAnalysis {
        sentiment: resp.document_sentiment,
        entities,
        tokens,
        categories,
    }
    .normalized()
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AnnotateTextResponse {
    document_sentiment: Sentiment,
    entities: Vec<RawEntity>,
    tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    name: String,
    #[serde(rename = "type", default)]
    entity_type: String,
    #[serde(default)]
    salience: f32,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawToken {
    text: TextSpan,
    part_of_speech: PartOfSpeech,
    dependency_edge: DependencyEdge,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TextSpan {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PartOfSpeech {
    tag: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct DependencyEdge {
    head_token_index: i32,
    label: String,
}

#[derive(Debug, Deserialize, Default)]
struct ClassifyResponse {
    #[serde(default)]
    categories: Vec<TextCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_annotate_text_response() {
        let raw = r#"{
            "documentSentiment": { "score": 0.8, "magnitude": 1.6 },
            "entities": [
                { "name": "pot", "type": "CONSUMER_GOOD", "salience": 0.3 },
                { "name": "Khurja", "type": "LOCATION", "salience": 0.6, "metadata": { "wikipedia_url": "https://en.wikipedia.org/wiki/Khurja" } }
            ],
            "tokens": [
                { "text": { "content": "Fresh", "beginOffset": 0 }, "partOfSpeech": { "tag": "ADJ" }, "dependencyEdge": { "headTokenIndex": 1, "label": "AMOD" } },
                { "text": { "content": "pots" }, "partOfSpeech": { "tag": "NOUN" }, "dependencyEdge": { "label": "ROOT" } }
            ]
        }"#;
        let categories = vec![TextCategory { name: "/Home & Garden".into(), confidence: 0.7 }];
        let analysis = into_analysis(serde_json::from_str(raw).unwrap(), categories);

        assert_eq!(analysis.sentiment, Sentiment { score: 0.8, magnitude: 1.6 });
        assert_eq!(analysis.entities[0].name, "Khurja");
        assert_eq!(analysis.entities[0].metadata["wikipedia_url"], "https://en.wikipedia.org/wiki/Khurja");
        assert_eq!(analysis.tokens[0], Token { text: "Fresh".into(), part_of_speech: "ADJ".into(), head_token_index: 1, dependency_label: "AMOD".into() });
        assert_eq!(analysis.tokens[1].head_token_index, 0);
        assert_eq!(analysis.categories.len(), 1);
    }

    #[test]
    fn missing_sentiment_defaults_to_neutral() {
        let analysis = into_analysis(serde_json::from_str("{}").unwrap(), vec![]);
        assert_eq!(analysis.sentiment, Sentiment::default());
        assert!(analysis.entities.is_empty());
    }
}
