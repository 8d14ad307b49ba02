use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, error};

use crate::capabilities::{GenerationContext, Generator};
use crate::config::{mask_key, DEMO_KEY};
use crate::error::CapabilityError;
use crate::fallback::fallback_content;
use crate::models::PlatformContent;

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self, CapabilityError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key, base_url, model, timeout })
    }

    pub fn build_prompt(context: &GenerationContext<'_>) -> String {
        let product = context.product;
        let voice = match context.voice_transcript {
            Some(t) if !t.trim().is_empty() => format!("\n- Artisan's Voice Notes: {}", t.trim()),
            _ => String::new(),
        };
        let image = match context.image_analysis {
            Some(analysis) if !analysis.labels.is_empty() || !analysis.colors.is_empty() => {
                let labels: Vec<&str> = analysis.labels.iter().map(|l| l.description.as_str()).collect();
                let colors = if analysis.colors.is_empty() {
                    "Not available".to_string()
                } else {
                    analysis.colors.iter()
                        .map(|c| format!("rgb({}, {}, {}) covering {:.0}%", c.red, c.green, c.blue, c.pixel_fraction * 100.0))
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                format!("\n\nIMAGE ANALYSIS:\n- Detected Labels: {}\n- Colors: {}", labels.join(", "), colors)
            }
            _ => String::new(),
        };

        format!(
"You are an expert social media strategist for artisans selling handcrafted products.

PRODUCT INFORMATION:
- Name: {title}
- Category: {category}
- Description: {description}
- Artisan: {artisan}
- Location: {location}
- Product Photo: {photo}{voice}{image}

TASK:
Generate social media content for this artisan product for Instagram, Facebook, and LinkedIn.
For each platform, provide an engaging caption (appropriate length for the platform) and a list of 5-10 relevant hashtags.

Format your response as valid JSON with this structure:
{{\"platforms\": {{\"instagram\": {{\"caption\": \"...\", \"hashtags\": [\"...\"]}}, \"facebook\": {{...}}, \"linkedin\": {{...}}}}}}

Make the content authentic, highlighting cultural heritage, craftsmanship, and sustainability aspects. \
Instagram captions are concise and visual, Facebook content is more detailed with storytelling elements, and LinkedIn content is professional and impact-focused.",
            title = product.title,
            category = product.category,
            description = product.description,
            artisan = product.artisan_name,
            location = product.location,
            photo = context.image_url,
        )
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, CapabilityError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, &mask_key(&self.api_key)));

        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 0.8,
                "topK": 40,
                "maxOutputTokens": 2048,
                "responseMimeType": "application/json"
            }
        });

        let response = self.client.post(&url).json(&payload).send().await
            .map_err(|e| CapabilityError::transport(e, self.timeout))?;
        let status = response.status();
        let response_text = response.text().await.map_err(|e| CapabilityError::transport(e, self.timeout))?;

        if !status.is_success() {
            error!("❌ Gemini text generation failed with status {}: {}", status, truncate(&response_text, 500));
            return Err(CapabilityError::Http(format!("status={} body={}", status, response_text)));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| CapabilityError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        parsed.candidates.iter()
            .flat_map(|c| c.content.parts.iter())
            .find_map(|p| p.text.as_deref())
            .map(|t| t.trim().to_string())
            .ok_or_else(|| CapabilityError::MalformedResponse("No text content found in response".to_string()))
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, context: &GenerationContext<'_>) -> Result<PlatformContent, CapabilityError> {
        if self.api_key == DEMO_KEY {
            info!("Using demo mode - returning templated content for '{}'", context.product.title);
            return Ok(fallback_content(context.product));
        }

        let prompt = Self::build_prompt(context);
        info!("🎯 Generating social content for '{}' ({} char prompt)", context.product.title, prompt.len());
        let text = self.generate_text(&prompt).await?;
        info!("📥 Gemini answered with {} chars: {}", text.len(), truncate(&text, 200));
        parse_platform_content(&text)
    }
}

/// Read the model's answer as platform content, tolerating a fenced ```json block.
pub fn parse_platform_content(text: &str) -> Result<PlatformContent, CapabilityError> {
    let body = strip_code_fence(text);
    let content: PlatformContent = serde_json::from_str(body)
        .map_err(|e| CapabilityError::MalformedResponse(format!("generated content is not valid JSON: {}", e)))?;
    if content.platforms.is_empty() {
        return Err(CapabilityError::MalformedResponse("generated content has no platforms".into()));
    }
    Ok(content)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else { return trimmed };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...[{} chars]", &s[..idx], s.len()),
        None => s.to_string(),
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}
