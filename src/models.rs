use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub artisan_name: String,
    #[serde(default)]
    pub location: String,
}

/// Which enrichment stages run. The legacy service names sent by the web UI
/// are accepted as aliases.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default, alias = "dlp")]
    pub moderation: bool,
    #[serde(default, alias = "naturalLanguage")]
    pub linguistic_analysis: bool,
    #[serde(default)]
    pub translation: bool,
    #[serde(default, alias = "bigQuery")]
    pub analytics_prediction: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub product_data: ProductData,
    pub image_url: String,
    #[serde(default)]
    pub image_analysis: Option<ImageAnalysis>,
    #[serde(default)]
    pub voice_transcript: Option<String>,
    #[serde(default, alias = "activeServices")]
    pub flags: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PlatformPost {
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

/// Captions and hashtags keyed by platform identifier.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PlatformContent {
    pub platforms: BTreeMap<String, PlatformPost>,
}

impl PlatformContent {
    pub fn captions(&self) -> impl Iterator<Item = &str> {
        self.platforms.values().map(|p| p.caption.as_str())
    }
}

// --- Image analysis ---

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    #[serde(default)]
    pub labels: Vec<ImageLabel>,
    #[serde(default)]
    pub colors: Vec<DominantColor>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_search: Option<SafeSearch>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ImageLabel {
    pub description: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DominantColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub pixel_fraction: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DetectedObject {
    pub name: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SafeSearch {
    #[serde(default)]
    pub adult: String,
    #[serde(default)]
    pub spoof: String,
    #[serde(default)]
    pub medical: String,
    #[serde(default)]
    pub violence: String,
    #[serde(default)]
    pub racy: String,
}

// --- Enrichment annexes ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModerationFinding {
    /// Byte offsets into the moderated text, end exclusive.
    pub span_start: usize,
    pub span_end: usize,
    pub matched_text: String,
    pub category: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModerationReport {
    pub redacted_text: String,
    pub findings: Vec<ModerationFinding>,
}

/// Findings applied per platform during moderation.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ModerationOutcome {
    pub platforms: BTreeMap<String, Vec<ModerationFinding>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(default)]
pub struct Sentiment {
    pub score: f32,
    pub magnitude: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub salience: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub text: String,
    pub part_of_speech: String,
    #[serde(default)]
    pub head_token_index: i32,
    #[serde(default)]
    pub dependency_label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TextCategory {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct LinguisticAnalysis {
    pub sentiment: Sentiment,
    pub entities: Vec<Entity>,
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub categories: Vec<TextCategory>,
}

impl LinguisticAnalysis {
    /// Clamps sentiment into its documented range and ranks entities by
    /// salience, highest first.
    pub fn normalized(mut self) -> Self {
        self.sentiment.score = self.sentiment.score.clamp(-1.0, 1.0);
        self.sentiment.magnitude = self.sentiment.magnitude.max(0.0);
        self.entities.sort_by(|a, b| b.salience.total_cmp(&a.salience));
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationSet {
    pub source_platform: String,
    pub languages: BTreeMap<String, PlatformPost>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub engagement_rate: f64,
    pub estimated_reach: u32,
    pub click_rate: f64,
    pub expected_clicks: u32,
    pub optimal_time: String,
    pub optimal_day: String,
    pub all_optimal_times: Vec<String>,
    pub change: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PerformancePrediction {
    pub platforms: BTreeMap<String, PlatformMetrics>,
    pub insights: Vec<String>,
}

// --- Records ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Generated,
    Fallback,
}

/// Everything in a record except the identifier the store assigns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    pub product_data: ProductData,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<ImageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_transcript: Option<String>,
    #[serde(flatten)]
    pub content: PlatformContent,
    pub content_source: ContentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderation: Option<ModerationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlp_analysis: Option<LinguisticAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translations: Option<TranslationSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<PerformancePrediction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub doc_id: Uuid,
    #[serde(flatten)]
    pub body: RecordBody,
}

// --- Companion endpoints ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageRequest {
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    #[serde(default)]
    pub audio_content: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hertz: u32,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_alternative_languages")]
    pub alternative_language_codes: Vec<String>,
}

fn default_encoding() -> String { "WEBM_OPUS".into() }
fn default_sample_rate() -> u32 { 48_000 }
fn default_language_code() -> String { "hi-IN".into() }
fn default_alternative_languages() -> Vec<String> { vec!["en-IN".into()] }

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranscribeResponse {
    pub transcript: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAck {
    pub message: String,
    pub schedule_id: String,
    pub scheduled_time: String,
}
