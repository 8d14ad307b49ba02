//! Narrow interfaces for every external service the pipeline talks to.
//!
//! The orchestrator only ever sees these traits, so each provider can be
//! swapped for a fake in tests or for another vendor.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{CapabilityError, StoreError};
use crate::models::{
    GenerationRecord, ImageAnalysis, LinguisticAnalysis, ModerationReport, PerformancePrediction,
    PlatformContent, ProductData, RecordBody,
};

/// Everything the base generator may draw on.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub product: &'a ProductData,
    pub image_url: &'a str,
    pub image_analysis: Option<&'a ImageAnalysis>,
    pub voice_transcript: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct AudioInput {
    /// Base64 encoded audio bytes.
    pub content: String,
    pub encoding: String,
    pub sample_rate_hertz: u32,
}

#[derive(Debug, Clone)]
pub struct LanguageHints {
    pub language_code: String,
    pub alternatives: Vec<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce per-platform drafts. A response that cannot be read as
    /// platform content must be reported as `CapabilityError::MalformedResponse`.
    async fn generate(&self, context: &GenerationContext<'_>) -> Result<PlatformContent, CapabilityError>;
}

#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn detect_labels_and_colors(&self, image_url: &str) -> Result<ImageAnalysis, CapabilityError>;
}

#[async_trait]
pub trait Moderator: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<ModerationReport, CapabilityError>;
}

#[async_trait]
pub trait LanguageAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<LinguisticAnalysis, CapabilityError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioInput, hints: &LanguageHints) -> Result<String, CapabilityError>;
}

/// Engagement forecasting. The only implementation today is simulated.
#[async_trait]
pub trait PerformancePredictor: Send + Sync {
    async fn predict(&self, content: &PlatformContent, category: &str) -> Result<PerformancePrediction, CapabilityError>;
}

/// Append-only record storage. The store owns identifier generation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn persist(&self, body: &RecordBody) -> Result<Uuid, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Option<GenerationRecord>, StoreError>;
}
