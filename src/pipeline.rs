//! The content enrichment pipeline.
//!
//! A run is: validate, base generation, then the enrichment stages in
//! [`ENRICHMENT_STAGES`] order, then exactly one write to the record store.
//! Each enrichment stage is gated by a request flag and carries its own
//! failure policy; the orchestrator never decides that per call site.

use chrono::Utc;
use reqwest::Url;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::capabilities::{
    GenerationContext, Generator, ImageAnalyzer, LanguageAnalyzer, Moderator, PerformancePredictor,
    RecordStore, Translator,
};
use crate::error::{CapabilityError, PipelineError, StoreError};
use crate::fallback::fallback_content;
use crate::models::{
    ContentSource, FeatureFlags, GenerationRecord, GenerationRequest, ImageAnalysis, LinguisticAnalysis,
    ModerationOutcome, PerformancePrediction, PlatformContent, PlatformPost, RecordBody, TranslationSet,
};
use crate::redaction::redact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Generation,
    Moderation,
    LinguisticAnalysis,
    Translation,
    AnalyticsPrediction,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Generation => "generation",
            StageKind::Moderation => "moderation",
            StageKind::LinguisticAnalysis => "linguistic_analysis",
            StageKind::Translation => "translation",
            StageKind::AnalyticsPrediction => "analytics_prediction",
        }
    }

    /// Base generation always runs.
    pub fn enabled(self, flags: &FeatureFlags) -> bool {
        match self {
            StageKind::Generation => true,
            StageKind::Moderation => flags.moderation,
            StageKind::LinguisticAnalysis => flags.linguistic_analysis,
            StageKind::Translation => flags.translation,
            StageKind::AnalyticsPrediction => flags.analytics_prediction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep going without the stage's output.
    FailOpen,
    /// Abort the run with `UpstreamUnavailable`.
    FailClosed,
    /// Keep whatever items succeeded; absent only if none did.
    Partial,
}

#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub policy: FailurePolicy,
}

/// Moderation comes first so every later stage reads redacted captions.
pub const ENRICHMENT_STAGES: [StageDescriptor; 4] = [
    StageDescriptor { kind: StageKind::Moderation, policy: FailurePolicy::FailOpen },
    StageDescriptor { kind: StageKind::LinguisticAnalysis, policy: FailurePolicy::FailClosed },
    StageDescriptor { kind: StageKind::Translation, policy: FailurePolicy::Partial },
    StageDescriptor { kind: StageKind::AnalyticsPrediction, policy: FailurePolicy::FailOpen },
];

#[derive(Clone)]
pub struct Capabilities {
    pub generator: Arc<dyn Generator>,
    pub image_analyzer: Arc<dyn ImageAnalyzer>,
    pub moderator: Arc<dyn Moderator>,
    pub analyzer: Arc<dyn LanguageAnalyzer>,
    pub translator: Arc<dyn Translator>,
    pub predictor: Arc<dyn PerformancePredictor>,
    pub store: Arc<dyn RecordStore>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub primary_platform: String,
    pub target_languages: Vec<String>,
    pub call_timeout: Duration,
}

enum StageOutput {
    Moderated { content: PlatformContent, outcome: ModerationOutcome },
    Analysis(LinguisticAnalysis),
    Translations { set: TranslationSet, missing: Vec<String> },
    Prediction(PerformancePrediction),
}

struct Draft {
    content: PlatformContent,
    moderation: Option<ModerationOutcome>,
    nlp_analysis: Option<LinguisticAnalysis>,
    translations: Option<TranslationSet>,
    analytics: Option<PerformancePrediction>,
    degraded: Vec<String>,
}

impl Draft {
    fn new(content: PlatformContent) -> Self {
        Self { content, moderation: None, nlp_analysis: None, translations: None, analytics: None, degraded: Vec::new() }
    }

    fn apply(&mut self, output: StageOutput) {
        match output {
            StageOutput::Moderated { content, outcome } => {
                self.content = content;
                self.moderation = Some(outcome);
            }
            StageOutput::Analysis(analysis) => self.nlp_analysis = Some(analysis),
            StageOutput::Translations { set, missing } => {
                self.degraded.extend(missing.into_iter().map(|lang| format!("{}:{}", StageKind::Translation.name(), lang)));
                self.translations = Some(set);
            }
            StageOutput::Prediction(prediction) => self.analytics = Some(prediction),
        }
    }
}

pub struct Orchestrator {
    caps: Capabilities,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(caps: Capabilities, settings: PipelineSettings) -> Self {
        Self { caps, settings }
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationRecord, PipelineError> {
        validate(request)?;
        let product = &request.product_data;
        info!("🚀 Generating content for product: {} ({:?})", product.title, request.flags);

        let image_analysis = self.image_context(request).await;
        let (content, content_source) = self.generate_base(request, image_analysis.as_ref()).await?;
        let mut draft = Draft::new(content);

        for stage in ENRICHMENT_STAGES.iter() {
            if !stage.kind.enabled(&request.flags) {
                continue;
            }
            match self.run_stage(stage.kind, &draft.content, request).await {
                Ok(output) => draft.apply(output),
                Err(e) => match stage.policy {
                    FailurePolicy::FailClosed => {
                        error!("❌ {} failed, aborting run: {}", stage.kind.name(), e);
                        return Err(PipelineError::upstream(stage.kind, e));
                    }
                    FailurePolicy::FailOpen | FailurePolicy::Partial => {
                        warn!("⚠️ {} degraded: {}", stage.kind.name(), e);
                        draft.degraded.push(stage.kind.name().to_string());
                    }
                },
            }
        }

        let body = RecordBody {
            product_data: product.clone(),
            image_url: request.image_url.clone(),
            image_analysis,
            voice_transcript: request.voice_transcript.clone(),
            content: draft.content,
            content_source,
            moderation: draft.moderation,
            nlp_analysis: draft.nlp_analysis,
            translations: draft.translations,
            analytics: draft.analytics,
            degraded: draft.degraded,
            created_at: Utc::now(),
        };

        let doc_id = match tokio::time::timeout(self.settings.call_timeout, self.caps.store.persist(&body)).await {
            Ok(result) => result?,
            Err(_) => {
                let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "record store did not answer in time");
                return Err(StoreError::Io(err).into());
            }
        };
        info!("✅ Stored generated content {} ({} platforms, degraded: {:?})", doc_id, body.content.platforms.len(), body.degraded);
        Ok(GenerationRecord { doc_id, body })
    }

    /// Prior analysis from the caller wins; otherwise ask the vision service,
    /// and carry on without image context if it cannot answer.
    async fn image_context(&self, request: &GenerationRequest) -> Option<ImageAnalysis> {
        if let Some(analysis) = &request.image_analysis {
            return Some(analysis.clone());
        }
        match self.bounded(self.caps.image_analyzer.detect_labels_and_colors(&request.image_url)).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("⚠️ Image analysis unavailable, generating without it: {}", e);
                None
            }
        }
    }

    async fn generate_base(
        &self,
        request: &GenerationRequest,
        image_analysis: Option<&ImageAnalysis>,
    ) -> Result<(PlatformContent, ContentSource), PipelineError> {
        let context = GenerationContext {
            product: &request.product_data,
            image_url: &request.image_url,
            image_analysis,
            voice_transcript: request.voice_transcript.as_deref(),
        };
        match self.bounded(self.caps.generator.generate(&context)).await {
            Ok(content) => Ok((content, ContentSource::Generated)),
            Err(CapabilityError::MalformedResponse(reason)) => {
                warn!("🔄 Generator output unreadable ({}), using templated content", reason);
                Ok((fallback_content(&request.product_data), ContentSource::Fallback))
            }
            Err(e) => Err(PipelineError::upstream(StageKind::Generation, e)),
        }
    }

    async fn run_stage(
        &self,
        kind: StageKind,
        content: &PlatformContent,
        request: &GenerationRequest,
    ) -> Result<StageOutput, CapabilityError> {
        match kind {
            StageKind::Moderation => self.moderate(content).await,
            StageKind::LinguisticAnalysis => {
                let text = content.captions().collect::<Vec<_>>().join(" ");
                let analysis = self.bounded(self.caps.analyzer.analyze(&text)).await?;
                Ok(StageOutput::Analysis(analysis.normalized()))
            }
            StageKind::Translation => self.translate(content).await,
            StageKind::AnalyticsPrediction => {
                let prediction = self.bounded(self.caps.predictor.predict(content, &request.product_data.category)).await?;
                Ok(StageOutput::Prediction(prediction))
            }
            StageKind::Generation => Err(CapabilityError::Other("generation is not an enrichment stage".into())),
        }
    }

    /// All platforms are moderated or none are: the first failure discards
    /// every redaction made so far.
    async fn moderate(&self, content: &PlatformContent) -> Result<StageOutput, CapabilityError> {
        let mut moderated = content.clone();
        let mut outcome = ModerationOutcome::default();
        for (platform, post) in moderated.platforms.iter_mut() {
            let report = self.bounded(self.caps.moderator.moderate(&post.caption)).await?;
            post.caption = redact(&post.caption, &report.findings);
            if !report.findings.is_empty() {
                info!("🛡️ Redacted {} finding(s) on {}", report.findings.len(), platform);
            }
            outcome.platforms.insert(platform.clone(), report.findings);
        }
        Ok(StageOutput::Moderated { content: moderated, outcome })
    }

    async fn translate(&self, content: &PlatformContent) -> Result<StageOutput, CapabilityError> {
        let platform = &self.settings.primary_platform;
        let post = content.platforms.get(platform)
            .ok_or_else(|| CapabilityError::Other(format!("primary platform '{}' missing from generated content", platform)))?;

        let mut tasks = JoinSet::new();
        for language in &self.settings.target_languages {
            let translator = Arc::clone(&self.caps.translator);
            let post = post.clone();
            let language = language.clone();
            let timeout = self.settings.call_timeout;
            tasks.spawn(async move {
                let result = translate_post(translator.as_ref(), &post, &language, timeout).await;
                (language, result)
            });
        }

        let mut languages = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((language, Ok(translated))) => {
                    languages.insert(language, translated);
                }
                Ok((language, Err(e))) => warn!("⚠️ Translation to '{}' failed: {}", language, e),
                Err(e) => warn!("⚠️ Translation task aborted: {}", e),
            }
        }

        if languages.is_empty() {
            return Err(CapabilityError::Other("no target language could be translated".into()));
        }
        let wanted: BTreeSet<&String> = self.settings.target_languages.iter().collect();
        let missing = wanted.into_iter().filter(|l| !languages.contains_key(*l)).cloned().collect();
        info!("🌐 Translated {} content into {} language(s)", platform, languages.len());

        Ok(StageOutput::Translations {
            set: TranslationSet { source_platform: platform.clone(), languages },
            missing,
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CapabilityError>
    where
        F: Future<Output = Result<T, CapabilityError>>,
    {
        with_timeout(self.settings.call_timeout, call).await
    }
}

async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, CapabilityError>
where
    F: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout(limit)),
    }
}

async fn translate_post(
    translator: &dyn Translator,
    post: &PlatformPost,
    language: &str,
    limit: Duration,
) -> Result<PlatformPost, CapabilityError> {
    let caption = with_timeout(limit, translator.translate(&post.caption, language)).await?;
    let mut hashtags = Vec::with_capacity(post.hashtags.len());
    for tag in &post.hashtags {
        let translated = with_timeout(limit, translator.translate(tag.trim_start_matches('#'), language)).await?;
        hashtags.push(as_hashtag(&translated));
    }
    Ok(PlatformPost { caption, hashtags })
}

/// Re-attach the marker and squeeze out whitespace so the tag stays one token.
pub fn as_hashtag(translated: &str) -> String {
    let compact: String = translated.chars().filter(|c| !c.is_whitespace()).collect();
    format!("#{}", compact.trim_start_matches('#'))
}

fn validate(request: &GenerationRequest) -> Result<(), PipelineError> {
    let product = &request.product_data;
    if product.title.trim().is_empty() {
        return Err(PipelineError::Validation("productData.title is required".into()));
    }
    if product.category.trim().is_empty() {
        return Err(PipelineError::Validation("productData.category is required".into()));
    }
    validate_image_url(&request.image_url)
}

pub fn validate_image_url(image_url: &str) -> Result<(), PipelineError> {
    if image_url.trim().is_empty() {
        return Err(PipelineError::Validation("imageUrl is required".into()));
    }
    let url = Url::parse(image_url.trim())
        .map_err(|e| PipelineError::Validation(format!("imageUrl is not a valid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" | "gs" if url.host_str().is_some() => Ok(()),
        scheme => Err(PipelineError::Validation(format!("imageUrl must be an http(s) or gs:// location, got '{}'", scheme))),
    }
}
