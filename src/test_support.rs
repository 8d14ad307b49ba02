//! In-process fakes for every capability, shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::capabilities::*;
use crate::error::{CapabilityError, StoreError};
use crate::models::*;
use crate::pipeline::{Capabilities, Orchestrator, PipelineSettings};
use crate::prediction::SimulatedPredictor;
use crate::store::MemoryStore;

pub fn request(flags: FeatureFlags) -> GenerationRequest {
    GenerationRequest {
        product_data: ProductData {
            title: "Clay Pot".into(),
            category: "pottery".into(),
            description: "Hand thrown terracotta water pot".into(),
            artisan_name: "Meera".into(),
            location: "Khurja".into(),
        },
        image_url: "https://storage.example.com/uploads/clay-pot.jpg".into(),
        image_analysis: None,
        voice_transcript: None,
        flags,
    }
}

pub fn content_with_caption(caption: &str) -> PlatformContent {
    let mut platforms = BTreeMap::new();
    for (name, tags) in [
        ("instagram", vec!["#Handmade", "#Terracotta Art"]),
        ("facebook", vec!["#SupportLocal"]),
        ("linkedin", vec!["#RuralLivelihoods"]),
    ] {
        platforms.insert(name.to_string(), PlatformPost {
            caption: caption.to_string(),
            hashtags: tags.into_iter().map(String::from).collect(),
        });
    }
    PlatformContent { platforms }
}

pub enum GeneratorBehavior {
    Content(PlatformContent),
    Malformed,
    Unavailable,
}

pub struct FakeGenerator {
    behavior: Mutex<GeneratorBehavior>,
    pub calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn set(&self, behavior: GeneratorBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn content(&self) -> PlatformContent {
        match &*self.behavior.lock() {
            GeneratorBehavior::Content(c) => c.clone(),
            _ => PlatformContent::default(),
        }
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, _context: &GenerationContext<'_>) -> Result<PlatformContent, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.behavior.lock() {
            GeneratorBehavior::Content(c) => Ok(c.clone()),
            GeneratorBehavior::Malformed => Err(CapabilityError::MalformedResponse("not json".into())),
            GeneratorBehavior::Unavailable => Err(CapabilityError::Http("status=503".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeImageAnalyzer {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageAnalyzer for FakeImageAnalyzer {
    async fn detect_labels_and_colors(&self, _image_url: &str) -> Result<ImageAnalysis, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CapabilityError::Http("status=500".into()));
        }
        Ok(ImageAnalysis {
            labels: vec![ImageLabel { description: "Earthenware".into(), score: 0.93 }],
            ..Default::default()
        })
    }
}

/// Flags every occurrence of the registered quotes.
#[derive(Default)]
pub struct FakeModerator {
    rules: Mutex<Vec<(String, String)>>,
    fail_after: Mutex<Option<usize>>,
    pub calls: AtomicUsize,
}

impl FakeModerator {
    pub fn flag(&self, quote: &str, category: &str) {
        self.rules.lock().push((quote.to_string(), category.to_string()));
    }

    /// Succeed for the first `n` calls, then fail.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }
}

#[async_trait]
impl Moderator for FakeModerator {
    async fn moderate(&self, text: &str) -> Result<ModerationReport, CapabilityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if matches!(*self.fail_after.lock(), Some(n) if call >= n) {
            return Err(CapabilityError::Http("status=429".into()));
        }
        let findings: Vec<ModerationFinding> = self.rules.lock().iter()
            .flat_map(|(quote, category)| {
                text.match_indices(quote.as_str()).map(move |(start, m)| ModerationFinding {
                    span_start: start,
                    span_end: start + m.len(),
                    matched_text: m.to_string(),
                    category: category.clone(),
                })
            })
            .collect();
        Ok(ModerationReport { redacted_text: crate::redaction::redact(text, &findings), findings })
    }
}

#[derive(Default)]
pub struct FakeAnalyzer {
    pub fail: AtomicBool,
    pub delay_secs: AtomicU64,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageAnalyzer for FakeAnalyzer {
    async fn analyze(&self, text: &str) -> Result<LinguisticAnalysis, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(text.to_string());
        let delay = self.delay_secs.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CapabilityError::Http("status=503".into()));
        }
        Ok(LinguisticAnalysis {
            sentiment: Sentiment { score: 0.6, magnitude: 1.2 },
            ..Default::default()
        })
    }
}

/// Appends the language code after a space, so hashtags need compacting.
#[derive(Default)]
pub struct FakeTranslator {
    failing: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn fail_language(&self, language: &str) {
        self.failing.lock().insert(language.to_string());
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(target_language) {
            return Err(CapabilityError::Http(format!("unsupported language {}", target_language)));
        }
        Ok(format!("{} {}", text, target_language))
    }
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub fail: AtomicBool,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &AudioInput, hints: &LanguageHints) -> Result<String, CapabilityError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CapabilityError::Http("status=400".into()));
        }
        Ok(format!("{} bytes of {} in {}", audio.content.len(), audio.encoding, hints.language_code))
    }
}

/// Memory store that counts writes and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub fail: AtomicBool,
    pub persist_calls: AtomicUsize,
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn persist(&self, body: &RecordBody) -> Result<Uuid, StoreError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.persist(body).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationRecord>, StoreError> {
        self.inner.get(id).await
    }
}

pub struct Harness {
    pub generator: Arc<FakeGenerator>,
    pub image_analyzer: Arc<FakeImageAnalyzer>,
    pub moderator: Arc<FakeModerator>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub translator: Arc<FakeTranslator>,
    pub transcriber: Arc<FakeTranscriber>,
    pub store: Arc<CountingStore>,
    pub settings: PipelineSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            generator: Arc::new(FakeGenerator {
                behavior: Mutex::new(GeneratorBehavior::Content(content_with_caption("Fresh from the kiln in Khurja"))),
                calls: AtomicUsize::new(0),
            }),
            image_analyzer: Arc::default(),
            moderator: Arc::default(),
            analyzer: Arc::default(),
            translator: Arc::default(),
            transcriber: Arc::default(),
            store: Arc::default(),
            settings: PipelineSettings {
                primary_platform: "instagram".into(),
                target_languages: ["hi", "bn", "ta", "te", "mr", "gu"].iter().map(|s| s.to_string()).collect(),
                call_timeout: Duration::from_secs(5),
            },
        }
    }

    pub fn with_generated_caption(self, caption: &str) -> Self {
        self.generator.set(GeneratorBehavior::Content(content_with_caption(caption)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.call_timeout = timeout;
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            generator: self.generator.clone(),
            image_analyzer: self.image_analyzer.clone(),
            moderator: self.moderator.clone(),
            analyzer: self.analyzer.clone(),
            translator: self.translator.clone(),
            predictor: Arc::new(SimulatedPredictor::with_seed(42)),
            store: self.store.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.capabilities(), self.settings.clone())
    }
}
