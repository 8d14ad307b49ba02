use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::capabilities::{AudioInput, ImageAnalyzer, LanguageHints, RecordStore, Transcriber};
use crate::error::{error_response, PipelineError};
use crate::models::{
    AnalyzeImageRequest, GenerationRecord, GenerationRequest, ScheduleAck, ScheduleRequest, TranscribeRequest,
    TranscribeResponse,
};
use crate::pipeline::{validate_image_url, Orchestrator};

/// Uploaded photos and voice notes travel inline as base64.
const BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub image_analyzer: Arc<dyn ImageAnalyzer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub store: Arc<dyn RecordStore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/generate-content", post(generate_content))
        .route("/api/content/:id", get(get_content))
        .route("/api/analyze-image", post(analyze_image))
        .route("/api/transcribe-audio", post(transcribe_audio))
        .route("/api/schedule-post", post(schedule_post))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate_content(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationRecord>, Response> {
    let Json(body) = payload.map_err(|e| PipelineError::Validation(e.body_text()).into_response())?;
    state.orchestrator.run(&body).await.map(Json).map_err(IntoResponse::into_response)
}

pub async fn get_content(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    match state.store.get(id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("❌ Failed to read record {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read generated content", e)
        }
    }
}

pub async fn analyze_image(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeImageRequest>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "Invalid request", e.body_text()),
    };
    if let Err(e) = validate_image_url(&body.image_url) {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid imageUrl parameter", e);
    }

    tracing::info!("🖼️ Analyzing image: {}", body.image_url);
    match state.image_analyzer.detect_labels_and_colors(&body.image_url).await {
        Ok(analysis) => Json(analysis).into_response(),
        Err(e) => {
            tracing::error!("❌ Error analyzing image: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to analyze image", e)
        }
    }
}

pub async fn transcribe_audio(
    State(state): State<AppState>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "Invalid request", e.body_text()),
    };
    if body.audio_content.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing audioContent parameter", "audioContent is required");
    }
    if let Err(e) = base64::engine::general_purpose::STANDARD.decode(body.audio_content.trim()) {
        return error_response(StatusCode::BAD_REQUEST, "audioContent must be base64 encoded", e);
    }

    let audio = AudioInput {
        content: body.audio_content.trim().to_string(),
        encoding: body.encoding,
        sample_rate_hertz: body.sample_rate_hertz,
    };
    let hints = LanguageHints {
        language_code: body.language_code,
        alternatives: body.alternative_language_codes,
    };

    match state.transcriber.transcribe(&audio, &hints).await {
        Ok(transcript) => Json(TranscribeResponse { transcript }).into_response(),
        Err(e) => {
            tracing::error!("❌ Error transcribing audio: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to transcribe audio", e)
        }
    }
}

/// Acknowledges a scheduling request. Nothing is actually queued for posting.
pub async fn schedule_post(payload: Result<Json<ScheduleRequest>, JsonRejection>) -> Response {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "Invalid request", e.body_text()),
    };

    let date = body.date.filter(|d| !d.trim().is_empty());
    let time = body.time.filter(|t| !t.trim().is_empty());
    let platforms = body.platforms.filter(|p| !p.is_empty());
    let content = body.content.filter(|c| !c.is_null());

    let (Some(date), Some(time), Some(platforms), Some(_content)) = (date, time, platforms, content) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields",
            "date, time, platforms, and content are required",
        );
    };

    let ack = ScheduleAck {
        message: "Post scheduled successfully".to_string(),
        schedule_id: format!("scheduled_{}", Uuid::new_v4().simple()),
        scheduled_time: format!("{} {}", date.trim(), time.trim()),
    };
    tracing::info!("🗓️ Scheduled post {} for {} on {}", ack.schedule_id, ack.scheduled_time, platforms.join(", "));
    Json(ack).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureFlags;
    use crate::test_support::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn app(harness: &Harness) -> Router {
        build_router(AppState {
            orchestrator: Arc::new(harness.orchestrator()),
            image_analyzer: harness.image_analyzer.clone(),
            transcriber: harness.transcriber.clone(),
            store: harness.store.clone(),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request builder must not fail"),
            None => builder.body(Body::empty()).expect("request builder must not fail"),
        };
        let response = app.oneshot(request).await.expect("handler should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body must be collected");
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    #[tokio::test]
    async fn generate_then_fetch_record() {
        let harness = Harness::new().with_generated_caption("Call me at 555-123-4567");
        harness.moderator.flag("555-123-4567", "PHONE_NUMBER");

        let body = serde_json::to_value(request(FeatureFlags { moderation: true, ..Default::default() })).unwrap();
        let (status, record) = send(app(&harness), "POST", "/api/generate-content", Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["platforms"]["instagram"]["caption"], json!("Call me at [REDACTED]"));
        assert!(record.get("nlpAnalysis").is_none());
        let id = record["docId"].as_str().expect("docId is a string").to_string();

        let (status, fetched) = send(app(&harness), "GET", &format!("/api/content/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["docId"], json!(id));
        assert_eq!(harness.store.persist_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn legacy_payload_without_image_url_is_rejected() {
        let harness = Harness::new();
        let body = json!({
            "productData": { "title": "Clay Pot", "category": "pottery" },
            "imageUrl": "",
            "activeServices": { "dlp": true }
        });
        let (status, value) = send(app(&harness), "POST", "/api/generate-content", Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["kind"], json!("validation_error"));
        assert!(value["details"].as_str().unwrap().contains("imageUrl"));
        assert_eq!(harness.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_json_gets_error_body() {
        let harness = Harness::new();
        let (status, value) = send(app(&harness), "POST", "/api/generate-content", Some(json!({ "imageUrl": 7 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["error"].is_string());
        assert!(value["details"].is_string());
    }

    #[tokio::test]
    async fn analysis_outage_maps_to_bad_gateway() {
        let harness = Harness::new();
        harness.analyzer.fail.store(true, Ordering::SeqCst);
        let body = serde_json::to_value(request(FeatureFlags { linguistic_analysis: true, ..Default::default() })).unwrap();

        let (status, value) = send(app(&harness), "POST", "/api/generate-content", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(value["kind"], json!("upstream_unavailable"));
    }

    #[tokio::test]
    async fn unknown_record_is_404() {
        let harness = Harness::new();
        let (status, _) = send(app(&harness), "GET", &format!("/api/content/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn analyze_image_returns_labels() {
        let harness = Harness::new();
        let body = json!({ "imageUrl": "https://storage.example.com/pot.jpg" });
        let (status, value) = send(app(&harness), "POST", "/api/analyze-image", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["labels"][0]["description"], json!("Earthenware"));

        let (status, value) = send(app(&harness), "POST", "/api/analyze-image", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(value["error"].is_string());
    }

    #[tokio::test]
    async fn transcribe_validates_audio_and_applies_defaults() {
        let harness = Harness::new();
        let (status, _) = send(app(&harness), "POST", "/api/transcribe-audio", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app(&harness), "POST", "/api/transcribe-audio", Some(json!({ "audioContent": "not base64!!" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, value) = send(app(&harness), "POST", "/api/transcribe-audio", Some(json!({ "audioContent": "aGVsbG8=" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["transcript"], json!("8 bytes of WEBM_OPUS in hi-IN"));

        harness.transcriber.fail.store(true, Ordering::SeqCst);
        let (status, value) = send(app(&harness), "POST", "/api/transcribe-audio", Some(json!({ "audioContent": "aGVsbG8=" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value["error"], json!("Failed to transcribe audio"));
    }

    #[tokio::test]
    async fn schedule_requires_all_fields() {
        let harness = Harness::new();
        let (status, value) = send(app(&harness), "POST", "/api/schedule-post", Some(json!({ "date": "2026-11-02", "time": "19:00" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value["error"], json!("Missing required fields"));

        let body = json!({
            "date": "2026-11-02",
            "time": "19:00",
            "platforms": ["instagram"],
            "content": { "caption": "Diwali diyas, hand painted" }
        });
        let (status, value) = send(app(&harness), "POST", "/api/schedule-post", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["scheduledTime"], json!("2026-11-02 19:00"));
        assert!(value["scheduleId"].as_str().unwrap().starts_with("scheduled_"));
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let harness = Harness::new();
        let (status, value) = send(app(&harness), "GET", "/api/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value, json!({ "status": "ok" }));
    }
}
