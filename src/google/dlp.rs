use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use serde_with::{serde_as, DisplayFromStr};
use tracing::info;

use super::GoogleApi;
use crate::capabilities::Moderator;
use crate::error::CapabilityError;
use crate::models::{ModerationFinding, ModerationReport};
use crate::redaction::redact;

const INFO_TYPES: [&str; 5] = [
    "PHONE_NUMBER",
    "EMAIL_ADDRESS",
    "PERSON_NAME",
    "CREDIT_CARD_NUMBER",
    "US_SOCIAL_SECURITY_NUMBER",
];

/// Sensitive-data moderation backed by Cloud DLP `content:inspect`.
pub struct DlpModerator {
    api: GoogleApi,
    base_url: String,
    project_id: String,
}

impl DlpModerator {
    pub fn new(api: GoogleApi, base_url: String, project_id: String) -> Self {
        Self { api, base_url, project_id }
    }
}

#[async_trait]
impl Moderator for DlpModerator {
    async fn moderate(&self, text: &str) -> Result<ModerationReport, CapabilityError> {
        if self.api.is_demo() {
            info!("Using demo mode - skipping DLP inspection");
            return Ok(ModerationReport { redacted_text: text.to_string(), findings: vec![] });
        }

        let info_types: Vec<_> = INFO_TYPES.iter().map(|name| json!({ "name": name })).collect();
        let body = json!({
            "inspectConfig": {
                "infoTypes": info_types,
                "includeQuote": true,
                "minLikelihood": "POSSIBLE"
            },
            "item": { "value": text }
        });

        let url = format!("{}/projects/{}/locations/global/content:inspect", self.base_url, self.project_id);
        let response: InspectResponse = self.api.post_json(&url, &body).await?;
        let findings = into_findings(response);
        if !findings.is_empty() {
            info!("🛡️ DLP flagged {} finding(s)", findings.len());
        }
        Ok(ModerationReport { redacted_text: redact(text, &findings), findings })
    }
}

fn into_findings(response: InspectResponse) -> Vec<ModerationFinding> {
    response.result.findings.into_iter()
        .map(|f| ModerationFinding {
            span_start: f.location.byte_range.start,
            span_end: f.location.byte_range.end,
            matched_text: f.quote,
            category: f.info_type.name,
        })
        .collect()
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize, Default)]
struct InspectResponse {
    #[serde(default)]
    result: InspectResult,
}

#[derive(Debug, Deserialize, Default)]
struct InspectResult {
    #[serde(default)]
    findings: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Finding {
    #[serde(default)]
    quote: String,
    #[serde(default)]
    info_type: InfoType,
    #[serde(default)]
    location: Location,
}

#[derive(Debug, Deserialize, Default)]
struct InfoType {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Location {
    #[serde(default)]
    byte_range: ByteRange,
}

/// int64 fields arrive as JSON strings; a zero `start` is omitted entirely.
#[serde_as]
#[derive(Debug, Deserialize, Default)]
struct ByteRange {
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    start: usize,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    end: usize,
}
