use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got `{value}`")]
    Invalid { name: &'static str, expected: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoogleEndpoints {
    pub vision: String,
    pub language: String,
    pub translate: String,
    pub dlp: String,
    pub speech: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub google_api_key: String,
    pub google_project_id: String,
    pub endpoints: GoogleEndpoints,
    pub primary_platform: String,
    pub target_languages: Vec<String>,
    pub source_language: String,
    pub call_timeout: Duration,
    pub content_store_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = match get("PORT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name: "PORT", expected: "a port number", value: v })?,
            None => 8080,
        };

        let timeout_secs: u64 = match get("EXTERNAL_CALL_TIMEOUT_SECS") {
            Some(v) => match v.parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::Invalid { name: "EXTERNAL_CALL_TIMEOUT_SECS", expected: "a positive number of seconds", value: v }),
            },
            None => 30,
        };

        let languages_raw = or("TARGET_LANGUAGES", "hi,bn,ta,te,mr,gu");
        let target_languages = parse_list(&languages_raw);
        if target_languages.is_empty() {
            return Err(ConfigError::Invalid { name: "TARGET_LANGUAGES", expected: "a comma separated list of language codes", value: languages_raw });
        }

        Ok(Self {
            port,
            gemini_api_key: or("GEMINI_API_KEY", DEMO_KEY),
            gemini_api_base: or("GEMINI_API_BASE", "https://generativelanguage.googleapis.com/v1beta"),
            gemini_model: or("GEMINI_MODEL", "gemini-1.5-flash"),
            google_api_key: or("GOOGLE_API_KEY", DEMO_KEY),
            google_project_id: or("GOOGLE_CLOUD_PROJECT_ID", "demo-project"),
            endpoints: GoogleEndpoints {
                vision: or("VISION_API_BASE", "https://vision.googleapis.com/v1"),
                language: or("LANGUAGE_API_BASE", "https://language.googleapis.com/v1"),
                translate: or("TRANSLATE_API_BASE", "https://translation.googleapis.com/language/translate/v2"),
                dlp: or("DLP_API_BASE", "https://dlp.googleapis.com/v2"),
                speech: or("SPEECH_API_BASE", "https://speech.googleapis.com/v1"),
            },
            primary_platform: or("PRIMARY_PLATFORM", "instagram"),
            target_languages,
            source_language: or("SOURCE_LANGUAGE", "en"),
            call_timeout: Duration::from_secs(timeout_secs),
            content_store_dir: get("CONTENT_STORE_DIR").map(PathBuf::from),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

/// Mask all but the first few characters of a key for logging.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}***", visible)
}
