//! REST adapters for the Google Cloud AI services.
//!
//! All of them authenticate with an API key passed as the `key` query
//! parameter and share one [`GoogleApi`] transport. With the `DEMO_KEY` key
//! every adapter answers locally with placeholder data.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::{mask_key, DEMO_KEY};
use crate::error::CapabilityError;

pub mod dlp;
pub mod language;
pub mod speech;
pub mod translate;
pub mod vision;

pub use dlp::DlpModerator;
pub use language::LanguageClient;
pub use speech::SpeechClient;
pub use translate::TranslateClient;
pub use vision::VisionClient;

#[derive(Clone)]
pub struct GoogleApi {
    client: Client,
    api_key: String,
    timeout: Duration,
}

impl GoogleApi {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, CapabilityError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key, timeout })
    }

    pub fn is_demo(&self) -> bool {
        self.api_key == DEMO_KEY
    }

    pub(crate) async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, CapabilityError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        info!("🔗 Making request to: {}?key={}", url, mask_key(&self.api_key));

        let response = self.client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| CapabilityError::transport(e, self.timeout))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| CapabilityError::transport(e, self.timeout))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| text.clone());
            error!("❌ Google API error {} from {}: {}", status, url, message);
            return Err(CapabilityError::Http(format!("status={} message={}", status, message)));
        }

        serde_json::from_str(&text)
            .map_err(|e| CapabilityError::MalformedResponse(format!("{}: {}", url, e)))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::StageKind;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn refused_connection_does_not_expose_key() {
        let api = GoogleApi::new("SECRETKEY123".into(), Duration::from_secs(2)).unwrap();
        let err = api.post_json::<_, Value>("http://127.0.0.1:9/v1/images:annotate", &json!({})).await.unwrap_err();

        assert!(matches!(err, CapabilityError::Http(_)));
        let message = PipelineError::upstream(StageKind::Moderation, err).to_string();
        assert!(!message.contains("SECRETKEY123"), "key leaked: {}", message);
    }

    #[tokio::test]
    async fn silent_server_is_a_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let limit = Duration::from_millis(200);
        let api = GoogleApi::new("SECRETKEY123".into(), limit).unwrap();
        let err = api.post_json::<_, Value>(&format!("http://{}/v1/speech:recognize", addr), &json!({})).await.unwrap_err();

        assert!(matches!(err, CapabilityError::Timeout(d) if d == limit), "got {:?}", err);
        server.abort();
    }
}
