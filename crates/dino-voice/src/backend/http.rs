//! HTTP adapter for the voice-cloning synthesis server.
//!
//! Wire format:
//!
//! - `GET {base}/status` → `{"available": bool}`
//! - `POST {base}/synthesize` with `{"text", "speed"}` →
//!   `{"available", "sampleRate", "samples"}`

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{SampleResponse, SynthesisBackend};
use crate::error::VoiceError;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    available: bool,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    speed: f32,
}

/// Synthesis backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSynthesisBackend {
    client: Client,
    base_url: String,
}

impl HttpSynthesisBackend {
    /// Create a backend for `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .build()
            .map_err(|e| VoiceError::backend("client setup", e))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a backend sharing an existing client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for HttpSynthesisBackend {
    async fn probe(&self) -> Result<(), VoiceError> {
        let url = self.endpoint("status");
        tracing::debug!(%url, "Probing synthesis backend");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| VoiceError::backend("status", e))?;
        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::backend("status", e))?;

        if status.available {
            Ok(())
        } else {
            Err(VoiceError::SynthesisError(
                "backend reports it is unavailable".to_string(),
            ))
        }
    }

    async fn request_samples(&self, text: &str, speed: f32) -> Result<SampleResponse, VoiceError> {
        let url = self.endpoint("synthesize");
        tracing::debug!(%url, chars = text.chars().count(), speed, "Requesting samples");

        let response = self
            .client
            .post(&url)
            .json(&SynthesizeRequest { text, speed })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| VoiceError::backend("synthesize", e))?;

        response
            .json::<SampleResponse>()
            .await
            .map_err(|e| VoiceError::backend("synthesize", e))
    }
}
