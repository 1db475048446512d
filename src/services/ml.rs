//! ML extraction service client
//!
//! Single HTTP call per artifact to the Python extraction service.
//! Transcription of long videos can take minutes, hence the generous
//! client-side timeout. No retries: a failed extraction fails the
//! pipeline run and surfaces through the content record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

use crate::types::AtheneumError;

/// Request sent to `POST {base}/extract`
#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    file_url: &'a str,
    content_id: &'a str,
    content_type: &'a str,
}

/// Success envelope returned by the ML service
#[derive(Debug, Deserialize)]
struct ExtractEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<MlExtraction>,
}

/// Extracted fields returned by the ML service
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MlExtraction {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    /// Document structure (headings/sections), shape owned by the extractor
    #[serde(default)]
    pub structure: Option<Value>,

    /// Extractor-specific metadata (page count, language, thumbnail, ...)
    #[serde(default)]
    pub metadata: Option<Value>,

    /// Video duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    /// Detected language, for transcripts
    #[serde(default)]
    pub language: Option<String>,

    /// Generated thumbnail, when the extractor produced one
    #[serde(default)]
    pub thumbnail_url: Option<String>,

    #[serde(default)]
    pub thumbnail_public_id: Option<String>,
}

/// Client for the external ML extraction service
#[derive(Clone)]
pub struct MlClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlClient {
    /// Create a new client with the given extraction timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AtheneumError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AtheneumError::Ml(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Extract text/summary/topics/keywords from a file or external URL
    pub async fn extract(
        &self,
        file_url: &str,
        content_id: &str,
        content_type: &str,
    ) -> Result<MlExtraction, AtheneumError> {
        let url = format!("{}/extract", self.base_url);
        info!(content_id, content_type, "Calling ML service for extraction");

        let response = self
            .http
            .post(&url)
            .json(&ExtractRequest {
                file_url,
                content_id,
                content_type,
            })
            .send()
            .await
            .map_err(|e| {
                error!(content_id, "ML service call failed: {}", e);
                if e.is_connect() {
                    AtheneumError::Ml(
                        "ML service is not running. Start the extraction service first.".into(),
                    )
                } else if e.is_timeout() {
                    AtheneumError::Ml("ML extraction timed out".into())
                } else {
                    AtheneumError::Ml(format!("ML service call failed: {}", e))
                }
            })?;

        let status = response.status();
        let envelope: ExtractEnvelope = response
            .json()
            .await
            .map_err(|e| AtheneumError::Ml(format!("Invalid ML response: {}", e)))?;

        if !status.is_success() || !envelope.success {
            let message = envelope
                .message
                .unwrap_or_else(|| format!("ML service returned {}", status));
            return Err(AtheneumError::Ml(message));
        }

        envelope
            .data
            .ok_or_else(|| AtheneumError::Ml("ML response missing data payload".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_success_payload() {
        let json = r#"{
            "success": true,
            "data": {
                "text": "full transcript",
                "summary": "short",
                "topics": ["stacks"],
                "keywords": ["lifo"],
                "duration": 312.5,
                "language": "en"
            }
        }"#;
        let envelope: ExtractEnvelope = serde_json::from_str(json).unwrap();
        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data.topics, vec!["stacks"]);
        assert_eq!(data.duration, Some(312.5));
    }

    #[test]
    fn envelope_parses_error_payload() {
        let json = r#"{"success": false, "message": "unsupported format"}"#;
        let envelope: ExtractEnvelope = serde_json::from_str(json).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("unsupported format"));
        assert!(envelope.data.is_none());
    }
}
