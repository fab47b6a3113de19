use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{ModeratorError, Result};
use crate::models::{GroqRequest, GroqResponse};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &GroqRequest) -> Result<GroqResponse>;
}

/// Single-attempt Groq chat transport. The moderation cycle treats any
/// failure here as a model-fault and falls back to a canned verdict, so
/// retrying inside the transport would only stall the request.
pub struct GroqTransport {
    client: Client,
    api_key: String,
}

impl GroqTransport {
    pub fn new(api_key: String, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ModeratorError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl Transport for GroqTransport {
    async fn chat(&self, req: &GroqRequest) -> Result<GroqResponse> {
        let response = self
            .client
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| ModeratorError::ModelCall(format!("Groq request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModeratorError::ModelCall(format!(
                "Groq API returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ModeratorError::ModelCall(format!("Failed to parse Groq response: {e}")))
    }
}
