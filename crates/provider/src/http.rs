//! REST client for an HTTP generation provider.
//!
//! Endpoints: `POST {base}/v1/generate` and `POST {base}/v1/moderations`,
//! authenticated with a bearer key when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use genflow_core::output::ProviderOutput;
use serde_json::json;

use crate::client::{GenerationClient, Moderation, ProviderRequest};
use crate::error::ProviderError;

/// HTTP client for a single provider deployment.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpGenerationClient {
    /// Create a client for `base_url` (e.g. `https://provider.example`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key, timeout))
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            ProviderError::Request(err)
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, or an [`ProviderError::Api`]
    /// with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Interpret a 2xx body: JSON when it parses, plain text otherwise.
pub(crate) fn parse_output(body: &str) -> Result<ProviderOutput, ProviderError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::Malformed("empty body".to_string()));
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => Ok(ProviderOutput::Structured(value)),
        Err(_) => Ok(ProviderOutput::Text(trimmed.to_string())),
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let response = Self::ensure_success(self.post("/v1/generate", &body).await?).await?;
        let text = response.text().await.map_err(|e| self.classify(e))?;
        parse_output(&text)
    }

    async fn moderate(&self, text: &str) -> Result<Moderation, ProviderError> {
        let response =
            Self::ensure_success(self.post("/v1/moderations", &json!({ "input": text })).await?)
                .await?;
        response
            .json::<Moderation>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn json_body_is_structured() {
        let out = parse_output(r#"{"images":["a"]}"#).unwrap();
        assert_matches!(out, ProviderOutput::Structured(v) if v["images"][0] == "a");
    }

    #[test]
    fn non_json_body_is_text() {
        assert_eq!(
            parse_output("  once upon a time ").unwrap(),
            ProviderOutput::Text("once upon a time".to_string())
        );
    }

    #[test]
    fn empty_body_is_malformed() {
        assert_matches!(parse_output("   "), Err(ProviderError::Malformed(_)));
    }
}
