//! Local llama.cpp server client.
//!
//! Talks to the `/completion` endpoint of `llama-server`. The server has no
//! system channel, so the request is flattened into a single prompt.

use crate::{check_status, http_client, Completion, Error, TextRequest, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for a llama.cpp HTTP server.
#[derive(Clone)]
pub struct Llama {
    client: reqwest::Client,
    base_url: String,
}

impl Llama {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(300)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `LLAMA_SERVER_URL`.
    pub fn from_env() -> Result<Self, Error> {
        let url =
            std::env::var("LLAMA_SERVER_URL").map_err(|_| Error::NoApiKey("LLAMA_SERVER_URL"))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Config(format!("LLAMA_SERVER_URL is not an http URL: {url}")));
        }
        Ok(Self::new(url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the server's `/health` endpoint.
    pub async fn health(&self) -> Result<(), Error> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(Error::from_reqwest)?;
        check_status(response).await.map(|_| ())
    }

    pub async fn complete(&self, request: &TextRequest) -> Result<Completion, Error> {
        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&build_api_request(request))
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let api_response: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(Completion {
            text: api_response.content.trim().to_string(),
            model: api_response.model.unwrap_or_else(|| "llama".to_string()),
            usage: Some(Usage {
                input_tokens: api_response.tokens_evaluated,
                output_tokens: api_response.tokens_predicted,
            }),
        })
    }
}

fn build_api_request(request: &TextRequest) -> CompletionRequest {
    CompletionRequest {
        prompt: request.flattened(),
        n_predict: request.max_tokens,
        temperature: request.temperature,
        stop: request.stop.clone(),
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tokens_predicted: usize,
    #[serde(default)]
    tokens_evaluated: usize,
}
