//! Anthropic Claude Messages API client.

use crate::{check_status, env_or, http_client, Completion, Error, TextRequest, Usage};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(120)),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Create a client from `ANTHROPIC_API_KEY` (and optional `ANTHROPIC_MODEL`).
    pub fn from_env() -> Result<Self, Error> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey("ANTHROPIC_API_KEY"))?;
        Ok(Self::new(api_key).with_model(env_or("ANTHROPIC_MODEL", DEFAULT_MODEL)))
    }

    /// Set the model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API base (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a completion request and return the concatenated text.
    pub async fn complete(&self, request: &TextRequest) -> Result<Completion, Error> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .headers(self.build_headers()?)
            .json(&self.build_api_request(request))
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let api_response: ApiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_response(api_response))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request(&self, request: &TextRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system: request.system.clone(),
            messages: vec![ApiMessage {
                role: "user",
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
            stop_sequences: (!request.stop.is_empty()).then(|| request.stop.clone()),
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Completion {
    let text = api_response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiContent::Text { text } => Some(text),
            ApiContent::Other => None,
        })
        .collect::<Vec<_>>()
        .join("");

    Completion {
        text,
        model: api_response.model,
        usage: Some(Usage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        }),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ApiContent>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Claude::new("test-key");
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_client_with_model() {
        let client = Claude::new("test-key").with_model("claude-3-haiku");
        assert_eq!(client.model(), "claude-3-haiku");
    }

    #[test]
    fn test_api_request_shape() {
        let client = Claude::new("test-key");
        let request = TextRequest::new("Player input: look")
            .with_system("You are the game master")
            .with_stop("Human:");

        let body = serde_json::to_value(client.build_api_request(&request)).unwrap();
        assert_eq!(body["system"], "You are the game master");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Player input: look");
        assert_eq!(body["stop_sequences"][0], "Human:");
    }

    #[test]
    fn test_parse_response_skips_non_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "model": "claude-3-opus-20240229",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "The lights flicker."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let completion = parse_response(parsed);

        assert_eq!(completion.text, "The lights flicker.");
        assert_eq!(completion.usage.unwrap().output_tokens, 4);
    }

    #[test]
    fn test_bad_api_key_header() {
        let client = Claude::new("bad\nkey");
        assert!(matches!(client.build_headers(), Err(Error::Config(_))));
    }
}
