//! OpenAI Chat Completions client.
//!
//! OpenRouter speaks the same protocol, so [`OpenAi::openrouter`] is the
//! same client pointed at a different base URL.

use crate::{check_status, env_or, http_client, Completion, Error, TextRequest, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_BASE: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o";

/// Client for any OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAi {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAi {
    /// Create an OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(Duration::from_secs(120)),
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: OPENAI_BASE.to_string(),
        }
    }

    /// Create an OpenRouter client with the given API key.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .with_base_url(OPENROUTER_BASE)
            .with_model(DEFAULT_OPENROUTER_MODEL)
    }

    /// `OPENAI_API_KEY`, optional `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self, Error> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| Error::NoApiKey("OPENAI_API_KEY"))?;
        Ok(Self::new(api_key).with_model(env_or("OPENAI_MODEL", DEFAULT_OPENAI_MODEL)))
    }

    /// `OPENROUTER_API_KEY`, optional `OPENROUTER_MODEL`.
    pub fn openrouter_from_env() -> Result<Self, Error> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::NoApiKey("OPENROUTER_API_KEY"))?;
        Ok(Self::openrouter(api_key)
            .with_model(env_or("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL)))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat completion and return the first choice's text.
    pub async fn complete(&self, request: &TextRequest) -> Result<Completion, Error> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_api_request(request))
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let api_response: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        parse_response(api_response)
    }

    fn build_api_request(&self, request: &TextRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: (!request.stop.is_empty()).then(|| request.stop.clone()),
        }
    }
}

fn parse_response(response: ChatResponse) -> Result<Completion, Error> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::Parse("response contained no choices".to_string()))?;

    Ok(Completion {
        text,
        model: response.model.unwrap_or_default(),
        usage: response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
