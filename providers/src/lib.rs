//! Minimal HTTP clients for the narrative model providers.
//!
//! Every client exposes the same single-shot text completion:
//! a [`TextRequest`] goes in, a [`Completion`] comes out. Streaming and
//! tool use are deliberately absent; the game only needs one block of
//! narration per player command.
//!
//! - [`Claude`]: Anthropic Messages API
//! - [`OpenAi`]: OpenAI Chat Completions, also used for OpenRouter
//! - [`Gemini`]: Google `generateContent`
//! - [`Llama`]: a local llama.cpp server (`/completion`)

mod anthropic;
mod gemini;
mod llama;
mod openai;

pub use anthropic::Claude;
pub use gemini::Gemini;
pub use llama::Llama;
pub use openai::OpenAi;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to a provider.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured (set {0})")]
    NoApiKey(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of an API error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// A provider-neutral text completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    /// Framing instructions (sent as the system prompt where supported).
    pub system: Option<String>,
    /// The user-visible prompt body.
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
    /// Stop sequences, honoured by providers that support them.
    pub stop: Vec<String>,
}

impl TextRequest {
    /// Create a request with the given prompt body.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: Some(0.7),
            stop: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }

    /// System and prompt joined into one block, for providers without a
    /// separate system channel.
    pub fn flattened(&self) -> String {
        match &self.system {
            Some(system) => format!("{system}\n\n{}", self.prompt),
            None => self.prompt.clone(),
        }
    }
}

/// The text a provider produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
}

/// Token usage information, when the provider reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    tracing::debug!(status, "provider returned an error status");
    Err(Error::Api { status, message })
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = TextRequest::new("Where am I?")
            .with_system("You are the station")
            .with_max_tokens(256)
            .with_temperature(0.2)
            .with_stop("Human:");

        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.stop, vec!["Human:".to_string()]);
        assert_eq!(request.flattened(), "You are the station\n\nWhere am I?");
    }

    #[test]
    fn test_flattened_without_system() {
        let request = TextRequest::new("look");
        assert_eq!(request.flattened(), "look");
    }

    #[test]
    fn test_error_status() {
        let err = Error::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(Error::Timeout.status(), None);
    }
}
