//! HTTP provider adapters.
//!
//! Wraps the clients from the `providers` crate in [`NarrativeBackend`] and
//! translates their errors. Nothing provider-specific leaks past this file.

use super::backend::{BackendError, Generation, GenerationRequest, NarrativeBackend};
use super::prompt::Prompt;
use async_trait::async_trait;
use providers::{Claude, Gemini, Llama, OpenAi, TextRequest};

const MAX_TOKENS: usize = 1024;
const LLAMA_MAX_TOKENS: usize = 512;
const TEMPERATURE: f32 = 0.7;

/// The closed set of shipped providers.
#[derive(Clone)]
pub enum ProviderBackend {
    Claude(Claude),
    OpenAi(OpenAi),
    /// OpenRouter speaks the OpenAI protocol.
    OpenRouter(OpenAi),
    Gemini(Gemini),
    Llama(Llama),
}

impl ProviderBackend {
    /// The registry identifier this provider is normally registered under.
    pub fn default_id(&self) -> &'static str {
        match self {
            ProviderBackend::Claude(_) => "claude",
            ProviderBackend::OpenAi(_) => "openai",
            ProviderBackend::OpenRouter(_) => "openrouter",
            ProviderBackend::Gemini(_) => "gemini",
            ProviderBackend::Llama(_) => "llama",
        }
    }
}

#[async_trait]
impl NarrativeBackend for ProviderBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        let completion = match self {
            ProviderBackend::Claude(client) => client.complete(&text_request(&request.prompt)).await,
            ProviderBackend::OpenAi(client) | ProviderBackend::OpenRouter(client) => {
                client.complete(&text_request(&request.prompt)).await
            }
            ProviderBackend::Gemini(client) => client.complete(&text_request(&request.prompt)).await,
            ProviderBackend::Llama(client) => client.complete(&llama_request(&request.prompt)).await,
        }
        .map_err(map_error)?;

        Ok(Generation::text(completion.text))
    }
}

fn text_request(prompt: &Prompt) -> TextRequest {
    TextRequest::new(&prompt.user)
        .with_system(&prompt.system)
        .with_max_tokens(MAX_TOKENS)
        .with_temperature(TEMPERATURE)
}

/// Local models get the flattened prompt framed as a dialogue.
fn llama_request(prompt: &Prompt) -> TextRequest {
    TextRequest::new(prompt.flatten())
        .with_max_tokens(LLAMA_MAX_TOKENS)
        .with_temperature(TEMPERATURE)
        .with_stop("Human:")
        .with_stop("Assistant:")
}

fn map_error(err: providers::Error) -> BackendError {
    use providers::Error;

    match err {
        Error::NoApiKey(var) => BackendError::Unavailable(format!("{var} is not set")),
        Error::Config(message) => BackendError::Unavailable(message),
        Error::Network(message) => BackendError::Transport(message),
        Error::Timeout => BackendError::Transport("provider request timed out".to_string()),
        Error::Parse(message) => BackendError::Malformed(message),
        Error::Api { status, message } => match status {
            401 | 403 => BackendError::Auth(message),
            429 => BackendError::RateLimited(message),
            _ => BackendError::Transport(format!("status {status}: {message}")),
        },
    }
}
