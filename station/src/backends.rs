//! Provider discovery from the environment.

use providers::{Claude, Gemini, Llama, OpenAi};
use station_core::ai::{BackendRegistry, ProviderBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// Register every provider whose credentials are present.
///
/// A llama server is only registered when its `/health` endpoint answers.
pub async fn registry_from_env() -> BackendRegistry {
    let mut registry = BackendRegistry::new();

    let candidates = [
        Claude::from_env().map(ProviderBackend::Claude),
        OpenAi::from_env().map(ProviderBackend::OpenAi),
        OpenAi::openrouter_from_env().map(ProviderBackend::OpenRouter),
        Gemini::from_env().map(ProviderBackend::Gemini),
    ];
    for candidate in candidates {
        match candidate {
            Ok(backend) => register(&mut registry, backend),
            Err(e) => info!(error = %e, "Provider not configured"),
        }
    }

    match Llama::from_env() {
        Ok(llama) => match llama.health().await {
            Ok(()) => register(&mut registry, ProviderBackend::Llama(llama)),
            Err(e) => warn!(url = llama.base_url(), error = %e, "Llama server is not healthy"),
        },
        Err(e) => info!(error = %e, "Provider not configured"),
    }

    if registry.is_empty() {
        warn!("No narrative backends configured; every narration will fall back");
    }
    registry
}

fn register(registry: &mut BackendRegistry, backend: ProviderBackend) {
    let id = backend.default_id();
    info!(backend = id, "Registered narrative backend");
    registry.register(id, Arc::new(backend));
}
