//! Integration tests that call real model providers.
//!
//! These tests need provider credentials (via .env file or environment).
//! Run with: `cargo test -p station-core --test api_integration -- --ignored`
//!
//! They are marked #[ignore] by default to avoid API costs in CI and
//! failures when no key is available.

use station_core::ai::{BackendRegistry, ProviderBackend};
use station_core::testing::{airlock_world, assert_narrated};
use station_core::{EngineConfig, GameEngine, MemoryStorage};
use std::sync::Arc;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

fn engine_with(id: &str, backend: ProviderBackend) -> GameEngine {
    let registry = BackendRegistry::new().with_backend(id, Arc::new(backend));
    let config = EngineConfig::new().with_default_backend(id).with_demotion_threshold(0);
    let narrator = Arc::new(config.narrator(registry));
    GameEngine::new(
        Arc::new(airlock_world()),
        narrator,
        Arc::new(MemoryStorage::new()),
        config,
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -p station-core --test api_integration -- --ignored
async fn test_claude_narrates_a_look() {
    setup();
    let Ok(client) = providers::Claude::from_env() else {
        eprintln!("Skipping test: ANTHROPIC_API_KEY not set");
        return;
    };

    let engine = engine_with("claude", ProviderBackend::Claude(client));
    let session = engine.start_session().await.session_id;
    engine
        .process_command(session, "/select-class hunter")
        .await
        .expect("class selection");

    let response = engine
        .process_command(session, "look around the airlock")
        .await
        .expect("engine should respond");

    assert_narrated(&response);
    assert!(!response.narrative.is_empty());
    assert_eq!(response.snapshot.turn_count, 4);
}

#[tokio::test]
#[ignore]
async fn test_llama_server_narrates_a_look() {
    setup();
    let Ok(client) = providers::Llama::from_env() else {
        eprintln!("Skipping test: LLAMA_SERVER_URL not set");
        return;
    };
    if client.health().await.is_err() {
        eprintln!("Skipping test: llama server is not healthy");
        return;
    }

    let engine = engine_with("llama", ProviderBackend::Llama(client));
    let session = engine.start_session().await.session_id;
    let response = engine
        .process_command(session, "listen at the outer door")
        .await
        .expect("engine should respond");

    assert_narrated(&response);
    assert!(!response.narrative.contains("Human:"));
}
