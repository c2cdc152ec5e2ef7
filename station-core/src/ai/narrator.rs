//! The narrator: one explicit AI context per process.
//!
//! A [`Narrator`] owns the backend registry, the prompt builder, the
//! demotion policy and the call timeout. It holds no per-session state; each
//! session carries its own [`BackendSelection`] and hands it in on every
//! call.

use super::backend::{BackendError, Generation, GenerationRequest, NarrativeContext};
use super::prompt::PromptBuilder;
use super::registry::{BackendId, BackendRegistry, DemotionPolicy, NoDemotion, RegistryError};
use crate::player::StatDelta;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Returned whenever no backend produced narration.
pub const FALLBACK_NARRATION: &str = "[Station AI offline] Static hisses over the comm channel. \
     The station's narrator cannot be reached right now; nothing around you has changed. \
     Try again in a moment.";

/// Default time allowed for one generation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which backend a session talks to, and how it has been doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelection {
    pub active: BackendId,
    /// Not persisted.
    pub consecutive_failures: u32,
}

impl BackendSelection {
    pub fn new(active: impl Into<BackendId>) -> Self {
        Self {
            active: active.into(),
            consecutive_failures: 0,
        }
    }
}

/// Where narration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationSource {
    Backend(BackendId),
    Fallback { reason: BackendError },
}

/// The result of a narration request. Always carries text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub text: String,
    pub delta: Option<StatDelta>,
    pub source: NarrationSource,
}

impl Narration {
    fn fallback(reason: BackendError) -> Self {
        Self {
            text: FALLBACK_NARRATION.to_string(),
            delta: None,
            source: NarrationSource::Fallback { reason },
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, NarrationSource::Fallback { .. })
    }
}

pub struct Narrator {
    registry: BackendRegistry,
    prompts: PromptBuilder,
    policy: Box<dyn DemotionPolicy>,
    timeout: Duration,
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("registry", &self.registry)
            .field("prompts", &self.prompts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Narrator {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry,
            prompts: PromptBuilder::default(),
            policy: Box::new(NoDemotion),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_policy(mut self, policy: impl DemotionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Point `selection` at another backend. History is untouched.
    pub fn switch(
        &self,
        selection: &mut BackendSelection,
        id: impl Into<BackendId>,
    ) -> Result<(), RegistryError> {
        let id = self.registry.resolve(id)?;
        info!(from = %selection.active, to = %id, "Switched narrative backend");
        selection.active = id;
        selection.consecutive_failures = 0;
        Ok(())
    }

    /// Generate narration for `context` with the session's active backend.
    ///
    /// Never fails: any backend error becomes [`FALLBACK_NARRATION`]. Errors
    /// count towards demotion; a success resets the count.
    pub async fn narrate(
        &self,
        selection: &mut BackendSelection,
        context: NarrativeContext,
    ) -> Narration {
        let prompt = self.prompts.build(&context);
        let request = GenerationRequest { context, prompt };
        let active = selection.active.clone();

        match self.call(&active, &request).await {
            Ok(generation) => {
                selection.consecutive_failures = 0;
                debug!(backend = %active, chars = generation.text.len(), "Narration generated");
                Narration {
                    text: generation.text,
                    delta: generation.delta,
                    source: NarrationSource::Backend(active),
                }
            }
            Err(err) => {
                selection.consecutive_failures = selection.consecutive_failures.saturating_add(1);
                warn!(
                    backend = %active,
                    failures = selection.consecutive_failures,
                    error = %err,
                    "Narrative backend failed, using fallback"
                );
                if let Some(next) =
                    self.policy
                        .demote(&active, selection.consecutive_failures, &self.registry)
                {
                    info!(from = %active, to = %next, "Demoting narrative backend");
                    selection.active = next;
                    selection.consecutive_failures = 0;
                }
                Narration::fallback(err)
            }
        }
    }

    async fn call(
        &self,
        id: &BackendId,
        request: &GenerationRequest,
    ) -> Result<Generation, BackendError> {
        let backend = self
            .registry
            .get(id)
            .ok_or_else(|| BackendError::Unavailable(format!("{id} is not registered")))?;
        if !backend.is_available() {
            return Err(BackendError::Unavailable(format!("{id} is not available")));
        }

        let generation = tokio::time::timeout(self.timeout, backend.generate(request))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        let text = generation.text.trim();
        if text.is_empty() {
            return Err(BackendError::Malformed("empty narration".to_string()));
        }
        Ok(Generation {
            text: text.to_string(),
            delta: generation.delta,
        })
    }

    /// Close every registered backend.
    pub async fn shutdown(&self) {
        for (id, backend) in self.registry.backends() {
            debug!(backend = %id, "Closing narrative backend");
            backend.close().await;
        }
        info!(backends = self.registry.len(), "Narrator shut down");
    }
}
