//! AI narration.
//!
//! - [`backend`]: the [`NarrativeBackend`] trait and its request/response types
//! - [`prompt`]: pure prompt construction
//! - [`registry`]: backend identifiers, the registry, demotion policies
//! - [`narrator`]: timeouts, fallback text and failure accounting
//! - [`adapters`]: the HTTP providers as backends

pub mod adapters;
pub mod backend;
pub mod narrator;
pub mod prompt;
pub mod registry;

pub use adapters::ProviderBackend;
pub use backend::{BackendError, Generation, GenerationRequest, NarrativeBackend, NarrativeContext};
pub use narrator::{
    BackendSelection, Narration, NarrationSource, Narrator, DEFAULT_TIMEOUT, FALLBACK_NARRATION,
};
pub use prompt::{Prompt, PromptBuilder, DEFAULT_FRAMING};
pub use registry::{
    BackendId, BackendRegistry, DemotionPolicy, NoDemotion, RegistryError, ThresholdDemotion,
};
