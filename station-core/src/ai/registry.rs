//! Backend registry and demotion policies.

use super::backend::NarrativeBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Case-insensitive backend identifier (`"claude"`, `"llama"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<BackendId> for String {
    fn from(id: BackendId) -> Self {
        id.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Unknown backend: {0}")]
    UnknownBackend(BackendId),

    #[error("Backend {0} is not available")]
    BackendUnavailable(BackendId),
}

/// Identifier → backend instance.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<BackendId, Arc<dyn NarrativeBackend>>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one with the same id.
    pub fn register(&mut self, id: impl Into<BackendId>, backend: Arc<dyn NarrativeBackend>) {
        self.backends.insert(id.into(), backend);
    }

    pub fn with_backend(
        mut self,
        id: impl Into<BackendId>,
        backend: Arc<dyn NarrativeBackend>,
    ) -> Self {
        self.register(id, backend);
        self
    }

    pub fn get(&self, id: &BackendId) -> Option<&Arc<dyn NarrativeBackend>> {
        self.backends.get(id)
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.backends.contains_key(id)
    }

    /// Whether `id` is registered and reports itself available.
    pub fn is_available(&self, id: &BackendId) -> bool {
        self.get(id).is_some_and(|backend| backend.is_available())
    }

    /// Validate a switch target. Switching never touches history.
    pub fn resolve(&self, id: impl Into<BackendId>) -> Result<BackendId, RegistryError> {
        let id = id.into();
        match self.get(&id) {
            None => Err(RegistryError::UnknownBackend(id)),
            Some(backend) if !backend.is_available() => Err(RegistryError::BackendUnavailable(id)),
            Some(_) => Ok(id),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &BackendId> {
        self.backends.keys()
    }

    pub fn backends(&self) -> impl Iterator<Item = (&BackendId, &Arc<dyn NarrativeBackend>)> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Decides whether repeated failures should move a session to another
/// backend.
pub trait DemotionPolicy: Send + Sync {
    /// Called after each failure with the updated failure count. Returning
    /// `Some` switches the session to that backend and resets the count.
    fn demote(
        &self,
        current: &BackendId,
        consecutive_failures: u32,
        registry: &BackendRegistry,
    ) -> Option<BackendId>;
}

/// Never demote.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDemotion;

impl DemotionPolicy for NoDemotion {
    fn demote(&self, _: &BackendId, _: u32, _: &BackendRegistry) -> Option<BackendId> {
        None
    }
}

/// Demote after `threshold` consecutive failures to the next registered,
/// available backend in `order` (wrapping around).
#[derive(Debug, Clone)]
pub struct ThresholdDemotion {
    threshold: u32,
    order: Vec<BackendId>,
}

impl ThresholdDemotion {
    pub fn new(threshold: u32, order: impl IntoIterator<Item = impl Into<BackendId>>) -> Self {
        Self {
            threshold: threshold.max(1),
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl DemotionPolicy for ThresholdDemotion {
    fn demote(
        &self,
        current: &BackendId,
        consecutive_failures: u32,
        registry: &BackendRegistry,
    ) -> Option<BackendId> {
        if consecutive_failures < self.threshold || self.order.is_empty() {
            return None;
        }

        let start = self
            .order
            .iter()
            .position(|id| id == current)
            .map_or(0, |index| index + 1);

        (0..self.order.len())
            .map(|offset| &self.order[(start + offset) % self.order.len()])
            .find(|id| *id != current && registry.is_available(id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingBackend, ScriptedBackend};

    fn registry() -> BackendRegistry {
        BackendRegistry::new()
            .with_backend("claude", Arc::new(ScriptedBackend::new()))
            .with_backend("llama", Arc::new(ScriptedBackend::new()))
            .with_backend("gemini", Arc::new(FailingBackend::unavailable()))
    }

    #[test]
    fn test_ids_are_case_insensitive() {
        assert_eq!(BackendId::new(" Claude "), BackendId::new("claude"));
        let json = serde_json::to_string(&BackendId::new("LLAMA")).unwrap();
        assert_eq!(json, "\"llama\"");
        let back: BackendId = serde_json::from_str("\"OpenAI\"").unwrap();
        assert_eq!(back.as_str(), "openai");
    }

    #[test]
    fn test_resolve() {
        let registry = registry();
        assert_eq!(registry.resolve("LLAMA"), Ok(BackendId::new("llama")));
        assert_eq!(
            registry.resolve("mistral"),
            Err(RegistryError::UnknownBackend(BackendId::new("mistral")))
        );
        assert_eq!(
            registry.resolve("gemini"),
            Err(RegistryError::BackendUnavailable(BackendId::new("gemini")))
        );
    }

    #[test]
    fn test_threshold_demotion_waits_for_threshold() {
        let registry = registry();
        let policy = ThresholdDemotion::new(3, ["claude", "llama"]);
        let current = BackendId::new("claude");

        assert_eq!(policy.demote(&current, 2, &registry), None);
        assert_eq!(
            policy.demote(&current, 3, &registry),
            Some(BackendId::new("llama"))
        );
    }

    #[test]
    fn test_threshold_demotion_skips_unavailable_and_wraps() {
        let registry = registry();
        let policy = ThresholdDemotion::new(1, ["llama", "gemini", "openai", "claude"]);

        assert_eq!(
            policy.demote(&BackendId::new("llama"), 1, &registry),
            Some(BackendId::new("claude"))
        );
        assert_eq!(
            policy.demote(&BackendId::new("claude"), 1, &registry),
            Some(BackendId::new("llama"))
        );
    }

    #[test]
    fn test_threshold_demotion_with_no_alternative() {
        let registry = BackendRegistry::new().with_backend("claude", Arc::new(ScriptedBackend::new()));
        let policy = ThresholdDemotion::new(1, ["claude", "llama"]);
        assert_eq!(policy.demote(&BackendId::new("claude"), 5, &registry), None);
    }

    #[test]
    fn test_no_demotion() {
        assert_eq!(NoDemotion.demote(&BackendId::new("claude"), 99, &registry()), None);
    }
}
