//! Provider lookup table.
//!
//! Populated once at startup; unknown identifiers are rejected at resolve
//! time with the list of registered providers, so misconfiguration surfaces
//! before any audio is dispatched.

use crate::error::{LongscribeError, Result};
use crate::stt::transcriber::Transcriber;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps provider identifiers to transcriber capabilities.
#[derive(Default)]
pub struct TranscriberRegistry {
    providers: HashMap<String, Arc<dyn Transcriber>>,
}

impl TranscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transcriber under its own `provider_id`.
    ///
    /// Registering the same id twice replaces the earlier entry.
    pub fn register(&mut self, transcriber: Arc<dyn Transcriber>) {
        self.providers
            .insert(transcriber.provider_id().to_string(), transcriber);
    }

    /// Builder-style registration for startup tables.
    pub fn with_provider(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.register(transcriber);
        self
    }

    /// Looks up a provider by identifier.
    pub fn resolve(&self, provider_id: &str) -> Result<Arc<dyn Transcriber>> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| LongscribeError::UnknownProvider {
                provider: provider_id.to_string(),
                known: self.provider_ids().join(", "),
            })
    }

    /// Registered identifiers, sorted.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
