use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::messaging::provider::{ProviderKind, TransportProvider};

/// Registry mapping provider kinds to transport providers
///
/// Fill it before serving traffic, then share it read-only behind an `Arc`.
#[derive(Default)]
pub struct TransportRegistry {
    providers: HashMap<ProviderKind, Arc<dyn TransportProvider>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under its own kind; the last registration wins
    pub fn register(&mut self, provider: Arc<dyn TransportProvider>) -> &mut Self {
        let kind = provider.kind();
        self.register_as(kind, provider)
    }

    /// Register a provider under an explicit kind; the last registration wins
    pub fn register_as(&mut self, kind: ProviderKind, provider: Arc<dyn TransportProvider>) -> &mut Self {
        let name = provider.name();
        if self.providers.insert(kind, provider).is_some() {
            tracing::debug!(%kind, provider = name, "Transport provider replaced");
        } else {
            tracing::debug!(%kind, provider = name, "Transport provider registered");
        }
        self
    }

    /// Look up the provider registered for `kind`
    pub fn resolve(&self, kind: ProviderKind) -> AppResult<Arc<dyn TransportProvider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::UnknownProvider {
                identifier: kind.to_string(),
            })
    }

    /// Parse a provider name and look it up
    pub fn resolve_name(&self, name: &str) -> AppResult<Arc<dyn TransportProvider>> {
        let kind: ProviderKind = name.parse()?;
        self.resolve(kind)
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Registered kinds, in declaration order
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }
}
