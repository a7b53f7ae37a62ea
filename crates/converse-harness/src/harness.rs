use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::HarnessError;
use crate::model::ProviderKind;
use crate::provider::ProviderAdapter;

/// Registry of provider adapters keyed by [`ProviderKind`].
#[derive(Clone)]
pub struct Harness {
    providers: Arc<HashMap<ProviderKind, Arc<dyn ProviderAdapter>>>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Returns the adapter registered for `kind`.
    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>, HarnessError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(HarnessError::ProviderNotFound { provider: kind })
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }
}

/// Builder used to register provider adapters before creating a `Harness`.
#[derive(Default)]
pub struct HarnessBuilder {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl HarnessBuilder {
    /// Registers a provider adapter. One adapter per kind.
    pub fn register_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the harness, rejecting duplicate kinds.
    pub fn build(self) -> Result<Harness, HarnessError> {
        let mut map: HashMap<ProviderKind, Arc<dyn ProviderAdapter>> = HashMap::new();
        for provider in self.providers {
            let kind = provider.kind();
            if map.insert(kind, provider).is_some() {
                return Err(HarnessError::Config(format!(
                    "duplicate provider registration: {kind}"
                )));
            }
        }
        Ok(Harness {
            providers: Arc::new(map),
        })
    }
}
