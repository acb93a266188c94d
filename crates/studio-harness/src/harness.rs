use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::HarnessError;
use crate::model::ProviderId;
use crate::provider::ProviderAdapter;
use crate::session::{Session, SessionConfig};

pub(crate) struct HarnessInner {
    providers: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl HarnessInner {
    pub(crate) fn provider(&self, id: &ProviderId) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(id).cloned()
    }
}

/// Registry of provider adapters; entry point for sessions.
#[derive(Clone)]
pub struct Harness {
    inner: Arc<HarnessInner>,
}

impl Harness {
    /// Starts a builder for registering providers and creating a `Harness`.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Creates a session that groups related runs under one name.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::new(self.inner.clone(), config)
    }

    /// Whether an adapter is registered under `id`.
    pub fn has_provider(&self, id: &ProviderId) -> bool {
        self.inner.providers.contains_key(id)
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl HarnessBuilder {
    /// Adds an adapter. Ids must be unique across the harness.
    pub fn register_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the harness, rejecting duplicate provider ids.
    pub fn build(self) -> Result<Harness, HarnessError> {
        let mut providers = HashMap::with_capacity(self.providers.len());
        for provider in self.providers {
            let id = provider.id();
            if providers.contains_key(&id) {
                return Err(HarnessError::Config(format!(
                    "duplicate provider registration: {id}"
                )));
            }
            providers.insert(id, provider);
        }
        Ok(Harness {
            inner: Arc::new(HarnessInner { providers }),
        })
    }
}
