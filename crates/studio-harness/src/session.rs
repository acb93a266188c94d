use std::sync::Arc;

use crate::harness::HarnessInner;
use crate::model::ModelRef;
use crate::run::RunBuilder;

/// Configuration used to create a `Session`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Label used in logs.
    pub name: String,
}

impl SessionConfig {
    /// Creates a named session config.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Groups the runs of one conversation under a shared id.
///
/// Conversation history is supplied per run by the caller; the session keeps
/// no transcript of its own.
#[derive(Clone)]
pub struct Session {
    harness: Arc<HarnessInner>,
    session_id: uuid::Uuid,
    config: SessionConfig,
}

impl Session {
    pub(crate) fn new(harness: Arc<HarnessInner>, config: SessionConfig) -> Self {
        Self {
            harness,
            session_id: uuid::Uuid::new_v4(),
            config,
        }
    }

    /// Random id assigned when the session was created.
    pub fn id(&self) -> uuid::Uuid {
        self.session_id
    }

    /// Name from the session's config; shows up in run logs.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Starts building a run against `model`.
    pub fn run(&self, model: ModelRef) -> RunBuilder {
        RunBuilder::new(
            self.harness.clone(),
            self.session_id,
            self.config.name.clone(),
            model,
        )
    }
}
