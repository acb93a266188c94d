//! Anthropic Messages API integration.
mod adapter;
mod config;
mod models;
mod options;
pub(crate) mod transport;

pub use adapter::AnthropicProvider;
pub use config::{AnthropicClientConfig, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
pub use models::{AVAILABLE_MODELS, CostTier, DEFAULT_MODEL, ModelInfo, model_info, resolve_model};
pub use options::AnthropicRequestOptions;

use crate::ProviderId;
use crate::errors::HarnessError;
use crate::run::RunBuilder;

pub const ANTHROPIC_PROVIDER: &str = "anthropic";

/// Attaches Anthropic-specific options to a run.
pub trait AnthropicRunBuilderExt {
    /// Stored under the `anthropic` provider key; other adapters ignore it.
    fn anthropic_options(self, options: AnthropicRequestOptions) -> Result<RunBuilder, HarnessError>;
}

impl AnthropicRunBuilderExt for RunBuilder {
    fn anthropic_options(self, options: AnthropicRequestOptions) -> Result<RunBuilder, HarnessError> {
        let value = serde_json::to_value(options)
            .map_err(|e| HarnessError::Validation(format!("invalid Anthropic options: {e}")))?;
        Ok(self.set_vendor_options_json(ProviderId::new(ANTHROPIC_PROVIDER), value))
    }
}
