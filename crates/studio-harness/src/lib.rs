//! Async streaming LLM harness with a builder-first API.
//!
//! Vendor integrations live under `vendors::*`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studio_harness::prelude::*;
//! use studio_harness::vendors::anthropic::{AnthropicProvider, DEFAULT_MODEL};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let harness = Harness::builder()
//!     .register_provider(Arc::new(AnthropicProvider::from_env()?))
//!     .build()?;
//!
//! let text = harness
//!     .session(SessionConfig::named("demo"))
//!     .run(ModelRef::new("anthropic", DEFAULT_MODEL))
//!     .system_prompt("Answer briefly.")
//!     .user_text("Say hello")
//!     .collect_text()
//!     .await?;
//!
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

/// `RunStream` to session-driver bridge.
pub mod bridge;
/// Conversation turns and run output.
pub mod content;
pub mod errors;
/// Provider registry and builder.
pub mod harness;
/// Provider/model identifiers and run options.
pub mod model;
pub mod prelude;
/// Contract implemented by vendor adapters.
pub mod provider;
/// Run builder, run stream and abort handle.
pub mod run;
pub mod session;
/// Normalized run events.
pub mod stream;
pub mod vendors;

pub use content::{ChatTurn, RunOutput, TurnRole, Usage};
pub use errors::{HarnessError, ProviderError, RunFailure};
pub use harness::{Harness, HarnessBuilder};
pub use model::{ModelRef, ProviderId, RunOptions};
pub use provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
};
pub use run::{AbortHandle, RunBuilder, RunStream};
pub use session::{Session, SessionConfig};
pub use stream::StreamEvent;
