use std::collections::HashMap;
use std::pin::Pin;

use crate::content::{ChatTurn, Usage};
use crate::errors::ProviderError;
use crate::model::{ModelRef, ProviderId, RunOptions};

/// Vendor-neutral event decoded from a provider stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Next text fragment of the assistant reply.
    TextDelta { text: String },
    /// Stop reason and/or token usage reported mid-stream.
    MessageDelta {
        finish_reason: Option<String>,
        usage: Option<Usage>,
    },
    /// Vendor signalled the end of the message.
    Completed,
}

/// Everything an adapter needs to start one streamed call.
#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub run_id: uuid::Uuid,
    pub session_id: uuid::Uuid,
    pub model: ModelRef,
    pub system_prompt: Option<String>,
    /// Prior turns followed by the new user turn, oldest first.
    pub turns: Vec<ChatTurn>,
    pub options: RunOptions,
    /// Adapter-specific options keyed by provider id.
    pub vendor_options: HashMap<ProviderId, serde_json::Value>,
}

/// Response metadata available once the stream is established.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderResponseMeta {
    /// Vendor request id, when the response carries one.
    pub request_id: Option<String>,
}

pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static>>;

/// Established provider stream.
pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub metadata: ProviderResponseMeta,
}

/// Contract implemented by every vendor integration.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Sends the request and returns the decoded event stream. Request-level
    /// rejections (auth, bad model, HTTP status) are returned here rather
    /// than through the stream.
    async fn start_stream(&self, req: ProviderRequest)
    -> Result<ProviderStreamHandle, ProviderError>;
}
