use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::ProviderId;
use crate::content::{ChatTurn, TurnRole};
use crate::errors::{HarnessError, ProviderError};
use crate::provider::{
    ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta, ProviderStreamHandle,
};

use super::ANTHROPIC_PROVIDER;
use super::config::AnthropicClientConfig;
use super::options::AnthropicRequestOptions;
use super::transport::{SseDecoder, SseFrame, error_message, map_anthropic_frame};

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Streaming adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicClientConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "Anthropic client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build Anthropic client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Uses `ANTHROPIC_API_KEY` (and `ANTHROPIC_BASE_URL` when set).
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(AnthropicClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(ANTHROPIC_PROVIDER)
    }

    async fn start_stream(
        &self,
        req: ProviderRequest,
    ) -> Result<ProviderStreamHandle, ProviderError> {
        let provider_id = self.id();
        let options = read_options(&req, &provider_id)?;
        let body = build_request_body(&req, &options)?;
        debug!(
            run_id = %req.run_id,
            session_id = %req.session_id,
            model = %req.model.model,
            max_tokens = req.options.max_tokens,
            "starting Anthropic messages stream"
        );

        let mut http_req = self
            .client
            .post(self.config.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(timeout) = req.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("Anthropic request failed: {e}"))
        })?;
        let status = response.status();
        let request_id = response
            .headers()
            .get("request-id")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        if !status.is_success() {
            let raw = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = serde_json::from_str::<serde_json::Value>(&raw)
                .ok()
                .and_then(|v| error_message(&v).map(ToOwned::to_owned))
                .unwrap_or(raw);
            return Err(ProviderError::provider(
                provider_id,
                format!("Anthropic request failed with status {status}: {message}"),
                Some(status.as_u16()),
            ));
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream());
        Ok(ProviderStreamHandle {
            stream: Box::pin(event_stream(provider_id, bytes)),
            metadata: ProviderResponseMeta { request_id },
        })
    }
}

fn read_options(
    req: &ProviderRequest,
    provider_id: &ProviderId,
) -> Result<AnthropicRequestOptions, ProviderError> {
    match req.vendor_options.get(provider_id) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::protocol(provider_id.clone(), format!("invalid Anthropic options: {e}"))
        }),
        None => Ok(AnthropicRequestOptions::default()),
    }
}

pub(crate) fn build_request_body(
    req: &ProviderRequest,
    options: &AnthropicRequestOptions,
) -> Result<serde_json::Value, ProviderError> {
    let messages = normalize_turns(&req.turns);
    if messages.is_empty() {
        return Err(ProviderError::protocol(
            ANTHROPIC_PROVIDER,
            "request has no user message",
        ));
    }

    let mut body = serde_json::json!({
        "model": req.model.model,
        "max_tokens": req.options.max_tokens,
        "messages": messages,
        "stream": true,
    });
    if let Some(system) = req
        .system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        body["system"] = serde_json::Value::from(system);
    }
    if let Some(temperature) = options.temperature {
        body["temperature"] = serde_json::json!(temperature);
    }
    if !options.stop_sequences.is_empty() {
        body["stop_sequences"] = serde_json::json!(options.stop_sequences);
    }
    Ok(body)
}

// The Messages API wants alternating roles starting with a user turn:
// leading assistant turns are dropped and consecutive same-role turns merged.
fn normalize_turns(turns: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut out: Vec<ChatTurn> = Vec::with_capacity(turns.len());
    for turn in turns {
        if turn.content.trim().is_empty() {
            continue;
        }
        if out.is_empty() && turn.role == TurnRole::Assistant {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => out.push(turn.clone()),
        }
    }
    out
}

fn event_stream(
    provider_id: ProviderId,
    bytes: ByteStream,
) -> impl futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send {
    struct State {
        provider_id: ProviderId,
        bytes: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<ProviderEvent>,
        // Yielded after the events decoded before it.
        failure: Option<ProviderError>,
        exhausted: bool,
    }

    impl State {
        fn enqueue(&mut self, frames: Vec<SseFrame>) {
            for frame in frames {
                match map_anthropic_frame(&self.provider_id, &frame) {
                    Ok(events) => self.pending.extend(events),
                    Err(err) => {
                        self.failure = Some(err);
                        self.exhausted = true;
                        return;
                    }
                }
            }
        }
    }

    stream::try_unfold(
        State {
            provider_id,
            bytes,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            failure: None,
            exhausted: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if let Some(err) = state.failure.take() {
                    return Err(err);
                }
                if state.exhausted {
                    return Ok(None);
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let frames = state.decoder.push_chunk(&chunk);
                        state.enqueue(frames);
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("Anthropic streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        state.exhausted = true;
                        let tail = state.decoder.finish().into_iter().collect();
                        state.enqueue(tail);
                    }
                }
            }
        },
    )
}
