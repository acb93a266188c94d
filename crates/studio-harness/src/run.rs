use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::content::{ChatTurn, RunOutput, Usage};
use crate::errors::{HarnessError, RunFailure};
use crate::harness::HarnessInner;
use crate::model::{ModelRef, ProviderId, RunOptions};
use crate::provider::{ProviderAdapter, ProviderEvent, ProviderRequest};
use crate::stream::StreamEvent;

/// Requests cancellation of a running stream.
///
/// The run ends with `StreamEvent::Error { error: RunFailure::Cancelled }`.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Configures and starts one model call.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    session_id: uuid::Uuid,
    session_name: String,
    model: ModelRef,
    system_prompt: Option<String>,
    history: Vec<ChatTurn>,
    user_parts: Vec<String>,
    options: RunOptions,
    vendor_options: HashMap<ProviderId, serde_json::Value>,
}

impl RunBuilder {
    pub(crate) fn new(
        harness: Arc<HarnessInner>,
        session_id: uuid::Uuid,
        session_name: String,
        model: ModelRef,
    ) -> Self {
        Self {
            harness,
            session_id,
            session_name,
            model,
            system_prompt: None,
            history: Vec::new(),
            user_parts: Vec::new(),
            options: RunOptions::default(),
            vendor_options: HashMap::new(),
        }
    }

    pub fn system_prompt(mut self, text: impl Into<String>) -> Self {
        self.system_prompt = Some(text.into());
        self
    }

    /// Appends text to the new user turn. Multiple parts are joined by newlines.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.user_parts.push(text.into());
        self
    }

    /// Prior conversation, oldest first. Blank turns are dropped.
    pub fn history(mut self, turns: impl IntoIterator<Item = ChatTurn>) -> Self {
        self.history
            .extend(turns.into_iter().filter(|t| !t.content.trim().is_empty()));
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    pub(crate) fn set_vendor_options_json(
        mut self,
        provider: ProviderId,
        value: serde_json::Value,
    ) -> Self {
        self.vendor_options.insert(provider, value);
        self
    }

    #[cfg(test)]
    pub(crate) fn vendor_options_value(&self, provider: &ProviderId) -> Option<&serde_json::Value> {
        self.vendor_options.get(provider)
    }

    /// Validates the run and spawns it. Events arrive as `RunStarted`, zero or
    /// more `OutputDelta`, then exactly one `Completed` or `Error`.
    pub async fn start_stream(self) -> Result<RunStream, HarnessError> {
        let harness = self.harness.clone();
        let session_name = self.session_name.clone();
        let request = self.into_request()?;
        let provider = harness
            .provider(&request.model.provider)
            .ok_or_else(|| HarnessError::ProviderNotFound {
                provider: request.model.provider.clone(),
            })?;

        let (tx, rx) = mpsc::channel(request.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        info!(
            run_id = %request.run_id,
            session = %session_name,
            model = %request.model,
            turns = request.turns.len(),
            "starting run"
        );

        let stream = RunStream {
            run_id: request.run_id,
            session_id: request.session_id,
            model: request.model.clone(),
            rx,
            final_rx,
            abort_handle: AbortHandle {
                tx: Arc::new(abort_tx),
            },
            saw_terminal: false,
        };
        let sink = RunSink {
            run_id: request.run_id,
            tx,
            final_tx: Some(final_tx),
        };
        tokio::spawn(run_task(provider, request, sink, abort_rx));
        Ok(stream)
    }

    pub async fn collect_output(self) -> Result<RunOutput, HarnessError> {
        self.start_stream().await?.finish().await
    }

    /// Non-streaming shortcut returning the full reply text.
    pub async fn collect_text(self) -> Result<String, HarnessError> {
        Ok(self.collect_output().await?.text)
    }

    fn into_request(self) -> Result<ProviderRequest, HarnessError> {
        if self.model.provider.as_str().trim().is_empty() {
            return Err(HarnessError::Validation(
                "model provider must not be empty".into(),
            ));
        }
        if self.model.model.trim().is_empty() {
            return Err(HarnessError::Validation("model must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(HarnessError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.options.max_tokens == 0 {
            return Err(HarnessError::Validation(
                "max_tokens must be greater than 0".into(),
            ));
        }
        if self.user_parts.is_empty() {
            return Err(HarnessError::Validation(
                "a user message is required".into(),
            ));
        }
        if self.user_parts.iter().any(|p| p.trim().is_empty()) {
            return Err(HarnessError::Validation(
                "user message must not be empty".into(),
            ));
        }

        let mut turns = self.history;
        turns.push(ChatTurn::user(self.user_parts.join("\n")));

        Ok(ProviderRequest {
            run_id: uuid::Uuid::new_v4(),
            session_id: self.session_id,
            model: self.model,
            system_prompt: self.system_prompt.filter(|s| !s.trim().is_empty()),
            turns,
            options: self.options,
            vendor_options: self.vendor_options,
        })
    }
}

/// Consumer side of a running model call.
pub struct RunStream {
    run_id: uuid::Uuid,
    session_id: uuid::Uuid,
    model: ModelRef,
    rx: mpsc::Receiver<StreamEvent>,
    final_rx: oneshot::Receiver<Result<RunOutput, HarnessError>>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Next event, or `None` once the run task has closed the channel.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if event.as_ref().is_some_and(StreamEvent::is_terminal) {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains remaining events and returns the run result.
    pub async fn finish(mut self) -> Result<RunOutput, HarnessError> {
        while !self.saw_terminal {
            match self.next_event().await {
                Some(_) => {}
                None => break,
            }
        }
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::protocol_msg(format!(
                "run task ended without final result ({})",
                self.model
            ))),
        }
    }
}

// Event channel plus the one-shot final result of a run.
struct RunSink {
    run_id: uuid::Uuid,
    tx: mpsc::Sender<StreamEvent>,
    final_tx: Option<oneshot::Sender<Result<RunOutput, HarnessError>>>,
}

impl RunSink {
    async fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    fn resolve(&mut self, result: Result<RunOutput, HarnessError>) {
        if let Some(final_tx) = self.final_tx.take() {
            let _ = final_tx.send(result);
        }
    }

    async fn fail(&mut self, failure: RunFailure) {
        warn!(run_id = %self.run_id, error = %failure, "run failed");
        let _ = self
            .send(StreamEvent::Error {
                run_id: self.run_id,
                error: failure.clone(),
            })
            .await;
        self.resolve(Err(HarnessError::RunFailed(failure)));
    }

    async fn complete(&mut self, output: RunOutput) {
        let sent = self
            .send(StreamEvent::Completed {
                run_id: self.run_id,
                output: output.clone(),
            })
            .await;
        self.resolve(if sent {
            Ok(output)
        } else {
            Err(HarnessError::protocol_msg(
                "run stream receiver dropped before completion",
            ))
        });
    }
}

#[derive(Default)]
struct Aggregate {
    text: String,
    finish_reason: Option<String>,
    usage: Option<Usage>,
}

impl Aggregate {
    fn into_output(self) -> RunOutput {
        RunOutput {
            text: self.text,
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

async fn run_task(
    provider: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    mut sink: RunSink,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;
    let provider_id = request.model.provider.clone();

    let started = sink
        .send(StreamEvent::RunStarted {
            run_id,
            session_id: request.session_id,
            provider: provider_id.clone(),
            model: request.model.model.clone(),
        })
        .await;
    if !started {
        sink.resolve(Err(HarnessError::protocol_msg(
            "run stream receiver dropped before RunStarted",
        )));
        return;
    }

    let handle = tokio::select! {
        biased;
        _ = wait_for_abort(&mut abort_rx) => {
            sink.fail(RunFailure::Cancelled).await;
            return;
        }
        started = provider.start_stream(request) => started,
    };
    let mut handle = match handle {
        Ok(handle) => handle,
        Err(err) => {
            sink.fail(RunFailure::from(&err)).await;
            return;
        }
    };
    if let Some(request_id) = &handle.metadata.request_id {
        debug!(run_id = %run_id, request_id = %request_id, "provider stream established");
    }

    let mut seq = 0_u64;
    let mut aggregate = Aggregate::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = wait_for_abort(&mut abort_rx) => {
                sink.fail(RunFailure::Cancelled).await;
                return;
            }
            next = handle.stream.next() => next,
        };

        match next {
            Some(Ok(ProviderEvent::TextDelta { text })) => {
                if text.is_empty() {
                    continue;
                }
                debug!(run_id = %run_id, provider = %provider_id, seq, bytes = text.len(), "text delta");
                aggregate.text.push_str(&text);
                let sent = sink
                    .send(StreamEvent::OutputDelta { run_id, seq, text })
                    .await;
                seq = seq.saturating_add(1);
                if !sent {
                    sink.resolve(Err(HarnessError::protocol_msg(
                        "run stream receiver dropped during output",
                    )));
                    return;
                }
            }
            Some(Ok(ProviderEvent::MessageDelta {
                finish_reason,
                usage,
            })) => {
                if finish_reason.is_some() {
                    aggregate.finish_reason = finish_reason;
                }
                if let Some(usage) = usage {
                    aggregate.usage.get_or_insert_with(Usage::default).merge(usage);
                }
            }
            Some(Ok(ProviderEvent::Completed)) => {
                info!(run_id = %run_id, deltas = seq, finish_reason = ?aggregate.finish_reason, "run completed");
                sink.complete(aggregate.into_output()).await;
                return;
            }
            Some(Err(err)) => {
                sink.fail(RunFailure::from(&err)).await;
                return;
            }
            None => {
                sink.fail(RunFailure::Protocol {
                    message: format!("provider stream ended without completion ({provider_id})"),
                })
                .await;
                return;
            }
        }
    }
}

// Resolves once abort is requested; pends forever if every handle is dropped.
async fn wait_for_abort(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|aborted| *aborted).await.is_err() {
        std::future::pending::<()>().await;
    }
}
