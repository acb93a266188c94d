use crate::{RunOutput, errors::RunFailure, model::ProviderId};

/// Normalized events yielded by `RunStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Always first.
    RunStarted {
        run_id: uuid::Uuid,
        session_id: uuid::Uuid,
        provider: ProviderId,
        model: String,
    },
    OutputDelta {
        run_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Terminal success with the aggregated output.
    Completed {
        run_id: uuid::Uuid,
        output: RunOutput,
    },
    /// Terminal failure.
    Error {
        run_id: uuid::Uuid,
        error: RunFailure,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}
