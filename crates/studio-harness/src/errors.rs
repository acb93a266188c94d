use crate::model::ProviderId;

/// Failures reported by a provider adapter, before normalization for the run
/// stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The vendor rejected the request or reported an error event.
    #[error("provider error ({provider}): {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// Connection or body read failed.
    #[error("transport error ({provider}): {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// Frames or event ordering did not match the vendor protocol.
    #[error("protocol error ({provider}): {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// Message without the provider prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }

    /// HTTP status for request-level rejections.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

/// Terminal failure carried by `StreamEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    #[error("provider failure ({provider}): {message}")]
    Provider { provider: String, message: String },
    #[error("transport failure ({provider}): {message}")]
    Transport { provider: String, message: String },
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    #[error("run cancelled")]
    Cancelled,
}

impl RunFailure {
    /// Short text suitable for a chat transcript entry.
    pub fn display_message(&self) -> String {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message } => message.clone(),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Error type of the public harness API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: ProviderId },
    #[error(transparent)]
    Provider(ProviderError),
    #[error(transparent)]
    RunFailed(RunFailure),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl HarnessError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// True when the run ended because the caller aborted it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::RunFailed(RunFailure::Cancelled))
    }
}

impl From<RunFailure> for HarnessError {
    fn from(value: RunFailure) -> Self {
        Self::RunFailed(value)
    }
}

impl From<&ProviderError> for RunFailure {
    fn from(err: &ProviderError) -> Self {
        match err {
            ProviderError::Provider {
                provider, message, ..
            } => Self::Provider {
                provider: provider.to_string(),
                message: message.clone(),
            },
            ProviderError::Transport { provider, message } => Self::Transport {
                provider: provider.to_string(),
                message: message.clone(),
            },
            ProviderError::Protocol { provider, message } => Self::Protocol {
                message: format!("provider={provider}: {message}"),
            },
        }
    }
}
