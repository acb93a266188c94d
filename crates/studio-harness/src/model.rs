use std::fmt;
use std::time::Duration;

/// Stable identifier of a provider adapter (e.g. `anthropic`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Creates a provider id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the provider id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Provider plus vendor model name.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelRef {
    pub provider: ProviderId,
    pub model: String,
}

impl ModelRef {
    /// Creates a model reference.
    pub fn new(provider: impl Into<ProviderId>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 128;

/// Vendor-neutral per-run options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Whole-request timeout passed to the transport.
    pub timeout: Option<Duration>,
    /// Capacity of the channel between the run task and the consumer.
    pub stream_buffer_capacity: usize,
    pub max_tokens: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_options_defaults() {
        let options = RunOptions::default();
        assert_eq!(options.stream_buffer_capacity, 128);
        assert_eq!(options.max_tokens, 4096);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn model_ref_display() {
        let model = ModelRef::new("anthropic", "claude-3-5-haiku-20241022");
        assert_eq!(model.to_string(), "anthropic/claude-3-5-haiku-20241022");
    }
}
