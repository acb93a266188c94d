use std::time::Duration;

use crate::errors::HarnessError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Connection settings for the Anthropic Messages API.
#[derive(Clone, Debug)]
pub struct AnthropicClientConfig {
    /// Sent as `x-api-key`.
    pub api_key: String,
    /// API root; a proxy or a relay speaking the same event format also works.
    pub base_url: String,
    /// Sent as `anthropic-version`.
    pub api_version: String,
    pub timeout: Duration,
}

impl AnthropicClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Reads `ANTHROPIC_API_KEY` and, when set, `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        let api_key = lookup("ANTHROPIC_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing ANTHROPIC_API_KEY for Anthropic provider".into(),
            ));
        }
        let mut config = Self::new(api_key.trim());
        if let Some(base_url) = lookup("ANTHROPIC_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config = config.base_url(base_url.trim());
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_a_config_error() {
        let result = AnthropicClientConfig::from_lookup(|_| None);
        assert!(matches!(result, Err(HarnessError::Config(msg)) if msg.contains("ANTHROPIC_API_KEY")));
    }

    #[test]
    fn base_url_override_and_messages_url() {
        let config = AnthropicClientConfig::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("sk-test".into()),
            "ANTHROPIC_BASE_URL" => Some("http://localhost:8787/".into()),
            _ => None,
        })
        .expect("config");
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.messages_url(), "http://localhost:8787/v1/messages");
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }
}
