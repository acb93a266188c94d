/// Anthropic Messages API adapter.
pub mod anthropic;
