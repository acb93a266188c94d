/// Speaker of a conversation turn sent to the model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message of model context.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

impl TryFrom<&studio_core::ChatMessage> for ChatTurn {
    type Error = ();

    /// System entries (edit logs) are not model context.
    fn try_from(message: &studio_core::ChatMessage) -> Result<Self, Self::Error> {
        let role = match message.role {
            studio_core::ChatRole::User => TurnRole::User,
            studio_core::ChatRole::Assistant => TurnRole::Assistant,
            studio_core::ChatRole::System => return Err(()),
        };
        Ok(Self {
            role,
            content: message.model_content().to_string(),
        })
    }
}

/// Token accounting reported by the vendor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    /// Adds counts from a later usage report; zero fields do not overwrite.
    pub fn merge(&mut self, other: Usage) {
        if other.input_tokens > 0 {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens > 0 {
            self.output_tokens = other.output_tokens;
        }
    }
}

/// Final aggregated output of a completed run.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunOutput {
    /// All text deltas concatenated in order.
    pub text: String,
    /// Vendor stop reason, e.g. `end_turn` or `max_tokens`.
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl RunOutput {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when the vendor stopped because of the token limit.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("max_tokens")
    }
}
