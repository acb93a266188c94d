//! Chat transcript and document version history.

use chrono::{DateTime, Utc};

use crate::artifact::Artifact;
use crate::extract::settled_prose;
use crate::render::{ArtifactRenderer, ChatRenderer};

/// Author of a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    /// Edit actions and restores logged by the editor.
    System,
}

/// Annotation describing what produced a transcript entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    EditAction,
    Explanation,
    /// A failed reply; shown to the user, never sent back to the model.
    Error,
    /// A reply cut short by the user.
    Interrupted,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageMetadata {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

/// One entry in the conversation transcript.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// What the model saw itself say, when it differs from `content`
    /// (an assistant reply whose artifact was moved to the document).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_context: Option<String>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
            model_context: None,
        }
    }

    pub fn kind(&self) -> Option<MessageKind> {
        self.metadata.as_ref().and_then(|m| m.kind)
    }

    /// Text to replay as conversation context.
    pub fn model_content(&self) -> &str {
        self.model_context.as_deref().unwrap_or(&self.content)
    }

    pub fn with_metadata(mut self, kind: MessageKind, operation: Option<String>) -> Self {
        self.metadata = Some(MessageMetadata {
            kind: Some(kind),
            operation,
        });
        self
    }
}

/// Append-only conversation transcript.
///
/// Acts as the chat renderer for streamed sessions: the assistant entry is
/// created on the first render and rewritten in place until the session ends.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    streaming: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) -> &ChatMessage {
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::new(ChatRole::User, content))
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.push(ChatMessage::new(ChatRole::Assistant, content))
    }

    /// Logs an editor action such as `Applying "Fix Grammar" to entire document`.
    pub fn push_edit_action(
        &mut self,
        content: impl Into<String>,
        operation: impl Into<String>,
    ) -> &ChatMessage {
        self.push(
            ChatMessage::new(ChatRole::System, content)
                .with_metadata(MessageKind::EditAction, Some(operation.into())),
        )
    }

    pub fn push_explanation(&mut self, content: impl Into<String>) -> &ChatMessage {
        self.push(
            ChatMessage::new(ChatRole::Assistant, content)
                .with_metadata(MessageKind::Explanation, None),
        )
    }

    pub fn push_error(&mut self, message: &str) -> &ChatMessage {
        self.push(
            ChatMessage::new(ChatRole::Assistant, format!("Error: {message}"))
                .with_metadata(MessageKind::Error, None),
        )
    }

    /// Logs a restore as `Restored version from <local time>`.
    pub fn push_restore(&mut self, version: &DocumentVersion) -> &ChatMessage {
        let at = version
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        self.push(ChatMessage::new(
            ChatRole::System,
            format!("Restored version from {at}"),
        ))
    }

    /// Stops streaming into the current assistant entry. Prose already
    /// received is kept, minus any unfinished artifact markup; an entry with
    /// nothing left is dropped.
    pub fn interrupt(&mut self) {
        let Some(idx) = self.streaming.take() else {
            return;
        };
        let settled = settled_prose(&self.messages[idx].content).trim().to_string();
        if settled.is_empty() {
            self.messages.remove(idx);
            return;
        }
        let message = &mut self.messages[idx];
        message.content = settled;
        message.metadata = Some(MessageMetadata {
            kind: Some(MessageKind::Interrupted),
            operation: None,
        });
    }

    /// Records the artifact produced by the latest reply as part of what the
    /// assistant said, so later turns can refer back to it. The display text
    /// is left alone.
    pub fn attach_artifact(&mut self, artifact: &Artifact) {
        let markup = artifact.to_markup();
        let streaming = self.streaming.is_some();
        if let Some(last) = self.messages.last_mut().filter(|m| {
            m.role == ChatRole::Assistant && m.kind().is_none() && !streaming
        }) {
            last.model_context = Some(format!("{}\n\n{markup}", last.content));
            return;
        }
        let mut message = ChatMessage::new(ChatRole::Assistant, "");
        message.model_context = Some(markup);
        self.push(message);
    }

    /// Prior user/assistant turns, oldest first, for model context. Failed
    /// and interrupted replies are left out.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| {
            matches!(m.role, ChatRole::User | ChatRole::Assistant)
                && !matches!(
                    m.kind(),
                    Some(MessageKind::Error | MessageKind::Interrupted)
                )
        })
    }
}

impl ChatRenderer for Transcript {
    fn render_chat(&mut self, text: &str) {
        match self.streaming {
            Some(idx) => self.messages[idx].content = text.to_string(),
            None => {
                self.messages
                    .push(ChatMessage::new(ChatRole::Assistant, text));
                self.streaming = Some(self.messages.len() - 1);
            }
        }
    }

    fn finish_chat(&mut self, text: &str) {
        match self.streaming.take() {
            Some(idx) if text.is_empty() => {
                self.messages.remove(idx);
            }
            Some(idx) => self.messages[idx].content = text.to_string(),
            None if text.is_empty() => {}
            None => {
                self.push_assistant(text);
            }
        }
    }

    fn render_error(&mut self, message: &str) {
        if let Some(idx) = self.streaming.take() {
            self.messages.remove(idx);
        }
        self.push_error(message);
    }
}

/// Snapshot of a document taken before an operation changed it.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub document_text: String,
    /// Human-readable label, e.g. "Fix Grammar".
    pub operation: String,
    /// Mode id, e.g. `fix_grammar`.
    pub mode_used: String,
}

/// Newest-first list of document versions.
#[derive(Clone, Debug, Default)]
pub struct VersionHistory {
    versions: Vec<DocumentVersion>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `document_text` as the state before `operation`.
    pub fn record(
        &mut self,
        document_text: impl Into<String>,
        operation: impl Into<String>,
        mode_used: impl Into<String>,
    ) -> &DocumentVersion {
        self.versions.insert(
            0,
            DocumentVersion {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                document_text: document_text.into(),
                operation: operation.into(),
                mode_used: mode_used.into(),
            },
        );
        &self.versions[0]
    }

    pub fn versions(&self) -> &[DocumentVersion] {
        &self.versions
    }

    pub fn latest(&self) -> Option<&DocumentVersion> {
        self.versions.first()
    }

    pub fn get(&self, id: &str) -> Option<&DocumentVersion> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Mode id recorded when a streamed artifact replaces the document.
pub const ARTIFACT_MODE: &str = "artifact";

/// The document surface of the editor.
///
/// Renders artifacts by replacing the current document; the replaced text is
/// kept in the version history.
#[derive(Clone, Debug)]
pub struct DocumentSurface {
    title: String,
    text: String,
    artifact: Option<Artifact>,
    history: VersionHistory,
}

impl Default for DocumentSurface {
    fn default() -> Self {
        Self::new("Untitled Document", "")
    }
}

impl DocumentSurface {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            artifact: None,
            history: VersionHistory::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The artifact currently displayed, if the document came from one.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    /// Snapshots the current text under `operation` before an edit is
    /// applied. Recorded even when the edit turns out to change nothing.
    pub fn save_version(
        &mut self,
        operation: impl Into<String>,
        mode_used: impl Into<String>,
    ) -> &DocumentVersion {
        self.history.record(self.text.clone(), operation, mode_used)
    }

    /// Sets the text without recording a version.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Replaces the text, recording the previous state under `operation`.
    pub fn replace_text(
        &mut self,
        text: impl Into<String>,
        operation: impl Into<String>,
        mode_used: impl Into<String>,
    ) {
        self.save_version(operation, mode_used);
        self.set_text(text);
    }

    /// Restores a recorded version and returns it; `None` for unknown ids.
    pub fn restore(&mut self, version_id: &str) -> Option<DocumentVersion> {
        let version = self.history.get(version_id)?.clone();
        self.text = version.document_text.clone();
        Some(version)
    }
}

impl ArtifactRenderer for DocumentSurface {
    fn render_artifact(&mut self, artifact: &Artifact) {
        self.title = artifact.title.clone();
        self.replace_text(
            artifact.body.clone(),
            format!("Artifact: {}", artifact.title),
            ARTIFACT_MODE,
        );
        self.artifact = Some(artifact.clone());
    }
}
