use tracing::debug;

use crate::artifact::Artifact;
use crate::extract::extract;

/// Lifecycle state of a stream session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Chunks are still arriving.
    Active,
    /// The source signalled end of stream.
    Completed,
    /// The source signalled an error.
    Errored,
}

/// Errors raised when a session is driven out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Chunks or terminal signals arrived after the session ended.
    #[error("session {id} is not active (state={state:?})")]
    NotActive { id: uuid::Uuid, state: SessionState },
}

/// Terminal result of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Final chat text and the artifact captured during the session, if any.
    Completed {
        chat_text: String,
        artifact: Option<Artifact>,
    },
    /// Caller-supplied error message; partial output is discarded.
    Errored { message: String },
}

/// One prompt/response interaction.
///
/// The buffer only grows. Every chunk re-runs [`extract`] over the whole
/// buffer; the first artifact found is kept for the rest of the session.
#[derive(Clone, Debug)]
pub struct StreamSession {
    id: uuid::Uuid,
    accumulated_text: String,
    chat_text: String,
    emitted_artifact: Option<Artifact>,
    state: SessionState,
    error: Option<String>,
    chunks: u64,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    /// Creates an active session with an empty buffer.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            accumulated_text: String::new(),
            chat_text: String::new(),
            emitted_artifact: None,
            state: SessionState::Active,
            error: None,
            chunks: 0,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Full text received so far.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Current conversational text (artifact region removed).
    pub fn chat_text(&self) -> &str {
        &self.chat_text
    }

    /// Artifact captured so far. Always `None` once the session errored.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.emitted_artifact.as_ref()
    }

    /// Error message supplied when the session failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of chunks applied.
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Appends a chunk and re-runs extraction over the whole buffer.
    ///
    /// Returns `true` when this chunk completed the session's artifact.
    pub fn push_chunk(&mut self, chunk: &str) -> Result<bool, SessionError> {
        self.ensure_active()?;
        self.accumulated_text.push_str(chunk);
        self.chunks = self.chunks.saturating_add(1);

        let extraction = extract(&self.accumulated_text);
        self.chat_text = extraction.chat_text;

        if self.emitted_artifact.is_none()
            && let Some(artifact) = extraction.artifact
        {
            debug!(
                session = %self.id,
                identifier = %artifact.identifier,
                kind = %artifact.kind,
                seq = self.chunks,
                "artifact captured"
            );
            self.emitted_artifact = Some(artifact);
            return Ok(true);
        }
        Ok(false)
    }

    /// Marks the session completed and returns the final split.
    pub fn complete(&mut self) -> Result<SessionOutcome, SessionError> {
        self.ensure_active()?;
        self.state = SessionState::Completed;
        debug!(session = %self.id, chunks = self.chunks, has_artifact = self.emitted_artifact.is_some(), "session completed");
        Ok(SessionOutcome::Completed {
            chat_text: self.chat_text.clone(),
            artifact: self.emitted_artifact.clone(),
        })
    }

    /// Marks the session errored. The chat text is replaced by `message` and
    /// any captured artifact is dropped.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<SessionOutcome, SessionError> {
        self.ensure_active()?;
        let message = message.into();
        self.state = SessionState::Errored;
        self.emitted_artifact = None;
        self.chat_text = message.clone();
        self.error = Some(message.clone());
        debug!(session = %self.id, chunks = self.chunks, "session errored");
        Ok(SessionOutcome::Errored { message })
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive {
                id: self.id,
                state: self.state,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: &str = "<artifact identifier=\"a\" type=\"text/markdown\" title=\"A\">";

    #[test]
    fn chunks_accumulate_and_artifact_appears_once_closed() {
        let mut session = StreamSession::new();
        assert!(!session.push_chunk("Here it is:\n\n").unwrap());
        assert!(!session.push_chunk(OPEN).unwrap());
        assert!(!session.push_chunk("body text").unwrap());
        assert!(session.artifact().is_none());
        assert!(session.chat_text().contains("<artifact"));

        assert!(session.push_chunk("</artifact>\n\nDone.").unwrap());
        assert_eq!(session.artifact().unwrap().body, "body text");
        assert_eq!(session.chat_text(), "Here it is:\n\nDone.");
        assert_eq!(session.chunk_count(), 4);

        let outcome = session.complete().unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                chat_text: "Here it is:\n\nDone.".into(),
                artifact: Some(Artifact::new("a", "text/markdown", "A", "body text")),
            }
        );
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn captured_artifact_is_sticky() {
        let mut session = StreamSession::new();
        session
            .push_chunk(&format!("{OPEN}first</artifact>"))
            .unwrap();
        let later = session
            .push_chunk("<artifact identifier=\"b\" type=\"t\" title=\"B\">second</artifact>")
            .unwrap();
        assert!(!later);
        assert_eq!(session.artifact().unwrap().identifier, "a");
        assert!(session.chat_text().contains("identifier=\"b\""));
    }

    #[test]
    fn error_discards_text_and_artifact() {
        let mut session = StreamSession::new();
        session
            .push_chunk(&format!("prose {OPEN}doc</artifact>"))
            .unwrap();
        assert!(session.artifact().is_some());

        let outcome = session.fail("overloaded").unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Errored {
                message: "overloaded".into()
            }
        );
        assert!(session.artifact().is_none());
        assert_eq!(session.chat_text(), "overloaded");
        assert_eq!(session.error_message(), Some("overloaded"));
    }

    #[test]
    fn events_after_terminal_state_are_rejected() {
        let mut session = StreamSession::new();
        session.complete().unwrap();
        assert!(matches!(
            session.push_chunk("late"),
            Err(SessionError::NotActive {
                state: SessionState::Completed,
                ..
            })
        ));
        assert!(session.fail("late").is_err());
        assert!(session.complete().is_err());
        assert_eq!(session.accumulated_text(), "");
    }

    #[test]
    fn empty_session_completes_with_empty_text() {
        let mut session = StreamSession::new();
        assert_eq!(
            session.complete().unwrap(),
            SessionOutcome::Completed {
                chat_text: String::new(),
                artifact: None
            }
        );
    }
}
