use std::pin::pin;
use std::sync::Arc;

use futures::{Stream, StreamExt as _};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::artifact::Artifact;
use crate::render::{ArtifactRenderer, ChatRenderer};
use crate::session::{SessionOutcome, StreamSession};

/// Message used when the source closes without an explicit terminal signal.
pub const UNTERMINATED_STREAM: &str = "stream ended without completion";

/// Decoded event delivered by a stream source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceEvent {
    /// Next text fragment, in order.
    Chunk(String),
    /// End of stream.
    End,
    /// Terminal failure with a human-readable message.
    Error(String),
}

/// Handle used to abandon a session between chunks.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests cancellation. The driver applies no further renders.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// How a driven session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Source finished; final split was rendered.
    Completed {
        chat_text: String,
        artifact: Option<Artifact>,
    },
    /// Source failed; the error was rendered instead of the chat text.
    Errored { message: String },
    /// Caller cancelled; nothing further was rendered.
    Cancelled,
}

impl From<SessionOutcome> for DriveOutcome {
    fn from(value: SessionOutcome) -> Self {
        match value {
            SessionOutcome::Completed {
                chat_text,
                artifact,
            } => Self::Completed {
                chat_text,
                artifact,
            },
            SessionOutcome::Errored { message } => Self::Errored { message },
        }
    }
}

/// Consumes `source` into a fresh [`StreamSession`].
///
/// Each chunk re-runs extraction and renders the current chat text. On end of
/// stream the final chat text and the artifact (if any) are handed to the
/// renderers. On error only the error message is rendered. The only
/// suspension point is awaiting the next event; cancellation is checked
/// before every await and before every render.
pub async fn drive_session<S, C, A>(
    source: S,
    chat: &mut C,
    artifacts: &mut A,
    cancel: &CancelHandle,
) -> DriveOutcome
where
    S: Stream<Item = SourceEvent>,
    C: ChatRenderer + ?Sized,
    A: ArtifactRenderer + ?Sized,
{
    let mut session = StreamSession::new();
    let mut cancel_rx = cancel.subscribe();
    let mut source = pin!(source);

    loop {
        if *cancel_rx.borrow_and_update() {
            debug!(session = %session.id(), chunks = session.chunk_count(), "session cancelled");
            return DriveOutcome::Cancelled;
        }

        let next = tokio::select! {
            biased;
            Ok(()) = cancel_rx.changed() => continue,
            next = source.next() => next,
        };

        if cancel.is_cancelled() {
            debug!(session = %session.id(), chunks = session.chunk_count(), "session cancelled");
            return DriveOutcome::Cancelled;
        }

        let outcome = match next {
            Some(SourceEvent::Chunk(text)) => {
                if text.is_empty() {
                    continue;
                }
                match session.push_chunk(&text) {
                    Ok(_) => {
                        chat.render_chat(session.chat_text());
                        continue;
                    }
                    Err(err) => session_failure(&mut session, err.to_string()),
                }
            }
            Some(SourceEvent::End) => match session.complete() {
                Ok(outcome) => outcome,
                Err(err) => session_failure(&mut session, err.to_string()),
            },
            Some(SourceEvent::Error(message)) => session_failure(&mut session, message),
            None => session_failure(&mut session, UNTERMINATED_STREAM.to_string()),
        };

        match &outcome {
            SessionOutcome::Completed {
                chat_text,
                artifact,
            } => {
                chat.finish_chat(chat_text);
                if let Some(artifact) = artifact {
                    artifacts.render_artifact(artifact);
                }
            }
            SessionOutcome::Errored { message } => {
                warn!(session = %session.id(), error = %message, "stream source failed");
                chat.render_error(message);
            }
        }
        return outcome.into();
    }
}

fn session_failure(session: &mut StreamSession, message: String) -> SessionOutcome {
    session
        .fail(message.clone())
        .unwrap_or(SessionOutcome::Errored { message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Default)]
    struct RecordingChat {
        frames: Vec<String>,
        finished: Option<String>,
        errors: Vec<String>,
    }

    impl ChatRenderer for RecordingChat {
        fn render_chat(&mut self, text: &str) {
            self.frames.push(text.to_string());
        }

        fn finish_chat(&mut self, text: &str) {
            self.finished = Some(text.to_string());
        }

        fn render_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    #[derive(Default)]
    struct RecordingArtifacts {
        shown: Vec<Artifact>,
    }

    impl ArtifactRenderer for RecordingArtifacts {
        fn render_artifact(&mut self, artifact: &Artifact) {
            self.shown.push(artifact.clone());
        }
    }

    fn chunks(parts: &[&str]) -> Vec<SourceEvent> {
        parts
            .iter()
            .map(|p| SourceEvent::Chunk((*p).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn renders_progressively_then_final_split() {
        let mut events = chunks(&[
            "Sure:\n\n<artifact identifier=\"doc\" type=\"text/markdown\" ",
            "title=\"Doc\">Hello",
            "</artifact>\n\nAnything else?",
        ]);
        events.push(SourceEvent::End);

        let mut chat = RecordingChat::default();
        let mut docs = RecordingArtifacts::default();
        let outcome = drive_session(
            stream::iter(events),
            &mut chat,
            &mut docs,
            &CancelHandle::new(),
        )
        .await;

        assert_eq!(chat.frames.len(), 3);
        assert!(chat.frames[1].contains("<artifact"));
        assert_eq!(chat.frames[2], "Sure:\n\nAnything else?");
        assert_eq!(chat.finished.as_deref(), Some("Sure:\n\nAnything else?"));
        assert_eq!(docs.shown.len(), 1);
        assert_eq!(docs.shown[0].body, "Hello");
        assert!(matches!(outcome, DriveOutcome::Completed { artifact: Some(_), .. }));
    }

    #[tokio::test]
    async fn source_error_renders_message_and_no_artifact() {
        let mut events = chunks(&[
            "<artifact identifier=\"a\" type=\"t\" title=\"A\">done</artifact>",
        ]);
        events.push(SourceEvent::Error("rate limited".into()));

        let mut chat = RecordingChat::default();
        let mut docs = RecordingArtifacts::default();
        let outcome = drive_session(
            stream::iter(events),
            &mut chat,
            &mut docs,
            &CancelHandle::new(),
        )
        .await;

        assert_eq!(
            outcome,
            DriveOutcome::Errored {
                message: "rate limited".into()
            }
        );
        assert_eq!(chat.errors, vec!["rate limited".to_string()]);
        assert!(chat.finished.is_none());
        assert!(docs.shown.is_empty());
    }

    #[tokio::test]
    async fn source_without_terminal_signal_is_an_error() {
        let mut chat = RecordingChat::default();
        let outcome = drive_session(
            stream::iter(chunks(&["partial"])),
            &mut chat,
            &mut RecordingArtifacts::default(),
            &CancelHandle::new(),
        )
        .await;
        assert_eq!(
            outcome,
            DriveOutcome::Errored {
                message: UNTERMINATED_STREAM.into()
            }
        );
    }

    #[tokio::test]
    async fn events_after_end_are_not_consumed() {
        let events = vec![
            SourceEvent::Chunk("hi".into()),
            SourceEvent::End,
            SourceEvent::Chunk(" ignored".into()),
        ];
        let mut chat = RecordingChat::default();
        let outcome = drive_session(
            stream::iter(events),
            &mut chat,
            &mut RecordingArtifacts::default(),
            &CancelHandle::new(),
        )
        .await;
        assert_eq!(
            outcome,
            DriveOutcome::Completed {
                chat_text: "hi".into(),
                artifact: None
            }
        );
        assert_eq!(chat.frames, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_before_start_renders_nothing() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        let mut chat = RecordingChat::default();
        let outcome = drive_session(
            stream::iter(vec![SourceEvent::Chunk("x".into()), SourceEvent::End]),
            &mut chat,
            &mut RecordingArtifacts::default(),
            &cancel,
        )
        .await;
        assert_eq!(outcome, DriveOutcome::Cancelled);
        assert!(chat.frames.is_empty());
        assert!(chat.finished.is_none());
    }

    #[tokio::test]
    async fn cancel_while_waiting_stops_the_driver() {
        let cancel = CancelHandle::new();
        let (tx, rx) = tokio::sync::mpsc::channel::<SourceEvent>(4);
        let source = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        let remote = cancel.clone();
        let producer = tokio::spawn(async move {
            tx.send(SourceEvent::Chunk("first".into())).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            remote.cancel();
            // keep the sender alive so the driver is parked on the source
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let _ = tx.send(SourceEvent::Chunk("late".into())).await;
        });

        let mut chat = RecordingChat::default();
        let outcome = drive_session(
            source,
            &mut chat,
            &mut RecordingArtifacts::default(),
            &cancel,
        )
        .await;
        producer.await.unwrap();

        assert_eq!(outcome, DriveOutcome::Cancelled);
        assert_eq!(chat.frames, vec!["first".to_string()]);
    }
}
