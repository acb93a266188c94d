//! Adapts a [`RunStream`] to the session driver's [`SourceEvent`] stream.

use futures::Stream;
use futures::stream;
use studio_core::SourceEvent;

use crate::run::RunStream;
use crate::stream::StreamEvent;

impl RunStream {
    /// Text deltas become chunks; the terminal event becomes `End` or
    /// `Error` and closes the stream. Take the abort handle first if the run
    /// must be cancellable.
    pub fn into_source_events(self) -> impl Stream<Item = SourceEvent> + Send + 'static {
        stream::unfold(Some(self), |run| async move {
            let mut run = run?;
            loop {
                let event = match run.next_event().await {
                    Some(event) => event,
                    // Channel closed without a terminal event; the driver
                    // reports this as an unterminated stream.
                    None => return None,
                };
                match event {
                    StreamEvent::RunStarted { .. } => continue,
                    StreamEvent::OutputDelta { text, .. } => {
                        return Some((SourceEvent::Chunk(text), Some(run)));
                    }
                    StreamEvent::Completed { .. } => return Some((SourceEvent::End, None)),
                    StreamEvent::Error { error, .. } => {
                        return Some((SourceEvent::Error(error.display_message()), None));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use futures::StreamExt as _;
    use studio_core::{CancelHandle, DocumentSurface, DriveOutcome, Transcript, drive_session};

    use crate::errors::ProviderError;
    use crate::model::{ModelRef, ProviderId};
    use crate::provider::{
        ProviderAdapter, ProviderEvent, ProviderRequest, ProviderResponseMeta,
        ProviderStreamHandle,
    };
    use crate::{ChatTurn, Harness, SessionConfig, TurnRole};

    struct Canned(Vec<Result<ProviderEvent, ProviderError>>);

    #[async_trait::async_trait]
    impl ProviderAdapter for Canned {
        fn id(&self) -> ProviderId {
            ProviderId::new("canned")
        }

        async fn start_stream(
            &self,
            _req: ProviderRequest,
        ) -> Result<ProviderStreamHandle, ProviderError> {
            Ok(ProviderStreamHandle {
                stream: Box::pin(futures::stream::iter(self.0.clone())),
                metadata: ProviderResponseMeta::default(),
            })
        }
    }

    async fn start(events: Vec<Result<ProviderEvent, ProviderError>>) -> crate::RunStream {
        Harness::builder()
            .register_provider(Arc::new(Canned(events)))
            .build()
            .expect("harness")
            .session(SessionConfig::named("bridge"))
            .run(ModelRef::new("canned", "m"))
            .user_text("make a doc")
            .start_stream()
            .await
            .expect("start")
    }

    fn delta(text: &str) -> Result<ProviderEvent, ProviderError> {
        Ok(ProviderEvent::TextDelta { text: text.into() })
    }

    #[tokio::test]
    async fn maps_deltas_and_completion() {
        let run = start(vec![delta("a"), delta("b"), Ok(ProviderEvent::Completed)]).await;
        let events: Vec<_> = run.into_source_events().collect().await;
        assert_eq!(
            events,
            vec![
                studio_core::SourceEvent::Chunk("a".into()),
                studio_core::SourceEvent::Chunk("b".into()),
                studio_core::SourceEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn provider_error_becomes_error_event() {
        let run = start(vec![
            delta("a"),
            Err(ProviderError::provider("canned", "Overloaded", None)),
        ])
        .await;
        let events: Vec<_> = run.into_source_events().collect().await;
        assert_eq!(
            events.last(),
            Some(&studio_core::SourceEvent::Error("Overloaded".into()))
        );
    }

    #[tokio::test]
    async fn drives_a_session_end_to_end() {
        let run = start(vec![
            delta("Here is your plan:\n\n<artifact identifier=\"plan\" "),
            delta("type=\"text/markdown\" title=\"Launch Plan\">\n# Launch\n"),
            delta("</artifact>\n\nWant changes?"),
            Ok(ProviderEvent::Completed),
        ])
        .await;

        let mut transcript = Transcript::new();
        let mut document = DocumentSurface::default();
        let outcome = drive_session(
            run.into_source_events(),
            &mut transcript,
            &mut document,
            &CancelHandle::new(),
        )
        .await;

        assert!(matches!(outcome, DriveOutcome::Completed { .. }));
        assert_eq!(
            transcript.messages()[0].content,
            "Here is your plan:\n\nWant changes?"
        );
        assert_eq!(document.title(), "Launch Plan");
        assert_eq!(document.text(), "# Launch");
    }

    // Replies with the same script every time and keeps each request.
    struct Recording {
        events: Vec<Result<ProviderEvent, ProviderError>>,
        seen: Arc<Mutex<Vec<ProviderRequest>>>,
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for Recording {
        fn id(&self) -> ProviderId {
            ProviderId::new("recording")
        }

        async fn start_stream(
            &self,
            req: ProviderRequest,
        ) -> Result<ProviderStreamHandle, ProviderError> {
            self.seen.lock().unwrap().push(req);
            Ok(ProviderStreamHandle {
                stream: Box::pin(futures::stream::iter(self.events.clone())),
                metadata: ProviderResponseMeta::default(),
            })
        }
    }

    #[tokio::test]
    async fn follow_up_turn_carries_the_artifact_body() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let provider = Recording {
            events: vec![
                delta("Here is your plan:\n\n<artifact identifier=\"plan\" type=\"text/markdown\" "),
                delta("title=\"Launch Plan\">\n# Launch\n</artifact>"),
                Ok(ProviderEvent::Completed),
            ],
            seen: seen.clone(),
        };
        let session = Harness::builder()
            .register_provider(Arc::new(provider))
            .build()
            .expect("harness")
            .session(SessionConfig::named("chat"));

        let mut transcript = Transcript::new();
        let mut document = DocumentSurface::default();
        for prompt in ["write a launch plan", "make it shorter"] {
            let history: Vec<ChatTurn> = transcript
                .conversation()
                .filter_map(|m| ChatTurn::try_from(m).ok())
                .collect();
            transcript.push_user(prompt);
            let run = session
                .run(ModelRef::new("recording", "m"))
                .history(history)
                .user_text(prompt)
                .start_stream()
                .await
                .expect("start");
            let outcome = drive_session(
                run.into_source_events(),
                &mut transcript,
                &mut document,
                &CancelHandle::new(),
            )
            .await;
            if let DriveOutcome::Completed {
                artifact: Some(artifact),
                ..
            } = &outcome
            {
                transcript.attach_artifact(artifact);
            }
        }

        let seen = seen.lock().unwrap();
        let turns = &seen[1].turns;
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert!(turns[1].content.starts_with("Here is your plan:"));
        assert!(turns[1].content.contains("title=\"Launch Plan\">\n# Launch\n</artifact>"));
        assert_eq!(turns[2], ChatTurn::user("make it shorter"));
        assert_eq!(transcript.messages()[1].content, "Here is your plan:");
    }
}
