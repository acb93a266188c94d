use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use studio_core::edit::CHAT_ARTIFACT_SYSTEM_PROMPT;
use studio_core::{
    Artifact, ArtifactKind, ArtifactRenderer, CancelHandle, ChatRenderer, DocumentSurface,
    DriveOutcome, Transcript, drive_session, settled_prose,
};
use studio_harness::vendors::anthropic::ANTHROPIC_PROVIDER;
use studio_harness::{ChatTurn, Harness, ModelRef, Session, SessionConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub struct ChatOptions {
    pub model: &'static str,
    pub max_tokens: u32,
    pub save_dir: Option<PathBuf>,
}

const HELP: &str = "\
/doc              print the working document
/versions         list saved document versions
/restore <id>     restore a saved version
/write <path>     write the working document to a file
/quit             leave (Ctrl-D works too)
Ctrl-C stops a reply that is still streaming.";

#[derive(Default)]
struct ChatState {
    transcript: Transcript,
    document: DocumentSurface,
}

pub async fn run(harness: &Harness, options: ChatOptions, prompt: Option<String>) -> anyhow::Result<()> {
    let session = harness.session(SessionConfig::named("chat"));
    let mut state = ChatState::default();

    if let Some(prompt) = prompt {
        return turn(&session, &options, &mut state, &prompt).await;
    }

    eprintln!("studio chat ({}). /help for commands.", options.model);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if !slash_command(command, &mut state)? {
                break;
            }
            continue;
        }
        if let Err(err) = turn(&session, &options, &mut state, line).await {
            eprintln!("Error: {err:#}");
        }
    }
    Ok(())
}

// Returns false when the user asked to leave.
fn slash_command(command: &str, state: &mut ChatState) -> anyhow::Result<bool> {
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let arg = arg.trim();
    match name {
        "quit" | "exit" => return Ok(false),
        "help" => eprintln!("{HELP}"),
        "doc" => {
            if state.document.text().is_empty() {
                eprintln!("(document is empty)");
            } else {
                println!("# {}\n\n{}", state.document.title(), state.document.text());
            }
        }
        "versions" => {
            let versions = state.document.history().versions();
            if versions.is_empty() {
                eprintln!("(no versions yet)");
            }
            for version in versions {
                eprintln!(
                    "{}  {}  {}",
                    version.id,
                    version.timestamp.format("%H:%M:%S"),
                    version.operation
                );
            }
        }
        "restore" => {
            match state.document.restore(arg) {
                Some(version) => {
                    let entry = state.transcript.push_restore(&version);
                    eprintln!("{}", entry.content);
                }
                None => eprintln!("unknown version: {arg:?}"),
            }
        }
        "write" if !arg.is_empty() => {
            std::fs::write(arg, state.document.text())
                .with_context(|| format!("failed to write {arg}"))?;
            eprintln!("wrote {arg}");
        }
        _ => eprintln!("unknown command: /{command}\n{HELP}"),
    }
    Ok(true)
}

async fn turn(
    session: &Session,
    options: &ChatOptions,
    state: &mut ChatState,
    prompt: &str,
) -> anyhow::Result<()> {
    let history: Vec<ChatTurn> = state
        .transcript
        .conversation()
        .filter_map(|m| ChatTurn::try_from(m).ok())
        .collect();
    state.transcript.push_user(prompt);

    let run = session
        .run(ModelRef::new(ANTHROPIC_PROVIDER, options.model))
        .system_prompt(CHAT_ARTIFACT_SYSTEM_PROMPT)
        .history(history)
        .user_text(prompt)
        .max_tokens(options.max_tokens)
        .start_stream()
        .await?;
    let run_id = run.run_id();
    let abort = run.abort_handle();
    let cancel = CancelHandle::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
                abort.abort();
            }
        })
    };

    let mut chat = ChatPane {
        transcript: &mut state.transcript,
        terminal: TerminalChat::new(std::io::stdout()),
    };
    let mut pane = DocumentPane {
        surface: &mut state.document,
        out: std::io::stdout(),
        save_dir: options.save_dir.as_deref(),
    };
    let outcome = drive_session(run.into_source_events(), &mut chat, &mut pane, &cancel).await;
    watcher.abort();

    match outcome {
        DriveOutcome::Completed { artifact, .. } => {
            if let Some(artifact) = &artifact {
                state.transcript.attach_artifact(artifact);
            }
            info!(run_id = %run_id, artifact = artifact.is_some(), "chat turn completed");
        }
        DriveOutcome::Errored { message } => {
            warn!(run_id = %run_id, error = %message, "chat turn failed");
        }
        DriveOutcome::Cancelled => {
            state.transcript.interrupt();
            println!("\n[stopped]");
        }
    }
    Ok(())
}

/// Prints chat text progressively. Only the settled prefix is shown while
/// streaming so partial artifact markup never reaches the terminal.
pub struct TerminalChat<W: Write> {
    out: W,
    printed: String,
}

impl<W: Write> TerminalChat<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: String::new(),
        }
    }

    // Prints the part of `text` not yet shown. Text that no longer extends
    // what was printed is skipped until the final frame.
    fn extend_to(&mut self, text: &str) {
        let Some(rest) = text.strip_prefix(self.printed.as_str()) else {
            return;
        };
        if rest.is_empty() {
            return;
        }
        let _ = self.out.write_all(rest.as_bytes());
        let _ = self.out.flush();
        self.printed = text.to_string();
    }
}

impl<W: Write> ChatRenderer for TerminalChat<W> {
    fn render_chat(&mut self, text: &str) {
        self.extend_to(settled_prose(text));
    }

    fn finish_chat(&mut self, text: &str) {
        if text.starts_with(self.printed.as_str()) {
            self.extend_to(text);
        } else {
            let _ = write!(self.out, "\n{text}");
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    fn render_error(&mut self, message: &str) {
        if !self.printed.is_empty() {
            let _ = writeln!(self.out);
        }
        let _ = writeln!(self.out, "Error: {message}");
        let _ = self.out.flush();
    }
}

/// Feeds both the transcript and the terminal.
struct ChatPane<'a, W: Write> {
    transcript: &'a mut Transcript,
    terminal: TerminalChat<W>,
}

impl<W: Write> ChatRenderer for ChatPane<'_, W> {
    fn render_chat(&mut self, text: &str) {
        self.transcript.render_chat(text);
        self.terminal.render_chat(text);
    }

    fn finish_chat(&mut self, text: &str) {
        self.transcript.finish_chat(text);
        self.terminal.finish_chat(text);
    }

    fn render_error(&mut self, message: &str) {
        self.transcript.render_error(message);
        self.terminal.render_error(message);
    }
}

/// Shows artifacts in the terminal and makes them the working document.
struct DocumentPane<'a, W: Write> {
    surface: &'a mut DocumentSurface,
    out: W,
    save_dir: Option<&'a Path>,
}

impl<W: Write> ArtifactRenderer for DocumentPane<'_, W> {
    fn render_artifact(&mut self, artifact: &Artifact) {
        self.surface.render_artifact(artifact);
        let _ = writeln!(
            self.out,
            "\n--- {} [{}] ({}) ---\n{}\n---",
            artifact.title, artifact.identifier, artifact.kind, artifact.body
        );
        let _ = self.out.flush();

        if let Some(dir) = self.save_dir {
            match save_artifact(dir, artifact) {
                Ok(path) => info!(path = %path.display(), "artifact saved"),
                Err(err) => warn!(error = %err, "failed to save artifact"),
            }
        }
    }
}

fn save_artifact(dir: &Path, artifact: &Artifact) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(artifact_file_name(artifact));
    std::fs::write(&path, &artifact.body)?;
    Ok(path)
}

fn artifact_file_name(artifact: &Artifact) -> String {
    let stem: String = artifact
        .identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "artifact".to_string() } else { stem };
    format!("{stem}.{}", extension(&artifact.kind))
}

fn extension(kind: &ArtifactKind) -> &'static str {
    match kind.as_str() {
        ArtifactKind::MARKDOWN => "md",
        ArtifactKind::HTML => "html",
        ArtifactKind::REACT => "jsx",
        _ => "txt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printed(chat: &TerminalChat<Vec<u8>>) -> String {
        String::from_utf8(chat.out.clone()).unwrap()
    }

    #[test]
    fn terminal_prints_only_new_settled_text() {
        let mut chat = TerminalChat::new(Vec::new());
        chat.render_chat("Here");
        chat.render_chat("Here is");
        chat.render_chat("Here is your plan:\n\n<arti");
        chat.render_chat("Here is your plan:\n\n<artifact identifier=\"p\"");
        assert_eq!(printed(&chat), "Here is your plan:");

        chat.finish_chat("Here is your plan:\n\nWant changes?");
        assert_eq!(printed(&chat), "Here is your plan:\n\nWant changes?\n");
    }

    #[test]
    fn diverging_final_text_is_printed_whole() {
        let mut chat = TerminalChat::new(Vec::new());
        chat.render_chat("Draft one");
        chat.finish_chat("Another answer");
        assert_eq!(printed(&chat), "Draft one\nAnother answer\n");
    }

    #[test]
    fn errors_start_on_their_own_line() {
        let mut chat = TerminalChat::new(Vec::new());
        chat.render_chat("Partial");
        chat.render_error("Overloaded");
        assert_eq!(printed(&chat), "Partial\nError: Overloaded\n");
    }

    #[test]
    fn pane_updates_transcript_and_terminal() {
        let mut transcript = Transcript::new();
        let mut pane = ChatPane {
            transcript: &mut transcript,
            terminal: TerminalChat::new(Vec::new()),
        };
        pane.render_chat("Hi");
        pane.finish_chat("Hi there");
        assert_eq!(printed(&pane.terminal), "Hi there\n");
        assert_eq!(transcript.messages().last().map(|m| m.content.as_str()), Some("Hi there"));
    }

    #[test]
    fn artifact_becomes_document_and_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = DocumentSurface::default();
        let mut pane = DocumentPane {
            surface: &mut surface,
            out: Vec::new(),
            save_dir: Some(dir.path()),
        };
        let artifact = Artifact::new("launch plan", ArtifactKind::MARKDOWN, "Launch Plan", "# Launch");
        pane.render_artifact(&artifact);

        let shown = String::from_utf8(pane.out.clone()).unwrap();
        assert!(shown.contains("Launch Plan [launch plan]"));
        assert_eq!(surface.text(), "# Launch");
        assert_eq!(surface.title(), "Launch Plan");
        let saved = std::fs::read_to_string(dir.path().join("launch_plan.md")).unwrap();
        assert_eq!(saved, "# Launch");
    }

    #[test]
    fn file_names_follow_kind() {
        let code = Artifact::new("fib", ArtifactKind::CODE, "Fib", "fn fib() {}");
        assert_eq!(artifact_file_name(&code), "fib.txt");
        let page = Artifact::new("", ArtifactKind::HTML, "Page", "<p></p>");
        assert_eq!(artifact_file_name(&page), "artifact.html");
    }

    #[test]
    fn slash_commands() {
        let mut state = ChatState::default();
        assert!(!slash_command("quit", &mut state).unwrap());
        assert!(slash_command("restore missing", &mut state).unwrap());
        assert!(slash_command("versions", &mut state).unwrap());
    }
}
