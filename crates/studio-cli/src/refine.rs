use std::path::PathBuf;

use anyhow::{Context, anyhow};
use studio_core::refine::{RefineRequest, Skill};
use studio_core::{DocumentSurface, Transcript};
use studio_harness::vendors::anthropic::ANTHROPIC_PROVIDER;
use studio_harness::{Harness, ModelRef, SessionConfig};
use tracing::info;

const REFINE_OPERATION: &str = "Refine";
const REFINE_MODE: &str = "refine";

pub struct RefineCommand {
    pub document: PathBuf,
    pub instruction: String,
    pub selection: Option<String>,
    pub skills: Vec<Skill>,
    pub in_place: bool,
}

pub async fn run(harness: &Harness, model: &'static str, cmd: RefineCommand) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(&cmd.document)
        .with_context(|| format!("failed to read {}", cmd.document.display()))?;
    let request = build_request(&cmd, &document)?;

    let mut transcript = Transcript::new();
    transcript.push_user(cmd.instruction.as_str());

    let raw = harness
        .session(SessionConfig::named("refine"))
        .run(ModelRef::new(ANTHROPIC_PROVIDER, model))
        .system_prompt(request.system_prompt())
        .user_text(request.user_prompt())
        .collect_text()
        .await?;

    let title = cmd
        .document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut surface = DocumentSurface::new(title, document);
    apply_refinement(&mut surface, &raw)?;
    transcript.push_assistant("Document updated successfully");
    info!(
        skills = cmd.skills.len(),
        selection = request.selected_text.is_some(),
        versions = surface.history().len(),
        "document refined"
    );

    if cmd.in_place {
        std::fs::write(&cmd.document, surface.text())
            .with_context(|| format!("failed to write {}", cmd.document.display()))?;
        eprintln!("updated {}", cmd.document.display());
    } else {
        println!("{}", surface.text());
    }
    Ok(())
}

fn build_request(cmd: &RefineCommand, document: &str) -> anyhow::Result<RefineRequest> {
    let mut request = RefineRequest::new(document, cmd.instruction.as_str());
    if let Some(selection) = cmd.selection.as_deref().filter(|s| !s.is_empty()) {
        if !document.contains(selection) {
            return Err(anyhow!("selection not found in document: {selection:?}"));
        }
        request = request.selected_text(selection);
    }
    for skill in &cmd.skills {
        request = request.skill(*skill);
    }
    request.validate()?;
    Ok(request)
}

// The reply is the whole revised document; a blank reply leaves it untouched.
fn apply_refinement(surface: &mut DocumentSurface, raw: &str) -> anyhow::Result<()> {
    let refined = raw.trim();
    if refined.is_empty() {
        return Err(anyhow!("model returned an empty document"));
    }
    surface.replace_text(refined, REFINE_OPERATION, REFINE_MODE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::refine::RefineError;

    fn command(selection: Option<&str>, skills: Vec<Skill>) -> RefineCommand {
        RefineCommand {
            document: PathBuf::from("notes.md"),
            instruction: "make it punchier".into(),
            selection: selection.map(str::to_string),
            skills,
            in_place: false,
        }
    }

    #[test]
    fn request_carries_selection_and_skills() {
        let request = build_request(
            &command(Some("second line"), vec![Skill::Style, Skill::Creative]),
            "first line\nsecond line",
        )
        .unwrap();
        assert_eq!(request.selected_text.as_deref(), Some("second line"));
        assert_eq!(request.skills, vec![Skill::Style, Skill::Creative]);
        assert!(request.system_prompt().contains("- Style Expert: Enhance writing style and flow"));
    }

    #[test]
    fn selection_must_occur_in_document() {
        let err = build_request(&command(Some("absent"), vec![]), "some text").unwrap_err();
        assert!(err.to_string().contains("selection not found"));
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = build_request(&command(None, vec![]), "").unwrap_err();
        assert_eq!(err.downcast_ref::<RefineError>(), Some(&RefineError::MissingInput));
    }

    #[test]
    fn refinement_replaces_text_and_saves_a_version() {
        let mut surface = DocumentSurface::new("notes.md", "draft");
        apply_refinement(&mut surface, "\n  final copy\n").unwrap();
        assert_eq!(surface.text(), "final copy");
        let version = surface.history().latest().unwrap();
        assert_eq!(version.document_text, "draft");
        assert_eq!(version.operation, "Refine");
        assert_eq!(version.mode_used, "refine");
    }

    #[test]
    fn blank_reply_keeps_the_document() {
        let mut surface = DocumentSurface::new("notes.md", "draft");
        assert!(apply_refinement(&mut surface, "  \n").is_err());
        assert_eq!(surface.text(), "draft");
        assert!(surface.history().is_empty());
    }
}
