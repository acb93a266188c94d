use std::path::PathBuf;

use anyhow::{Context, anyhow};
use studio_core::edit::{
    AppliedEdit, EDIT_SYSTEM_PROMPT, EditMode, EditRequest, Selection, ToneStyle, apply_edit,
    parse_edit_response,
};
use studio_core::{DocumentSurface, Transcript};
use studio_harness::vendors::anthropic::ANTHROPIC_PROVIDER;
use studio_harness::{Harness, ModelRef, SessionConfig};
use tracing::{debug, info};

pub struct EditCommand {
    pub mode: EditMode,
    pub document: PathBuf,
    pub selection: Option<String>,
    pub instructions: Option<String>,
    pub tone: ToneStyle,
    pub in_place: bool,
}

pub async fn run(harness: &Harness, model: &'static str, cmd: EditCommand) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(&cmd.document)
        .with_context(|| format!("failed to read {}", cmd.document.display()))?;
    let (request, selection) = build_request(&cmd, &document)?;

    let mut transcript = Transcript::new();
    let action = request.action_message();
    transcript.push_edit_action(action.as_str(), cmd.mode.label());
    eprintln!("{action}");

    let raw = harness
        .session(SessionConfig::named("edit"))
        .run(ModelRef::new(ANTHROPIC_PROVIDER, model))
        .system_prompt(EDIT_SYSTEM_PROMPT)
        .user_text(request.user_prompt())
        .collect_text()
        .await?;

    let result = parse_edit_response(&raw).inspect_err(|err| {
        if let Some(raw) = err.raw_response() {
            debug!(raw, "unusable edit response");
        }
    })?;
    let applied = apply_edit(&document, selection.as_ref(), &result)?;

    let title = cmd
        .document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut surface = DocumentSurface::new(title, document);
    record_edit(&mut surface, cmd.mode, &applied);
    if let Some(explanation) = &applied.explanation {
        transcript.push_explanation(explanation.as_str());
        eprintln!("{explanation}");
    }
    info!(
        mode = cmd.mode.id(),
        changed = applied.changed,
        versions = surface.history().len(),
        "edit applied"
    );

    if !applied.changed {
        return Ok(());
    }
    if cmd.in_place {
        std::fs::write(&cmd.document, surface.text())
            .with_context(|| format!("failed to write {}", cmd.document.display()))?;
        eprintln!("updated {}", cmd.document.display());
    } else {
        println!("{}", surface.text());
    }
    Ok(())
}

// Every reply saves the pre-edit text, explanations included.
fn record_edit(surface: &mut DocumentSurface, mode: EditMode, applied: &AppliedEdit) {
    surface.save_version(mode.label(), mode.id());
    if applied.changed {
        surface.set_text(applied.document.as_str());
    }
}

fn build_request(
    cmd: &EditCommand,
    document: &str,
) -> anyhow::Result<(EditRequest, Option<Selection>)> {
    let selection = match cmd.selection.as_deref() {
        Some(needle) if cmd.mode.uses_selection() => Some(
            Selection::find(document, needle)
                .ok_or_else(|| anyhow!("selection not found in document: {needle:?}"))?,
        ),
        _ => None,
    };

    let mut request = EditRequest::new(cmd.mode, document).tone(cmd.tone);
    if let Some(selection) = &selection {
        request = request.selected_text(selection.text.as_str());
    }
    if let Some(instructions) = &cmd.instructions {
        request = request.instructions(instructions.as_str());
    }
    request.validate()?;
    Ok((request, selection))
}
