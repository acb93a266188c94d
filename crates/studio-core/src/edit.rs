//! Highlight-to-edit requests: modes, prompt construction and strict parsing
//! of the structured JSON reply.

use std::fmt;
use std::str::FromStr;

/// System prompt for streamed chat that may produce an artifact.
pub const CHAT_ARTIFACT_SYSTEM_PROMPT: &str = r#"You are an AI assistant that helps users create and refine content. You operate in a dual-panel interface:
- Left panel: Conversational chat with the user
- Right panel: Content editor for substantial artifacts

When the user requests substantial content creation or modification (documents, code, HTML, markdown, etc.), wrap the content in an artifact tag and place the content inside. Keep your conversational response separate from the artifact content.

Only create artifacts for substantial content (typically > 100 words or complex code). For brief responses, explanations, or metadata, respond conversationally without artifacts.

When creating an artifact, use this exact format:
<artifact identifier="unique-kebab-case-id" type="content-type" title="Human Readable Title">
[Content goes here - can be multiple lines]
</artifact>

Supported artifact types:
- text/markdown: markdown text, documentation, guides
- application/vnd.ant.code: code snippets (name the language in the title)
- text/html: HTML/CSS content and web pages
- application/vnd.ant.react: React components (JSX)

Guidelines:
1. Always include a descriptive title
2. Use kebab-case for the identifier
3. Produce at most one artifact per reply
4. Attribute values must not contain double quotes
5. If the user asks for edits to an artifact, create a new artifact with the updated content"#;

/// System prompt for the JSON edit engine.
pub const EDIT_SYSTEM_PROMPT: &str = r#"You are an AI editing engine for a content creation app with highlight-to-edit functionality.

Your role is to help users edit and improve their content by responding to specific editing modes and optional custom instructions.

## Contract

You will receive:
- A "mode" describing the type of operation (e.g., improve_selection, rewrite_selection, explain_selection, rewrite_document)
- "selectedText" (optional) - the user's highlighted text to edit
- "fullDocumentText" - the complete document for context
- "instructions" (optional) - custom user instructions that provide additional guidance

## Instruction Handling

If "instructions" is provided and non-empty:
- Treat the instructions as HIGH-PRIORITY guidance for editing the selected text
- Follow both the "mode" AND the custom instructions
- The instructions override default mode behavior when there's a conflict
- Example: If mode="improve_selection" but instructions="make it 2x longer", prioritize the length instruction

If "instructions" is empty or not provided:
- Apply the default behavior for the given mode

## Available Editing Modes

- "improve_selection": Enhance clarity, style, and flow of selected text while keeping the meaning
- "rewrite_selection": Completely rewrite selected text in a different way (respecting any instructions)
- "summarize_selection": Create a concise summary of selected text
- "expand_selection": Add more detail and depth to selected text
- "fix_grammar": Correct spelling, grammar, and punctuation in selected text
- "rewrite_document": Rewrite the entire document with improvements (respecting any instructions)
- "explain_selection": Provide an explanation of selected text (no text changes)

## Response Format

CRITICAL: You must ALWAYS respond with valid JSON only. No markdown, no backticks, no prose - just pure JSON.

Choose the appropriate format based on the mode:

For selection edits (improve, rewrite, summarize, expand, fix_grammar):
{
  "type": "selection_edit",
  "replacementText": "the edited version of the selected text",
  "explanation": "optional brief explanation of what you changed"
}

For full document edits (rewrite_document):
{
  "type": "document_edit",
  "newDocumentText": "the complete new document text",
  "explanation": "optional brief explanation of changes made"
}

For explanations only (explain_selection):
{
  "type": "explanation_only",
  "explanation": "your explanation of the selected text"
}

## Rules

1. Output ONLY the JSON object - no other text
2. Do not use markdown code fences or backticks
3. Keep explanations brief (1-2 sentences)
4. For selection edits, return ONLY the replacement for the selected portion (not the full document)
5. Preserve the original meaning unless the mode explicitly asks to change it or instructions require otherwise
6. For tone changes, adjust the writing style accordingly
7. When custom instructions conflict with mode, instructions take precedence
8. Always produce valid, parseable JSON"#;

/// Editing operation requested by the user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    ImproveSelection,
    RewriteSelection,
    SummarizeSelection,
    ExpandSelection,
    FixGrammar,
    RewriteDocument,
    ExplainSelection,
}

impl EditMode {
    pub const ALL: [EditMode; 7] = [
        Self::ImproveSelection,
        Self::RewriteSelection,
        Self::SummarizeSelection,
        Self::ExpandSelection,
        Self::FixGrammar,
        Self::RewriteDocument,
        Self::ExplainSelection,
    ];

    /// Wire id, as used in prompts and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Self::ImproveSelection => "improve_selection",
            Self::RewriteSelection => "rewrite_selection",
            Self::SummarizeSelection => "summarize_selection",
            Self::ExpandSelection => "expand_selection",
            Self::FixGrammar => "fix_grammar",
            Self::RewriteDocument => "rewrite_document",
            Self::ExplainSelection => "explain_selection",
        }
    }

    /// Menu label; also the operation name stored with saved versions.
    pub fn label(self) -> &'static str {
        match self {
            Self::ImproveSelection => "Improve Writing",
            Self::RewriteSelection => "Rewrite in New Tone",
            Self::SummarizeSelection => "Summarize",
            Self::ExpandSelection => "Expand",
            Self::FixGrammar => "Fix Grammar",
            Self::RewriteDocument => "Rewrite Entire Document",
            Self::ExplainSelection => "Explain",
        }
    }

    /// One-line help text for the mode.
    pub fn description(self) -> &'static str {
        match self {
            Self::ImproveSelection => "Enhance clarity, style, and flow",
            Self::RewriteSelection => "Rewrite with a different tone or style",
            Self::SummarizeSelection => "Create a concise summary",
            Self::ExpandSelection => "Add more detail and depth",
            Self::FixGrammar => "Correct spelling and grammar",
            Self::RewriteDocument => "Rewrite the whole document",
            Self::ExplainSelection => "Explain the selected text",
        }
    }

    /// Whether the mode takes a tone style.
    pub fn requires_tone(self) -> bool {
        matches!(self, Self::RewriteSelection)
    }

    /// Whether the mode operates on a selection rather than the whole document.
    pub fn uses_selection(self) -> bool {
        !matches!(self, Self::RewriteDocument)
    }

    // Verb phrase completed by "the selected text above."
    fn selection_action(self, tone: ToneStyle) -> String {
        match self {
            Self::ImproveSelection => "Improve the clarity, style, and flow of".to_string(),
            Self::RewriteSelection => format!("Rewrite in a {} tone", tone.id()),
            Self::SummarizeSelection => "Create a concise summary of".to_string(),
            Self::ExpandSelection => "Expand with more detail and depth".to_string(),
            Self::FixGrammar => "Fix spelling, grammar, and punctuation in".to_string(),
            Self::RewriteDocument | Self::ExplainSelection => "Edit".to_string(),
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EditMode {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.id() == s.trim())
            .ok_or_else(|| EditError::UnknownMode(s.to_string()))
    }
}

/// Tone used by [`EditMode::RewriteSelection`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneStyle {
    #[default]
    Professional,
    Casual,
    Friendly,
    Formal,
    Playful,
    Confident,
    Empathetic,
}

impl ToneStyle {
    pub const ALL: [ToneStyle; 7] = [
        Self::Professional,
        Self::Casual,
        Self::Friendly,
        Self::Formal,
        Self::Playful,
        Self::Confident,
        Self::Empathetic,
    ];

    /// Lowercase tone name used in prompts.
    pub fn id(self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Friendly => "friendly",
            Self::Formal => "formal",
            Self::Playful => "playful",
            Self::Confident => "confident",
            Self::Empathetic => "empathetic",
        }
    }
}

impl FromStr for ToneStyle {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tone| tone.id() == needle)
            .ok_or_else(|| EditError::UnknownTone(s.to_string()))
    }
}

/// Errors from building edit requests or interpreting edit replies.
///
/// Reply errors keep the raw model output for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("unknown edit mode: {0}")]
    UnknownMode(String),
    #[error("unknown tone style: {0}")]
    UnknownTone(String),
    #[error("document is empty; add some content first")]
    EmptyDocument,
    #[error("no text selected for {mode}")]
    MissingSelection { mode: EditMode },
    #[error("selection {start}..{end} is outside the document")]
    SelectionOutOfRange { start: usize, end: usize },
    #[error("model returned invalid JSON: {message}")]
    InvalidJson { message: String, raw: String },
    #[error("invalid response structure - missing type field")]
    MissingType { raw: String },
    #[error("unrecognized edit response: {message}")]
    Malformed { message: String, raw: String },
}

impl EditError {
    /// Raw model output attached to reply errors.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::InvalidJson { raw, .. } | Self::MissingType { raw } | Self::Malformed { raw, .. } => {
                Some(raw)
            }
            _ => None,
        }
    }
}

/// A highlighted range of the document, in byte offsets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Selection {
    /// Builds a selection over `document[start..end]`.
    pub fn new(document: &str, start: usize, end: usize) -> Result<Self, EditError> {
        let text = document
            .get(start..end)
            .ok_or(EditError::SelectionOutOfRange { start, end })?;
        Ok(Self {
            start,
            end,
            text: text.to_string(),
        })
    }

    /// Selects the first occurrence of `needle` in `document`.
    pub fn find(document: &str, needle: &str) -> Option<Self> {
        if needle.is_empty() {
            return None;
        }
        let start = document.find(needle)?;
        Some(Self {
            start,
            end: start + needle.len(),
            text: needle.to_string(),
        })
    }
}

/// One edit request against a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditRequest {
    pub mode: EditMode,
    pub selected_text: Option<String>,
    pub full_document_text: String,
    pub instructions: Option<String>,
    pub tone: ToneStyle,
}

impl EditRequest {
    pub fn new(mode: EditMode, full_document_text: impl Into<String>) -> Self {
        Self {
            mode,
            selected_text: None,
            full_document_text: full_document_text.into(),
            instructions: None,
            tone: ToneStyle::default(),
        }
    }

    pub fn selected_text(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = Some(text.into());
        self
    }

    pub fn tone(mut self, tone: ToneStyle) -> Self {
        self.tone = tone;
        self
    }

    pub fn validate(&self) -> Result<(), EditError> {
        if self.full_document_text.trim().is_empty() {
            return Err(EditError::EmptyDocument);
        }
        let has_selection = self
            .selected_text
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if self.mode.uses_selection() && !has_selection {
            return Err(EditError::MissingSelection { mode: self.mode });
        }
        Ok(())
    }

    /// Builds the user prompt sent alongside [`EDIT_SYSTEM_PROMPT`].
    pub fn user_prompt(&self) -> String {
        let selected = self.selected_text.as_deref().unwrap_or_default();
        let mut prompt = match self.mode {
            EditMode::ExplainSelection => {
                return format!(
                    "Explain this text:\n\n{selected}\n\nProvide a clear, concise explanation."
                );
            }
            EditMode::RewriteDocument => format!(
                "Rewrite this entire document to improve clarity, flow, and impact:\n\n{}",
                self.full_document_text
            ),
            mode => format!(
                "Full document for context:\n{}\n\n---\n\nSelected text to edit:\n{selected}\n\n---\n\n{} the selected text above.",
                self.full_document_text,
                mode.selection_action(self.tone)
            ),
        };
        if let Some(instructions) = self
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            prompt.push_str("\n\nAdditional instructions: ");
            prompt.push_str(instructions);
        }
        prompt
    }

    /// Transcript line logged before the request is sent.
    pub fn action_message(&self) -> String {
        let label = self.mode.label();
        match self.selected_text.as_deref() {
            Some(text) if self.mode.uses_selection() => {
                let preview: String = text.chars().take(50).collect();
                let ellipsis = if text.chars().count() > 50 { "..." } else { "" };
                format!("Applying \"{label}\" to selected text: \"{preview}{ellipsis}\"")
            }
            _ => format!("Applying \"{label}\" to entire document"),
        }
    }
}

/// Structured reply from the edit engine.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditResult {
    SelectionEdit {
        #[serde(rename = "replacementText")]
        replacement_text: String,
        #[serde(default)]
        explanation: Option<String>,
    },
    DocumentEdit {
        #[serde(rename = "newDocumentText")]
        new_document_text: String,
        #[serde(default)]
        explanation: Option<String>,
    },
    ExplanationOnly {
        explanation: String,
    },
}

impl EditResult {
    pub fn explanation(&self) -> Option<&str> {
        match self {
            Self::SelectionEdit { explanation, .. } | Self::DocumentEdit { explanation, .. } => {
                explanation.as_deref().filter(|s| !s.trim().is_empty())
            }
            Self::ExplanationOnly { explanation } => Some(explanation.as_str()),
        }
    }
}

/// Parses the edit engine's reply, tolerating markdown code fences.
pub fn parse_edit_response(raw: &str) -> Result<EditResult, EditError> {
    let cleaned = raw
        .replace("```json\n", "")
        .replace("```json", "")
        .replace("```\n", "")
        .replace("```", "");
    let cleaned = cleaned.trim();

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| EditError::InvalidJson {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;
    if value.get("type").and_then(|v| v.as_str()).is_none() {
        return Err(EditError::MissingType {
            raw: raw.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|e| EditError::Malformed {
        message: e.to_string(),
        raw: raw.to_string(),
    })
}

/// Outcome of applying an [`EditResult`] to a document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AppliedEdit {
    pub document: String,
    pub changed: bool,
    pub explanation: Option<String>,
}

/// Applies `result` to `document`. Selection edits splice the replacement
/// into the selected byte range.
pub fn apply_edit(
    document: &str,
    selection: Option<&Selection>,
    result: &EditResult,
) -> Result<AppliedEdit, EditError> {
    let explanation = result.explanation().map(ToOwned::to_owned);
    match result {
        EditResult::SelectionEdit {
            replacement_text, ..
        } => {
            let selection = selection.ok_or(EditError::MissingSelection {
                mode: EditMode::ImproveSelection,
            })?;
            let (Some(before), Some(after)) = (
                document.get(..selection.start),
                document.get(selection.end..),
            ) else {
                return Err(EditError::SelectionOutOfRange {
                    start: selection.start,
                    end: selection.end,
                });
            };
            if selection.start > selection.end {
                return Err(EditError::SelectionOutOfRange {
                    start: selection.start,
                    end: selection.end,
                });
            }
            Ok(AppliedEdit {
                document: format!("{before}{replacement_text}{after}"),
                changed: true,
                explanation,
            })
        }
        EditResult::DocumentEdit {
            new_document_text, ..
        } => Ok(AppliedEdit {
            document: new_document_text.clone(),
            changed: true,
            explanation,
        }),
        EditResult::ExplanationOnly { .. } => Ok(AppliedEdit {
            document: document.to_string(),
            changed: false,
            explanation,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_ids_round_trip() {
        for mode in EditMode::ALL {
            assert_eq!(mode.id().parse::<EditMode>().unwrap(), mode);
        }
        assert!(matches!(
            "shout".parse::<EditMode>(),
            Err(EditError::UnknownMode(_))
        ));
        assert!(EditMode::RewriteSelection.requires_tone());
        assert!(!EditMode::RewriteDocument.uses_selection());
    }

    #[test]
    fn tone_parse_is_case_insensitive() {
        assert_eq!("Playful".parse::<ToneStyle>().unwrap(), ToneStyle::Playful);
        assert_eq!(ToneStyle::default(), ToneStyle::Professional);
    }

    #[test]
    fn selection_prompt_includes_context_and_instructions() {
        let prompt = EditRequest::new(EditMode::FixGrammar, "Doc body.")
            .selected_text("teh cat")
            .instructions("keep it british")
            .user_prompt();
        assert_eq!(
            prompt,
            "Full document for context:\nDoc body.\n\n---\n\nSelected text to edit:\nteh cat\n\n---\n\nFix spelling, grammar, and punctuation in the selected text above.\n\nAdditional instructions: keep it british"
        );
    }

    #[test]
    fn rewrite_selection_prompt_names_tone() {
        let prompt = EditRequest::new(EditMode::RewriteSelection, "doc")
            .selected_text("hello")
            .tone(ToneStyle::Casual)
            .user_prompt();
        assert!(prompt.ends_with("Rewrite in a casual tone the selected text above."));
    }

    #[test]
    fn explain_prompt_ignores_instructions() {
        let prompt = EditRequest::new(EditMode::ExplainSelection, "doc")
            .selected_text("entropy")
            .instructions("be brief")
            .user_prompt();
        assert_eq!(
            prompt,
            "Explain this text:\n\nentropy\n\nProvide a clear, concise explanation."
        );
    }

    #[test]
    fn document_prompt_appends_instructions() {
        let prompt = EditRequest::new(EditMode::RewriteDocument, "whole doc")
            .instructions("shorter")
            .user_prompt();
        assert!(prompt.starts_with("Rewrite this entire document"));
        assert!(prompt.ends_with("\n\nAdditional instructions: shorter"));
    }

    #[test]
    fn validate_requires_document_and_selection() {
        assert_eq!(
            EditRequest::new(EditMode::RewriteDocument, "  ").validate(),
            Err(EditError::EmptyDocument)
        );
        assert_eq!(
            EditRequest::new(EditMode::ImproveSelection, "doc").validate(),
            Err(EditError::MissingSelection {
                mode: EditMode::ImproveSelection
            })
        );
        assert!(EditRequest::new(EditMode::RewriteDocument, "doc")
            .validate()
            .is_ok());
    }

    #[test]
    fn action_message_truncates_long_selection() {
        let long = "x".repeat(60);
        let msg = EditRequest::new(EditMode::ExpandSelection, "doc")
            .selected_text(long)
            .action_message();
        assert_eq!(
            msg,
            format!("Applying \"Expand\" to selected text: \"{}...\"", "x".repeat(50))
        );
        assert_eq!(
            EditRequest::new(EditMode::RewriteDocument, "doc").action_message(),
            "Applying \"Rewrite Entire Document\" to entire document"
        );
    }

    #[test]
    fn parses_fenced_selection_edit() {
        let raw = "```json\n{\"type\":\"selection_edit\",\"replacementText\":\"the cat\",\"explanation\":\"typo\"}\n```";
        assert_eq!(
            parse_edit_response(raw).unwrap(),
            EditResult::SelectionEdit {
                replacement_text: "the cat".into(),
                explanation: Some("typo".into()),
            }
        );
    }

    #[test]
    fn parses_document_edit_without_explanation() {
        let raw = r#"{"type":"document_edit","newDocumentText":"New doc"}"#;
        let result = parse_edit_response(raw).unwrap();
        assert_eq!(result.explanation(), None);
        assert!(matches!(result, EditResult::DocumentEdit { .. }));
    }

    #[test]
    fn invalid_json_keeps_raw_text() {
        let raw = "Sure! Here is the edit: the cat";
        let err = parse_edit_response(raw).unwrap_err();
        assert!(matches!(err, EditError::InvalidJson { .. }));
        assert_eq!(err.raw_response(), Some(raw));
    }

    #[test]
    fn missing_type_is_reported() {
        let err = parse_edit_response(r#"{"replacementText":"x"}"#).unwrap_err();
        assert!(matches!(err, EditError::MissingType { .. }));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = parse_edit_response(r#"{"type":"poem","text":"x"}"#).unwrap_err();
        assert!(matches!(err, EditError::Malformed { .. }));
        assert!(err.raw_response().is_some());
    }

    #[test]
    fn apply_selection_edit_splices_replacement() {
        let doc = "I has a cat.";
        let selection = Selection::find(doc, "has").unwrap();
        let result = EditResult::SelectionEdit {
            replacement_text: "have".into(),
            explanation: None,
        };
        let applied = apply_edit(doc, Some(&selection), &result).unwrap();
        assert_eq!(applied.document, "I have a cat.");
        assert!(applied.changed);
    }

    #[test]
    fn apply_explanation_leaves_document_alone() {
        let result = EditResult::ExplanationOnly {
            explanation: "It is a greeting.".into(),
        };
        let applied = apply_edit("hello", None, &result).unwrap();
        assert_eq!(applied.document, "hello");
        assert!(!applied.changed);
        assert_eq!(applied.explanation.as_deref(), Some("It is a greeting."));
    }

    #[test]
    fn selection_outside_document_is_rejected() {
        assert!(matches!(
            Selection::new("short", 2, 40),
            Err(EditError::SelectionOutOfRange { .. })
        ));
        let bogus = Selection {
            start: 3,
            end: 99,
            text: "x".into(),
        };
        let result = EditResult::SelectionEdit {
            replacement_text: "y".into(),
            explanation: None,
        };
        assert!(apply_edit("short", Some(&bogus), &result).is_err());
    }

    #[test]
    fn edit_prompt_lists_every_mode_and_response_shape() {
        for mode in EditMode::ALL {
            assert!(EDIT_SYSTEM_PROMPT.contains(&format!("\"{}\"", mode.id())), "{mode}");
        }
        for tag in ["selection_edit", "document_edit", "explanation_only"] {
            assert!(EDIT_SYSTEM_PROMPT.contains(&format!("\"type\": \"{tag}\"")), "{tag}");
        }
        assert!(EDIT_SYSTEM_PROMPT.contains("6. For tone changes, adjust the writing style accordingly"));
        assert!(EDIT_SYSTEM_PROMPT.ends_with("8. Always produce valid, parseable JSON"));
    }
}
