//! Whole-document refinement guided by selectable expert skills.
//!
//! Unlike the edit path, the model returns plain text: the complete revised
//! document, with no JSON envelope.

use std::fmt;
use std::str::FromStr;

/// Used in place of the skill list when no skill is active.
pub const NO_SKILLS_FALLBACK: &str = "No specific skills selected - use general best practices.";

const SYSTEM_PROMPT_RULES: &str = "When refining content:
1. Consider the user's specific instruction
2. Apply the active skills to improve the content
3. If text is selected, focus on that part but review the entire document for coherence
4. Return the COMPLETE revised document (not just the changed section)
5. Maintain the original meaning and facts unless explicitly asked to change them
6. Ensure all parts of the document flow together naturally

Return ONLY the revised content without explanations or meta-commentary.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefineError {
    #[error("unknown skill: {0}")]
    UnknownSkill(String),
    #[error("document and instruction are required")]
    MissingInput,
}

/// An expert lens the refiner can be asked to apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Grammar,
    Style,
    Conciseness,
    Technical,
    Creative,
}

impl Skill {
    pub const ALL: [Skill; 5] = [
        Self::Grammar,
        Self::Style,
        Self::Conciseness,
        Self::Technical,
        Self::Creative,
    ];

    /// Id accepted on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Style => "style",
            Self::Conciseness => "conciseness",
            Self::Technical => "technical",
            Self::Creative => "creative",
        }
    }

    /// Name used in the system prompt's skill list.
    pub fn label(self) -> &'static str {
        match self {
            Self::Grammar => "Grammar Expert",
            Self::Style => "Style Expert",
            Self::Conciseness => "Conciseness Expert",
            Self::Technical => "Technical Expert",
            Self::Creative => "Creative Expert",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Grammar => "Improve grammar and clarity",
            Self::Style => "Enhance writing style and flow",
            Self::Conciseness => "Make content more concise",
            Self::Technical => "Improve technical accuracy",
            Self::Creative => "Add creative flair and engagement",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Skill {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|skill| skill.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RefineError::UnknownSkill(s.to_string()))
    }
}

/// One refinement request against a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefineRequest {
    pub document: String,
    pub instruction: String,
    pub selected_text: Option<String>,
    pub skills: Vec<Skill>,
}

impl RefineRequest {
    pub fn new(document: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            instruction: instruction.into(),
            selected_text: None,
            skills: Vec::new(),
        }
    }

    pub fn selected_text(mut self, text: impl Into<String>) -> Self {
        self.selected_text = Some(text.into());
        self
    }

    /// Activates `skill`. Activating a skill twice has no extra effect.
    pub fn skill(mut self, skill: Skill) -> Self {
        if !self.skills.contains(&skill) {
            self.skills.push(skill);
        }
        self
    }

    pub fn validate(&self) -> Result<(), RefineError> {
        if self.document.is_empty() || self.instruction.trim().is_empty() {
            return Err(RefineError::MissingInput);
        }
        Ok(())
    }

    fn selection(&self) -> Option<&str> {
        self.selected_text.as_deref().filter(|s| !s.is_empty())
    }

    /// System prompt listing the active skills, in activation order.
    pub fn system_prompt(&self) -> String {
        let skills = if self.skills.is_empty() {
            NO_SKILLS_FALLBACK.to_string()
        } else {
            self.skills
                .iter()
                .map(|s| format!("- {}: {}", s.label(), s.description()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "You are an expert content editor helping to refine written content. The following expert skills are currently active and should guide your editing:\n\n{skills}\n\n{SYSTEM_PROMPT_RULES}"
        )
    }

    /// User prompt; a non-empty selection switches to the focused form.
    pub fn user_prompt(&self) -> String {
        match self.selection() {
            Some(selected) => format!(
                "Here is the full document:\n\n<document>\n{}\n</document>\n\nThe user has selected this specific text to focus on:\n<selected_text>\n{selected}\n</selected_text>\n\nUser instruction: {}\n\nPlease revise the document according to the instruction, paying special attention to the selected text, but return the COMPLETE updated document.",
                self.document, self.instruction
            ),
            None => format!(
                "Here is the document to refine:\n\n<document>\n{}\n</document>\n\nUser instruction: {}\n\nPlease revise the document according to the instruction and return the COMPLETE updated document.",
                self.document, self.instruction
            ),
        }
    }
}
