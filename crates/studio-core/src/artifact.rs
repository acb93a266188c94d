use std::fmt;

/// Content-type tag attached to an artifact (for example `text/markdown`).
///
/// The vocabulary is open: unknown tags are preserved verbatim so new content
/// types can appear without changing the extractor.
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ArtifactKind(String);

impl ArtifactKind {
    /// Markdown documents, guides and prose.
    pub const MARKDOWN: &'static str = "text/markdown";
    /// Code snippets; the language is named in the title.
    pub const CODE: &'static str = "application/vnd.ant.code";
    /// HTML/CSS pages.
    pub const HTML: &'static str = "text/html";
    /// UI component source.
    pub const REACT: &'static str = "application/vnd.ant.react";

    const KNOWN: [&'static str; 4] = [Self::MARKDOWN, Self::CODE, Self::HTML, Self::REACT];

    /// Creates a kind from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the tag is one of the well-known content types.
    pub fn is_known(&self) -> bool {
        Self::KNOWN.contains(&self.0.as_str())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactKind {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArtifactKind {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Structured content block extracted from a model response.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Artifact {
    /// Short machine-readable slug. Uniqueness is advisory.
    pub identifier: String,
    /// Content-type tag (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    /// Human-readable label.
    pub title: String,
    /// Full text content.
    pub body: String,
}

impl Artifact {
    /// Creates an artifact.
    pub fn new(
        identifier: impl Into<String>,
        kind: impl Into<ArtifactKind>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind: kind.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// Delimiter form as the model writes it. Extracting the result yields
    /// this artifact again.
    pub fn to_markup(&self) -> String {
        format!(
            "<artifact identifier=\"{}\" type=\"{}\" title=\"{}\">\n{}\n</artifact>",
            self.identifier, self.kind, self.title, self.body
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_extracts_back_to_the_same_artifact() {
        let artifact = Artifact::new("plan", ArtifactKind::MARKDOWN, "Launch Plan", "# Launch\n\n- ship");
        let extraction = crate::extract(&artifact.to_markup());
        assert_eq!(extraction.artifact, Some(artifact));
        assert!(extraction.chat_text.is_empty());
    }

    #[test]
    fn kind_is_open_and_preserves_unknown_tags() {
        assert!(ArtifactKind::from("text/markdown").is_known());
        let custom = ArtifactKind::from("application/x-diagram");
        assert!(!custom.is_known());
        assert_eq!(custom.to_string(), "application/x-diagram");
    }

    #[test]
    fn artifact_serializes_kind_as_type() {
        let artifact = Artifact::new("doc-1", ArtifactKind::MARKDOWN, "My Doc", "body");
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["type"], "text/markdown");
        assert_eq!(value["identifier"], "doc-1");
    }
}
