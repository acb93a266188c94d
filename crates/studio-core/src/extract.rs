//! Splits streamed model text into conversational prose and at most one
//! artifact.
//!
//! The artifact is delimited as:
//!
//! ```text
//! <artifact identifier="ID" type="TYPE" title="TITLE">
//! BODY
//! </artifact>
//! ```
//!
//! [`extract`] is pure and is re-run on the whole buffer after every chunk.
//! Incomplete or malformed markup is never an error; it simply yields no
//! artifact and stays in the prose.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::Artifact;

const OPEN_MARKER: &str = "<artifact";

// Attributes are fixed-order and double-quoted; the body stops at the first
// closing marker.
static ARTIFACT_REGION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<artifact\s+identifier="([^"]*?)"\s+type="([^"]*?)"\s+title="([^"]*?)"\s*>(.*?)</artifact>"#,
    )
    .expect("artifact region pattern is valid")
});

/// Result of one extraction pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Extraction {
    /// Conversational text with the artifact region removed, trimmed.
    pub chat_text: String,
    /// The first complete artifact region, if any.
    pub artifact: Option<Artifact>,
}

impl Extraction {
    /// Whether a complete artifact region was found.
    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Separates `accumulated_text` into chat text and at most one artifact.
///
/// Only the first complete region is removed; any later regions stay in
/// `chat_text` verbatim. Without a complete region the result is the trimmed
/// input and no artifact.
pub fn extract(accumulated_text: &str) -> Extraction {
    let Some(caps) = ARTIFACT_REGION.captures(accumulated_text) else {
        return Extraction {
            chat_text: accumulated_text.trim().to_string(),
            artifact: None,
        };
    };
    let Some(region) = caps.get(0) else {
        return Extraction {
            chat_text: accumulated_text.trim().to_string(),
            artifact: None,
        };
    };

    let artifact = Artifact::new(&caps[1], &caps[2], &caps[3], caps[4].trim());

    let before = &accumulated_text[..region.start()];
    let mut after = &accumulated_text[region.end()..];
    // Collapse the gap left by the region onto the whitespace already before it.
    if before.is_empty() || before.ends_with(char::is_whitespace) {
        after = after.trim_start();
    }
    let mut chat_text = String::with_capacity(before.len() + after.len());
    chat_text.push_str(before);
    chat_text.push_str(after);

    Extraction {
        chat_text: chat_text.trim().to_string(),
        artifact: Some(artifact),
    }
}

/// Returns the prose that precedes an artifact still being streamed.
///
/// Cuts `chat_text` at the first opening marker, or at a trailing fragment
/// that could grow into one (`"<arti"`). Used for progressive display so raw
/// markup is not shown while the region is incomplete.
pub fn settled_prose(chat_text: &str) -> &str {
    if let Some(idx) = chat_text.find(OPEN_MARKER) {
        return chat_text[..idx].trim_end();
    }
    let tail_start = chat_text
        .char_indices()
        .rev()
        .take(OPEN_MARKER.len())
        .map(|(idx, _)| idx)
        .filter(|idx| OPEN_MARKER.starts_with(&chat_text[*idx..]))
        .last();
    match tail_start {
        Some(idx) => chat_text[..idx].trim_end(),
        None => chat_text,
    }
}
