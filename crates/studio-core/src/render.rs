//! Output seams used by the session driver.

use crate::artifact::Artifact;

/// Receives the conversational side of a session.
pub trait ChatRenderer {
    /// Called after every chunk with the current chat text.
    fn render_chat(&mut self, text: &str);

    /// Called once with the final chat text when the session completes.
    fn finish_chat(&mut self, text: &str) {
        self.render_chat(text);
    }

    /// Called once when the source reports an error.
    fn render_error(&mut self, message: &str);
}

/// Receives the finalized artifact of a session.
pub trait ArtifactRenderer {
    /// Replaces any previously displayed document.
    fn render_artifact(&mut self, artifact: &Artifact);
}

