pub mod artifact;
pub mod board;
pub mod driver;
pub mod edit;
pub mod extract;
pub mod history;
pub mod observability;
pub mod refine;
pub mod render;
pub mod session;

// Streaming surface: extract, session, driver and the renderer seams.
pub use artifact::{Artifact, ArtifactKind};
pub use driver::{CancelHandle, DriveOutcome, SourceEvent, drive_session};
pub use extract::{Extraction, extract, settled_prose};
pub use history::{ChatMessage, ChatRole, DocumentSurface, DocumentVersion, Transcript};
pub use observability::init_observability;
pub use render::{ArtifactRenderer, ChatRenderer};
pub use session::{SessionError, SessionOutcome, SessionState, StreamSession};
