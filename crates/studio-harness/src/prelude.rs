//! Imports for typical harness usage.
pub use crate::{
    AbortHandle, ChatTurn, Harness, HarnessBuilder, HarnessError, ModelRef, ProviderId,
    RunBuilder, RunOutput, RunStream, Session, SessionConfig, StreamEvent,
};
