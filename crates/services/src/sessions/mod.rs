mod lifecycle;

// Public API of the session subsystem.
pub use crate::error::{InvalidState, SessionError};
pub use lifecycle::{CompletedSession, SessionDetail, SessionLifecycleService};
