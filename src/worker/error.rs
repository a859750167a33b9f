use thiserror::Error;

/// Worker lifecycle errors.
///
/// Misuse of the lifecycle (joining an unstarted worker, starting twice) is a
/// bug in the orchestrator; a panic inside the work function is reported as
/// [`WorkerError::Panicked`] so the caller can turn it into result data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("worker '{0}' has not been started")]
    NotStarted(String),

    #[error("worker '{0}' was already started")]
    AlreadyStarted(String),

    #[error("worker '{0}' was already joined")]
    AlreadyJoined(String),

    #[error("failed to spawn worker '{name}': {reason}")]
    Spawn { name: String, reason: String },

    #[error("worker '{name}' panicked: {message}")]
    Panicked { name: String, message: String },
}

impl WorkerError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::NotStarted(_) => "WORKER_NOT_STARTED",
            WorkerError::AlreadyStarted(_) => "WORKER_ALREADY_STARTED",
            WorkerError::AlreadyJoined(_) => "WORKER_ALREADY_JOINED",
            WorkerError::Spawn { .. } => "WORKER_SPAWN",
            WorkerError::Panicked { .. } => "WORKER_PANICKED",
        }
    }

    /// Spawning can fail on transient OS resource limits; everything else is final.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WorkerError::Spawn { .. })
    }
}
