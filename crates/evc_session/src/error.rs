use evc_core::{PublicState, Subject};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Another operation held the session for longer than the lock timeout.
    /// Nothing was applied; the caller may retry.
    #[error("Timed out after {waited:?} waiting for session {session_id} ({subject})")]
    LockTimeout {
        session_id: String,
        subject: Subject,
        waited: Duration,
    },

    /// The turn was applied in memory but could not be written to the store.
    /// `state` carries the turn's result so the conversation can continue.
    #[error("Failed to persist session {session_id}: {source:#}")]
    Persistence {
        session_id: String,
        #[source]
        source: anyhow::Error,
        state: Option<Box<PublicState>>,
    },

    /// The stored record could not be read.
    #[error("Failed to load session {session_id}: {source:#}")]
    Load {
        session_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LockTimeout { .. } | EngineError::Load { .. })
    }

    /// The turn result carried by a persistence failure, if any.
    pub fn applied_state(&self) -> Option<&PublicState> {
        match self {
            EngineError::Persistence { state, .. } => state.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
