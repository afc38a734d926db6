//! Durable storage seam for session records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use evc_core::{SessionState, Subject};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// One record per (session, subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub session_id: String,
    pub subject: Subject,
}

impl SessionKey {
    pub fn new(session_id: impl Into<String>, subject: Subject) -> Self {
        Self {
            session_id: session_id.into(),
            subject,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.subject)
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionState>>;
    async fn save(&self, state: &SessionState) -> Result<()>;
    async fn remove(&self, key: &SessionKey) -> Result<()>;
}

/// Process-local store. Records are kept as JSON so they go through the
/// same serialization path as a durable store.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<SessionKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionState>> {
        let records = self.records.read().await;
        match records.get(key) {
            Some(json) => {
                let state = serde_json::from_str(json).context("Failed to deserialize session state")?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize session state")?;
        let key = SessionKey::new(state.session_id.clone(), state.subject);
        self.records.write().await.insert(key, json);
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }
}
