use crate::store::{SessionKey, StateStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use evc_core::{SessionState, Subject};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// SQLite-backed store: one row per (session, subject), state as a JSON blob.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_state (
                session_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                state_json TEXT NOT NULL,
                turn INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (session_id, subject)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create session_state table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_state_updated ON session_state(updated_at)")
            .execute(&self.pool)
            .await
            .context("Failed to create session_state updated_at index")?;

        Ok(())
    }

    /// Stored keys, most recently updated first.
    pub async fn list_keys(&self) -> Result<Vec<SessionKey>> {
        let rows = sqlx::query("SELECT session_id, subject FROM session_state ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list sessions")?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let session_id: String = row.get("session_id");
            let subject: String = row.get("subject");
            match subject.parse::<Subject>() {
                Ok(subject) => keys.push(SessionKey { session_id, subject }),
                Err(e) => tracing::warn!("Skipping session row {}: {}", session_id, e),
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionState>> {
        let row = sqlx::query("SELECT state_json FROM session_state WHERE session_id = ? AND subject = ?")
            .bind(&key.session_id)
            .bind(key.subject.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query session_state")?;

        match row {
            Some(row) => {
                let json: String = row.get("state_json");
                let state = serde_json::from_str(&json)
                    .with_context(|| format!("Failed to deserialize session state {}", key))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_string(state).context("Failed to serialize session state")?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO session_state (session_id, subject, state_json, turn, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(session_id, subject) DO UPDATE SET
                state_json = excluded.state_json, turn = excluded.turn, updated_at = excluded.updated_at",
        )
        .bind(&state.session_id)
        .bind(state.subject.as_str())
        .bind(&json)
        .bind(i64::try_from(state.turn).unwrap_or(i64::MAX))
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save session state")?;

        tracing::debug!(session = %state.session_id, subject = %state.subject, turn = state.turn, "Session state saved");
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<()> {
        sqlx::query("DELETE FROM session_state WHERE session_id = ? AND subject = ?")
            .bind(&key.session_id)
            .bind(key.subject.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to delete session state")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evc_core::{AffectEngine, Stimulus};

    #[tokio::test]
    async fn test_sqlite_round_trip_and_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("evc.db")).await.unwrap();
        let engine = AffectEngine::default();

        let mut state = engine.initial_state("abc", Subject::Assistant);
        engine.apply_turn(&mut state, Stimulus::new(0.4, 0.2, 1.0), 1_000);
        store.save(&state).await.unwrap();

        engine.apply_turn(&mut state, Stimulus::new(0.1, 0.7, 1.2), 2_000);
        store.save(&state).await.unwrap();

        let key = SessionKey::new("abc", Subject::Assistant);
        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.list_keys().await.unwrap(), vec![key.clone()]);

        store.remove(&key).await.unwrap();
        assert!(store.load(&key).await.unwrap().is_none());
    }
}
