//! Session State Manager
//!
//! Owns one record per (session, subject) and serializes every operation on
//! it. Locking is per key: a slow or busy session never blocks another one.
//!
//! Each key maps to an `Arc<Mutex<Slot>>`. The outer map lock is held only
//! long enough to find or insert the slot; all work happens under the slot's
//! own mutex. Tokio's mutex is FIFO, so turns for one key are applied in
//! arrival order.
//!
//! A turn is computed on a copy of the record and committed in one
//! assignment, so readers never observe a half-applied turn. The slot stays
//! locked through the store write, which keeps durable writes in turn order.
//!
//! Only active records keep a slot. Read-only calls on an id without a slot
//! go straight to the store under the map's read lock, and a slot that ends
//! an operation empty with no other holder is dropped from the map.

use crate::clock::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::store::{MemoryStore, SessionKey, StateStore};
use evc_core::{AffectEngine, EvcConfig, PublicState, SessionState, Stimulus, Subject};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

const MAX_SESSION_ID_LEN: usize = 128;
const DEFAULT_SESSION_ID: &str = "default";

/// Per-key lifecycle. `Unloaded` means the store has not been consulted yet.
#[derive(Debug)]
enum Slot {
    Unloaded,
    Uninitialized,
    /// Reset in memory, but the store may still hold the old record. Never
    /// pruned, or the stale record would be reloaded.
    Reset,
    Active(SessionState),
}

pub struct SessionManager {
    engine: AffectEngine,
    slots: RwLock<HashMap<SessionKey, Arc<Mutex<Slot>>>>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl SessionManager {
    pub fn new(config: EvcConfig, store: Arc<dyn StateStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EvcConfig, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let engine = AffectEngine::new(config);
        let lock_timeout = Duration::from_millis(engine.config().session.lock_timeout_ms);
        Self {
            engine,
            slots: RwLock::new(HashMap::new()),
            store,
            clock,
            lock_timeout,
        }
    }

    /// Manager backed by a process-local store.
    pub fn in_memory(config: EvcConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn engine(&self) -> &AffectEngine {
        &self.engine
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// The assistant record for `session_id`, created at baseline if absent.
    pub async fn get_or_create(&self, session_id: &str) -> Result<SessionState> {
        self.get_or_create_for(session_id, Subject::Assistant).await
    }

    pub async fn get_or_create_for(&self, session_id: &str, subject: Subject) -> Result<SessionState> {
        let key = self.key(session_id, subject);
        let mut slot = self.lock_loaded(&key).await?;

        if let Slot::Active(state) = &*slot {
            return Ok(state.clone());
        }
        let state = self.engine.initial_state(&key.session_id, subject);
        tracing::debug!(session = %key, "Session created");
        *slot = Slot::Active(state.clone());
        Ok(state)
    }

    /// Apply one turn to the assistant record.
    pub async fn apply_turn(&self, session_id: &str, stimulus: Stimulus) -> Result<PublicState> {
        self.apply_turn_for(session_id, Subject::Assistant, stimulus).await
    }

    /// Apply one turn to the given subject's record.
    ///
    /// On a store failure the turn still takes effect in memory and the
    /// error carries its result.
    pub async fn apply_turn_for(&self, session_id: &str, subject: Subject, stimulus: Stimulus) -> Result<PublicState> {
        let key = self.key(session_id, subject);
        let mut slot = self.lock_loaded(&key).await?;

        let mut next = match &*slot {
            Slot::Active(state) => state.clone(),
            _ => self.engine.initial_state(&key.session_id, subject),
        };
        let public = self.engine.apply_turn(&mut next, stimulus, self.clock.now_ms());
        let saved = self.store.save(&next).await;
        *slot = Slot::Active(next);

        match saved {
            Ok(()) => Ok(public),
            Err(source) => {
                tracing::warn!(session = %key, turn = public.turn, "Turn applied but not persisted: {:#}", source);
                Err(EngineError::Persistence {
                    session_id: key.session_id,
                    source,
                    state: Some(Box::new(public)),
                })
            }
        }
    }

    /// Feed one exchange's stimulus to both the assistant and the user model.
    /// The two records are locked one after the other, never together.
    ///
    /// Once the assistant turn has taken effect (even unpersisted) the user
    /// turn always runs too, so both records advance together. The first
    /// error is returned after both have run.
    pub async fn apply_exchange(&self, session_id: &str, stimulus: Stimulus) -> Result<(PublicState, PublicState)> {
        let assistant = match self.apply_turn_for(session_id, Subject::Assistant, stimulus).await {
            // Nothing was applied, so nothing to mirror
            Err(e) if e.applied_state().is_none() => return Err(e),
            other => other,
        };
        let user = self.apply_turn_for(session_id, Subject::User, stimulus).await;
        Ok((assistant?, user?))
    }

    /// Current assistant state with decay applied as of now. Consumes no turn.
    pub async fn peek(&self, session_id: &str) -> Result<PublicState> {
        self.peek_for(session_id, Subject::Assistant).await
    }

    /// Read-only: an unknown session previews its initial state without
    /// being created.
    pub async fn peek_for(&self, session_id: &str, subject: Subject) -> Result<PublicState> {
        let key = self.key(session_id, subject);
        if let Some(stored) = self.load_unslotted(&key).await? {
            let state = stored.unwrap_or_else(|| self.engine.initial_state(&key.session_id, subject));
            return Ok(self.engine.preview(&state, self.clock.now_ms()));
        }

        let slot = self.lock_loaded(&key).await?;
        let now = self.clock.now_ms();
        let public = match &*slot {
            Slot::Active(state) => self.engine.preview(state, now),
            _ => self
                .engine
                .preview(&self.engine.initial_state(&key.session_id, subject), now),
        };
        let idle = !matches!(*slot, Slot::Active(_));
        drop(slot);
        if idle {
            self.prune(&key).await;
        }
        Ok(public)
    }

    /// Discard both records for `session_id`. Each subject is locked separately.
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        let mut first_err = None;
        for subject in Subject::ALL {
            if let Err(e) = self.reset_for(session_id, subject).await {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn reset_for(&self, session_id: &str, subject: Subject) -> Result<()> {
        let key = self.key(session_id, subject);
        let mut slot = self.lock(&key).await?;

        let removed = self.store.remove(&key).await;
        *slot = match removed {
            Ok(()) => Slot::Uninitialized,
            Err(_) => Slot::Reset,
        };
        drop(slot);

        match removed {
            Ok(()) => {
                tracing::info!(session = %key, "Session reset");
                self.prune(&key).await;
                Ok(())
            }
            Err(source) => Err(EngineError::Persistence {
                session_id: key.session_id,
                source,
                state: None,
            }),
        }
    }

    /// The durable record, if the session is active.
    pub async fn snapshot(&self, session_id: &str, subject: Subject) -> Result<Option<SessionState>> {
        let key = self.key(session_id, subject);
        if let Some(stored) = self.load_unslotted(&key).await? {
            return Ok(stored);
        }

        let slot = self.lock_loaded(&key).await?;
        let state = match &*slot {
            Slot::Active(state) => Some(state.clone()),
            _ => None,
        };
        drop(slot);
        if state.is_none() {
            self.prune(&key).await;
        }
        Ok(state)
    }

    /// Install `state` as the record for its (session, subject), replacing
    /// whatever was there.
    pub async fn restore(&self, state: SessionState) -> Result<()> {
        let key = self.key(&state.session_id, state.subject);
        let mut slot = self.lock(&key).await?;

        let mut state = self.engine.adopt(state);
        state.session_id = key.session_id.clone();
        let saved = self.store.save(&state).await;
        *slot = Slot::Active(state);

        saved.map_err(|source| EngineError::Persistence {
            session_id: key.session_id,
            source,
            state: None,
        })
    }

    /// Keys with an active record in this process, sorted.
    pub async fn sessions(&self) -> Vec<SessionKey> {
        let slots = self.slots.read().await;
        let mut keys: Vec<SessionKey> = slots
            .iter()
            .filter(|(_, slot)| match slot.try_lock() {
                Ok(guard) => matches!(*guard, Slot::Active(_)),
                // Busy with a turn right now
                Err(_) => true,
            })
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn key(&self, session_id: &str, subject: Subject) -> SessionKey {
        SessionKey::new(normalize_session_id(session_id), subject)
    }

    async fn slot(&self, key: &SessionKey) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::Unloaded)))
            .clone()
    }

    async fn lock(&self, key: &SessionKey) -> Result<OwnedMutexGuard<Slot>> {
        let slot = self.slot(key).await;
        match tokio::time::timeout(self.lock_timeout, slot.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(session = %key, "Lock wait exceeded {:?}", self.lock_timeout);
                Err(EngineError::LockTimeout {
                    session_id: key.session_id.clone(),
                    subject: key.subject,
                    waited: self.lock_timeout,
                })
            }
        }
    }

    /// Lock and load; a failed load leaves no slot behind.
    async fn lock_loaded(&self, key: &SessionKey) -> Result<OwnedMutexGuard<Slot>> {
        let mut slot = self.lock(key).await?;
        if let Err(e) = self.ensure_loaded(key, &mut slot).await {
            drop(slot);
            self.prune(key).await;
            return Err(e);
        }
        Ok(slot)
    }

    /// `None` if `key` has a slot. Otherwise the stored record, read while
    /// holding the map's read lock so no slot can appear for it meanwhile.
    async fn load_unslotted(&self, key: &SessionKey) -> Result<Option<Option<SessionState>>> {
        let slots = self.slots.read().await;
        if slots.contains_key(key) {
            return Ok(None);
        }
        let loaded = self.store.load(key).await.map_err(|source| EngineError::Load {
            session_id: key.session_id.clone(),
            source,
        })?;
        Ok(Some(loaded.map(|state| self.engine.adopt(state))))
    }

    /// Drop the slot for `key` if it holds no record and nobody else holds it.
    async fn prune(&self, key: &SessionKey) {
        let mut slots = self.slots.write().await;
        let idle = slots.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .is_ok_and(|s| matches!(*s, Slot::Unloaded | Slot::Uninitialized))
        });
        if idle {
            slots.remove(key);
        }
    }

    async fn ensure_loaded(&self, key: &SessionKey, slot: &mut Slot) -> Result<()> {
        if !matches!(slot, Slot::Unloaded) {
            return Ok(());
        }
        let loaded = self.store.load(key).await.map_err(|source| EngineError::Load {
            session_id: key.session_id.clone(),
            source,
        })?;
        *slot = match loaded {
            Some(state) => {
                tracing::debug!(session = %key, turn = state.turn, "Session loaded from store");
                Slot::Active(self.engine.adopt(state))
            }
            None => Slot::Uninitialized,
        };
        Ok(())
    }
}

/// Control characters are dropped, whitespace trimmed, length capped; an
/// empty id maps to `"default"`.
pub fn normalize_session_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_SESSION_ID_LEN)
        .collect();
    if cleaned.is_empty() {
        DEFAULT_SESSION_ID.to_string()
    } else {
        cleaned
    }
}
