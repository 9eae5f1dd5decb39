//! Session store
//!
//! Sessions are keyed by the opaque `Mcp-Session-Id` token. A caller-supplied
//! id is always adopted; a fresh one is generated only when none is given.
//! Idle sessions are dropped by [`spawn_session_reaper`].

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    initialized: AtomicBool,
    last_seen_ms: AtomicI64,
}

impl Session {
    fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            initialized: AtomicBool::new(false),
            last_seen_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn last_seen_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_seen_ms.load(Ordering::Acquire))
            .single()
            .unwrap_or(self.created_at)
    }

    /// Flips the session to initialized. Returns `true` only for the call
    /// that performed the transition.
    pub(crate) fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_seen_ms
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            initialized: self.is_initialized(),
            created_at: self.created_at,
            last_seen_at: self.last_seen_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub initialized: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_or_create(&self, id: Option<&str>) -> Arc<Session> {
        self.get_or_create_at(id, Utc::now())
    }

    /// Resolves a session, creating it under the given id when unknown.
    /// Lookup and insertion share one lock acquisition.
    pub fn get_or_create_at(&self, id: Option<&str>, now: DateTime<Utc>) -> Arc<Session> {
        let id = match id {
            Some(id) => id.to_string(),
            None => generate_session_id(),
        };

        let mut sessions = self.lock();
        if let Some(session) = sessions.get(&id) {
            session.touch(now);
            return Arc::clone(session);
        }

        debug!(session_id = %id, "session created");
        let session = Arc::new(Session::new(id.clone(), now));
        sessions.insert(id, Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops sessions not seen within `ttl` of `now`. Returns how many were removed.
    pub fn evict_idle(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.timestamp_millis().saturating_sub(ttl_ms);

        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen_ms.load(Ordering::Acquire) >= cutoff);
        before - sessions.len()
    }
}

pub fn spawn_session_reaper(
    store: Arc<SessionStore>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(ttl, Utc::now());
            if evicted > 0 {
                info!(
                    evicted,
                    remaining = store.len(),
                    ttl_secs = ttl.as_secs(),
                    "idle sessions evicted"
                );
            }
        }
    })
}
