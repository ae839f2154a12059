use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::session::{Session, SessionId};
use crate::settings::PipelineSettings;

struct Entry {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

/// Live sessions keyed by id.
///
/// Each session sits behind its own mutex, so one session's interactions run
/// one at a time while different sessions proceed independently.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    settings: Arc<PipelineSettings>,
    greeting: String,
    /// `None` keeps sessions until they are removed.
    ttl: Option<Duration>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// A `ttl` of zero disables expiry.
    #[must_use]
    pub fn new(settings: Arc<PipelineSettings>, greeting: impl Into<String>, ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            settings,
            greeting: greeting.into(),
            ttl: (!ttl.is_zero()).then_some(ttl),
        }
    }

    fn sweep(&self, sessions: &mut HashMap<SessionId, Entry>, now: Instant) {
        let Some(ttl) = self.ttl else {
            return;
        };
        let before = sessions.len();
        sessions.retain(|_, e| now.duration_since(e.last_seen) < ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::info!(expired, "dropped idle sessions");
        }
    }

    /// Start a fresh Idle session.
    pub async fn create(&self) -> (SessionId, Arc<Mutex<Session>>) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(
            id,
            Arc::clone(&self.settings),
            self.greeting.clone(),
        )));
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions, now);
        sessions.insert(
            id,
            Entry {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        tracing::debug!(session = %id, "session created");
        (id, session)
    }

    /// Look up a session and mark it active.
    pub async fn get(&self, id: SessionId) -> Option<Arc<Mutex<Session>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions, now);
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(Arc::clone(&entry.session))
    }

    /// Tear a session down; returns whether it existed.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.lock().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.sweep(&mut sessions, Instant::now());
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
