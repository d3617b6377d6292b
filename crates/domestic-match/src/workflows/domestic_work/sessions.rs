use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::gateway::SubmissionGateway;
use super::wizard::RegistrationWizard;

pub type SharedWizard = Arc<AsyncMutex<RegistrationWizard>>;

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct Session {
    wizard: SharedWizard,
    last_touched: Instant,
}

impl Session {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_touched) >= ttl
    }
}

/// In-process registry of wizards keyed by session id.
///
/// A session nobody has looked up for `idle_ttl` counts as abandoned: lookups
/// no longer find it and the next sweep drops it along with its draft.
pub struct WizardSessions {
    gateway: Arc<dyn SubmissionGateway>,
    page_size: u32,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl WizardSessions {
    pub fn new(gateway: Arc<dyn SubmissionGateway>, page_size: u32) -> Self {
        Self {
            gateway,
            page_size,
            idle_ttl: DEFAULT_IDLE_TTL,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub fn create(&self) -> (Uuid, SharedWizard) {
        self.evict_idle();

        let id = Uuid::new_v4();
        let wizard =
            RegistrationWizard::new(Arc::clone(&self.gateway)).with_page_size(self.page_size);
        let shared = Arc::new(AsyncMutex::new(wizard));

        self.lock().insert(
            id,
            Session {
                wizard: Arc::clone(&shared),
                last_touched: Instant::now(),
            },
        );
        info!(session_id = %id, "wizard session opened");
        (id, shared)
    }

    /// Look a session up and mark it as used.
    pub fn get(&self, id: &Uuid) -> Option<SharedWizard> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let session = sessions.get_mut(id)?;
        if !session.is_expired(now, self.idle_ttl) {
            session.last_touched = now;
            return Some(Arc::clone(&session.wizard));
        }

        sessions.remove(id);
        info!(session_id = %id, "idle wizard session expired");
        None
    }

    /// Remove a session. Returns `false` when it did not exist.
    pub fn discard(&self, id: &Uuid) -> bool {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            info!(session_id = %id, "wizard session discarded");
        }
        removed.is_some()
    }

    /// Drop every session idle for longer than the TTL; returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.idle_ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "idle wizard sessions evicted");
        } else {
            debug!(remaining = sessions.len(), "no idle wizard sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WizardSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSessions")
            .field("page_size", &self.page_size)
            .field("idle_ttl", &self.idle_ttl)
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}
