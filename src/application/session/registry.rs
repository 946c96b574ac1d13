//! Session registry and expiry sweeper.
//!
//! Sessions are shared by every request that names their id, so the
//! registry hands out `Arc<Session>` clones. Uses `RwLock` because lookups
//! (every receiving and sending request) vastly outnumber insertions.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::domain::session::{CloseStatus, SessionId};

use super::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Returns the registered session for `id`, creating it with `create`
    /// if there is none. The flag is true when the session was created.
    pub async fn get_or_insert_with<F>(&self, id: &SessionId, create: F) -> (Arc<Session>, bool)
    where
        F: FnOnce() -> Arc<Session>,
    {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(id) {
            return (existing.clone(), false);
        }
        let session = create();
        sessions.insert(id.clone(), session.clone());
        debug!(session_id = %id, "Session registered");
        (session, true)
    }

    /// Removes `session` only if it is still the one registered under its id.
    pub async fn remove_if_same(&self, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(session.id()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(session.id());
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Closes sessions idle for longer than `disconnect_delay` and drops
    /// every closed session. Returns how many sessions were removed.
    pub async fn sweep(&self, disconnect_delay: Duration) -> usize {
        let snapshot: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut removed = 0;
        for session in snapshot {
            if !session.state().await.is_closed() {
                if !session.is_expired(disconnect_delay).await {
                    continue;
                }
                debug!(session_id = %session.id(), "Session expired");
                session.close(CloseStatus::GOING_AWAY).await;
            }
            if self.remove_if_same(&session).await {
                removed += 1;
            }
        }
        removed
    }

    /// Runs [`sweep`](Self::sweep) every `interval` until the registry is dropped.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        disconnect_delay: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let removed = registry.sweep(disconnect_delay).await;
                if removed > 0 {
                    let remaining = registry.len().await;
                    info!(removed, remaining, "Swept sessions");
                }
            }
        })
    }
}
