//! Per-connection sessions sharing one plugin set

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::Assistant;

/// Handle to one session; holding the lock serializes requests against it
pub type SessionHandle = Arc<Mutex<Assistant>>;

/// Live sessions keyed by id
///
/// Every session is spawned from the same prototype, so plugins (and any loaded
/// schema catalog) are built once and shared.
pub struct SessionRegistry {
    prototype: Assistant,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(prototype: Assistant) -> Self {
        Self {
            prototype,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session with an empty context
    pub async fn create(&self) -> Uuid {
        let id = Uuid::now_v7();
        let session = Arc::new(Mutex::new(self.prototype.spawn_session()));
        self.sessions.write().await.insert(id, session);
        info!(%id, "Session created");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Empty a session's context; false when the id is unknown
    pub async fn clear(&self, id: &Uuid) -> bool {
        let Some(session) = self.get(id).await else {
            debug!(%id, "SessionRegistry::clear: unknown session");
            return false;
        };
        session.lock().await.clear_session();
        true
    }

    /// Drop a session; false when the id is unknown
    pub async fn destroy(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(%id, "Session destroyed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
