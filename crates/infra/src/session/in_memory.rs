use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use courtside_auth::{NewSession, Session, SessionHandle};
use courtside_core::{Clock, SessionId, SystemClock};

use super::{SessionStore, expiry};
use crate::error::StoreError;

/// In-memory session table.
///
/// Every operation holds the mutex for its whole read-check-write sequence,
/// so concurrent readers of one id agree on whether it has expired.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, new: NewSession) -> Result<SessionHandle, StoreError> {
        let now = self.clock.now();
        let expires_at = expiry(now, self.ttl)?;
        let session = new.into_session(SessionId::new(), now, expires_at);
        let handle = session.handle();

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StoreError::poisoned("session.create"))?;
        sessions.insert(session.id, session);

        tracing::debug!(
            session = %handle.session_id.redacted(),
            expires_at = %handle.expires_at,
            "session created"
        );
        Ok(handle)
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StoreError::poisoned("session.get"))?;

        let now = self.clock.now();
        let expired = match sessions.get(&id) {
            None => return Ok(None),
            Some(session) => session.is_expired(now),
        };

        if expired {
            sessions.remove(&id);
            tracing::debug!(session = %id.redacted(), "expired session removed on read");
            return Ok(None);
        }
        Ok(sessions.get(&id).cloned())
    }

    async fn destroy(&self, id: SessionId) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| StoreError::poisoned("session.destroy"))?;
        sessions.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use courtside_auth::{Permission, Role, ScopeMemberships};
    use courtside_core::{ManualClock, OrgId, UserId};

    use super::*;

    fn new_session() -> NewSession {
        NewSession {
            user_id: UserId::new(),
            roles: vec![Role::from("OrgAdmin")],
            permissions: vec![Permission::from("teams.view")],
            explicit_permissions: vec![],
            active_org_id: Some(OrgId::from("org_1")),
            memberships: ScopeMemberships::default(),
        }
    }

    fn store() -> (Arc<ManualClock>, InMemorySessionStore) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = InMemorySessionStore::with_clock(Duration::minutes(15), clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn round_trip_returns_the_snapshot() {
        let (clock, store) = store();
        let input = new_session();
        let handle = store.create(input.clone()).await.unwrap();

        assert_eq!(handle.expires_at, clock.now() + Duration::minutes(15));

        let session = store.get(handle.session_id).await.unwrap().unwrap();
        assert_eq!(session.roles, input.roles);
        assert_eq!(session.permissions, input.permissions);
        assert_eq!(session.active_org_id, input.active_org_id);
    }

    #[tokio::test]
    async fn expired_sessions_are_deleted_on_read() {
        let (clock, store) = store();
        let handle = store.create(new_session()).await.unwrap();

        clock.advance(Duration::minutes(15));
        assert!(store.get(handle.session_id).await.unwrap().is_some());

        clock.advance(Duration::seconds(1));
        assert!(store.get(handle.session_id).await.unwrap().is_none());
        assert!(store.is_empty());

        // Rewinding time does not resurrect the deleted record.
        clock.set(handle.expires_at - Duration::minutes(1));
        assert!(store.get(handle.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrepresentable_expiry_is_an_error() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = InMemorySessionStore::with_clock(Duration::seconds(100_000_000_000_000), clock);

        let err = store.create(new_session()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { operation: "session.create", .. }));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_of_an_expired_session_all_miss() {
        let (clock, store) = store();
        let store = Arc::new(store);
        let id = store.create(new_session()).await.unwrap().session_id;
        clock.advance(Duration::minutes(15) + Duration::seconds(1));

        let reads: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get(id).await })
            })
            .collect();

        for read in reads {
            assert!(read.await.unwrap().unwrap().is_none());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn len_survives_a_poisoned_lock() {
        let (_clock, store) = store();
        let store = Arc::new(store);
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(store.create(new_session()))
            .unwrap();

        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.sessions.lock().unwrap();
            panic!("poison the session table");
        })
        .join();

        assert!(store.sessions.is_poisoned());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let (_clock, store) = store();
        let handle = store.create(new_session()).await.unwrap();

        store.destroy(handle.session_id).await.unwrap();
        store.destroy(handle.session_id).await.unwrap();
        store.destroy(SessionId::new()).await.unwrap();
        assert!(store.get(handle.session_id).await.unwrap().is_none());
    }
}
