//! C13 — Status Data Layer. Read-only, user-authorized views over
//! sessions and records, with a short-TTL process-local cache to
//! absorb the frontend's 30 s polling rhythm.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{DnsEngineError, Result};
use crate::store::{DnsRecordStore, DomainView, PollingSessionStore};
use crate::types::{DnsRecord, DomainId, PollingSession, SessionId};

#[derive(Clone)]
enum CacheEntry {
    Session(Option<PollingSession>),
    DomainSession(Option<PollingSession>),
    Records(Vec<DnsRecord>),
}

/// Authorization plus a 10 s read cache over the store.
pub struct StatusView {
    ttl: Duration,
    cache: Mutex<HashMap<String, (CacheEntry, Instant)>>,
}

impl StatusView {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<CacheEntry> {
        let cache = self.cache.lock();
        let (entry, inserted_at) = cache.get(key)?;
        if inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.clone())
    }

    fn store(&self, key: String, entry: CacheEntry) {
        self.cache.lock().insert(key, (entry, Instant::now()));
    }

    /// Any write (start, tick, cancel) must call this to keep the read
    /// cache from serving stale session/record state.
    pub fn invalidate_domain(&self, domain_id: DomainId) {
        let prefix = format!("domain:{domain_id}");
        self.cache.lock().retain(|k, _| !k.starts_with(&prefix) && !k.starts_with("session:"));
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// `getPollingSessionWithAuth`.
    pub async fn get_polling_session_with_auth(
        &self,
        store: &(impl PollingSessionStore + DomainView),
        session_id: SessionId,
        user_id: Uuid,
    ) -> Result<Option<PollingSession>> {
        let key = format!("session:{session_id}");
        if let Some(CacheEntry::Session(cached)) = self.cached(&key) {
            return Ok(authorize_session(cached, user_id));
        }

        let session = PollingSessionStore::get(store, session_id)
            .await
            .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
        self.store(key, CacheEntry::Session(session.clone()));
        Ok(authorize_session(session, user_id))
    }

    /// `getDomainActivePollingSession`.
    pub async fn get_domain_active_polling_session(
        &self,
        store: &(impl PollingSessionStore + DomainView),
        domain_id: DomainId,
        user_id: Uuid,
    ) -> Result<Option<PollingSession>> {
        if !authorized_for_domain(store, domain_id, user_id) {
            return Ok(None);
        }

        let key = format!("domain:{domain_id}:active_session");
        if let Some(CacheEntry::DomainSession(cached)) = self.cached(&key) {
            return Ok(cached);
        }

        let session = PollingSessionStore::get_active_for_domain(store, domain_id)
            .await
            .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
        self.store(key, CacheEntry::DomainSession(session.clone()));
        Ok(session)
    }

    /// `getDNSRecordStatuses`.
    pub async fn get_dns_record_statuses(
        &self,
        store: &(impl DnsRecordStore + DomainView),
        domain_id: DomainId,
        user_id: Uuid,
    ) -> Result<Vec<DnsRecord>> {
        if !authorized_for_domain(store, domain_id, user_id) {
            return Err(DnsEngineError::Validation(vec!["not authorized for this domain".to_string()]));
        }

        let key = format!("domain:{domain_id}:records");
        if let Some(CacheEntry::Records(cached)) = self.cached(&key) {
            return Ok(cached);
        }

        let records = store
            .list_active(domain_id)
            .await
            .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
        self.store(key, CacheEntry::Records(records.clone()));
        Ok(records)
    }
}

fn authorize_session(session: Option<PollingSession>, user_id: Uuid) -> Option<PollingSession> {
    session.filter(|s| s.user_id == user_id)
}

fn authorized_for_domain(store: &impl DomainView, domain_id: DomainId, user_id: Uuid) -> bool {
    store.get(domain_id).is_some_and(|d| d.owner_user_id == user_id)
}
