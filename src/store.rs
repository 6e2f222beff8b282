//! The narrow typed store interfaces: DNS records, polling sessions,
//! and a read-only domain view, plus one in-memory implementation
//! backing all three, guarded by `parking_lot::Mutex`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::types::{Domain, DomainId, DnsRecord, PollingSession, RecordId, RecordType, SessionId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),
}

#[async_trait]
pub trait DnsRecordStore: Send + Sync {
    async fn insert(&self, record: DnsRecord) -> Result<(), StoreError>;
    async fn update(&self, record: DnsRecord) -> Result<(), StoreError>;
    async fn remove(&self, record_id: RecordId) -> Result<(), StoreError>;
    async fn list_active(&self, domain_id: DomainId) -> Result<Vec<DnsRecord>, StoreError>;
    async fn find_active_duplicate(
        &self,
        domain_id: DomainId,
        record_type: RecordType,
        name: &str,
        value: &str,
    ) -> Result<Option<DnsRecord>, StoreError>;
}

#[async_trait]
pub trait PollingSessionStore: Send + Sync {
    async fn insert(&self, session: PollingSession) -> Result<(), StoreError>;
    async fn update(&self, session: PollingSession) -> Result<(), StoreError>;
    async fn get(&self, session_id: SessionId) -> Result<Option<PollingSession>, StoreError>;
    async fn get_active_for_domain(&self, domain_id: DomainId) -> Result<Option<PollingSession>, StoreError>;
}

/// Read-only view of domains; the core never mutates this table.
pub trait DomainView: Send + Sync {
    fn get(&self, domain_id: DomainId) -> Option<Domain>;
}

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<RecordId, DnsRecord>>,
    sessions: Mutex<HashMap<SessionId, PollingSession>>,
    domains: Mutex<HashMap<DomainId, Domain>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_domain(&self, domain: Domain) {
        self.domains.lock().insert(domain.id, domain);
    }
}

#[async_trait]
impl DnsRecordStore for InMemoryStore {
    async fn insert(&self, record: DnsRecord) -> Result<(), StoreError> {
        // invariant: at most one active record per (domain, type,
        // name, value) tuple — the store is the authoritative guard.
        let key = record.dedup_key();
        let mut records = self.records.lock();
        let duplicate = records.values().any(|r| {
            matches!(r.status, crate::types::RecordStatus::Active) && r.dedup_key() == key && r.id != record.id
        });
        if duplicate {
            return Err(StoreError::Write(format!(
                "an active record already exists for {:?}/{}/{}",
                key.1, key.2, key.3
            )));
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, record: DnsRecord) -> Result<(), StoreError> {
        self.records.lock().insert(record.id, record);
        Ok(())
    }

    async fn remove(&self, record_id: RecordId) -> Result<(), StoreError> {
        self.records.lock().remove(&record_id);
        Ok(())
    }

    async fn list_active(&self, domain_id: DomainId) -> Result<Vec<DnsRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.domain_id == domain_id && matches!(r.status, crate::types::RecordStatus::Active))
            .cloned()
            .collect())
    }

    async fn find_active_duplicate(
        &self,
        domain_id: DomainId,
        record_type: RecordType,
        name: &str,
        value: &str,
    ) -> Result<Option<DnsRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .values()
            .find(|r| {
                r.domain_id == domain_id
                    && r.record_type == record_type
                    && r.name == name
                    && r.value == value
                    && matches!(r.status, crate::types::RecordStatus::Active)
            })
            .cloned())
    }
}

#[async_trait]
impl PollingSessionStore for InMemoryStore {
    async fn insert(&self, session: PollingSession) -> Result<(), StoreError> {
        self.sessions.lock().insert(session.id, session);
        Ok(())
    }

    async fn update(&self, session: PollingSession) -> Result<(), StoreError> {
        self.sessions.lock().insert(session.id, session);
        Ok(())
    }

    async fn get(&self, session_id: SessionId) -> Result<Option<PollingSession>, StoreError> {
        Ok(self.sessions.lock().get(&session_id).cloned())
    }

    async fn get_active_for_domain(&self, domain_id: DomainId) -> Result<Option<PollingSession>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .values()
            .find(|s| s.domain_id == domain_id && matches!(s.status, crate::types::SessionStatus::Polling))
            .cloned())
    }
}

impl DomainView for InMemoryStore {
    fn get(&self, domain_id: DomainId) -> Option<Domain> {
        self.domains.lock().get(&domain_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PropagationStatus, RecordPurpose, RecordStatus};

    fn sample_record(domain_id: DomainId) -> DnsRecord {
        DnsRecord {
            id: RecordId::new(),
            domain_id,
            record_type: RecordType::Txt,
            name: "@".to_string(),
            value: "v=spf1 ~all".to_string(),
            ttl: 3600,
            priority: None,
            purpose: RecordPurpose::Spf,
            status: RecordStatus::Active,
            propagation_status: PropagationStatus::Pending,
            propagation_coverage: 0,
            last_checked_at: None,
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn enforces_active_record_dedup_invariant() {
        let store = InMemoryStore::new();
        let domain_id = DomainId::new();
        let record = sample_record(domain_id);
        store.insert(record.clone()).await.unwrap();

        let mut duplicate = sample_record(domain_id);
        duplicate.name = record.name.clone();
        duplicate.value = record.value.clone();
        let err = store.insert(duplicate).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_active_excludes_removed() {
        let store = InMemoryStore::new();
        let domain_id = DomainId::new();
        let mut record = sample_record(domain_id);
        store.insert(record.clone()).await.unwrap();

        record.status = RecordStatus::Removed;
        DnsRecordStore::update(&store, record).await.unwrap();

        let active = store.list_active(domain_id).await.unwrap();
        assert!(active.is_empty());
    }
}
