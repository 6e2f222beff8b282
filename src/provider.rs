//! Authoritative DNS provider façade. The core only needs three
//! operations — `list`, `create`, `delete` — against an opaque
//! API token; everything else about the provider (auth, retries,
//! rate-limit backoff policy) belongs to the caller layer.
//!
//! Grounded on `dns-orchestrator`'s `provider/types.rs` record shapes,
//! adapted to the narrow façade this core actually calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RecordType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: String,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: Option<u32>,
    pub priority: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct NewProviderRecord {
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
    pub ttl: Option<u32>,
    pub priority: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider list failed: {0}")]
    List(String),
    #[error("provider create failed: {0}")]
    Create(String),
    #[error("provider delete failed: {0}")]
    Delete(String),
}

/// The three operations the core requires from the authoritative DNS
/// provider.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn list(&self, zone_handle: &str, token: &str) -> Result<Vec<ProviderRecord>, ProviderError>;
    async fn create(&self, zone_handle: &str, token: &str, record: NewProviderRecord) -> Result<String, ProviderError>;
    async fn delete(&self, zone_handle: &str, token: &str, record_id: &str) -> Result<(), ProviderError>;
}

/// In-memory provider used by tests, the CLI demo, and as a
/// reconciliation target in the absence of a real account.
#[derive(Default)]
pub struct InMemoryDnsProvider {
    zones: parking_lot::Mutex<std::collections::HashMap<String, Vec<ProviderRecord>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl InMemoryDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DnsProvider for InMemoryDnsProvider {
    async fn list(&self, zone_handle: &str, _token: &str) -> Result<Vec<ProviderRecord>, ProviderError> {
        Ok(self.zones.lock().get(zone_handle).cloned().unwrap_or_default())
    }

    async fn create(&self, zone_handle: &str, _token: &str, record: NewProviderRecord) -> Result<String, ProviderError> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            .to_string();
        let stored = ProviderRecord {
            id: id.clone(),
            record_type: record.record_type,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
            priority: record.priority,
        };
        self.zones.lock().entry(zone_handle.to_string()).or_default().push(stored);
        Ok(id)
    }

    async fn delete(&self, zone_handle: &str, _token: &str, record_id: &str) -> Result<(), ProviderError> {
        if let Some(records) = self.zones.lock().get_mut(zone_handle) {
            records.retain(|r| r.id != record_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_create_list_delete() {
        let provider = InMemoryDnsProvider::new();
        let id = provider
            .create(
                "zone-1",
                "token",
                NewProviderRecord {
                    record_type: RecordType::Txt,
                    name: "@".to_string(),
                    content: "v=spf1 ~all".to_string(),
                    ttl: Some(3600),
                    priority: None,
                },
            )
            .await
            .unwrap();

        let records = provider.list("zone-1", "token").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);

        provider.delete("zone-1", "token", &id).await.unwrap();
        let records = provider.list("zone-1", "token").await.unwrap();
        assert!(records.is_empty());
    }
}
