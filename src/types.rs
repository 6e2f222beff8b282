use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(DomainId);
id_type!(RecordId);
id_type!(SessionId);

/// Opaque identifier, FQDN, provider-zone handle, ownership tag.
/// Read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub fqdn: String,
    pub zone_handle: String,
    pub owner_user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Txt,
    Mx,
    Cname,
    Ns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordPurpose {
    Spf,
    Dkim,
    Dmarc,
    Mx,
    Tracking,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropagationStatus {
    Pending,
    Propagating,
    Propagated,
}

impl PropagationStatus {
    /// `determinePropagationStatusEnum`.
    pub fn from_percentage(p: u32) -> Self {
        if p == 100 {
            PropagationStatus::Propagated
        } else if p >= 40 {
            PropagationStatus::Propagating
        } else {
            PropagationStatus::Pending
        }
    }
}

/// One provisioned record.
///
/// Invariant: at most one active record per `(domainId, type, name,
/// value)` tuple, enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: RecordId,
    pub domain_id: DomainId,
    pub record_type: RecordType,
    /// Label relative to the apex; `"@"` denotes the apex.
    pub name: String,
    pub value: String,
    pub ttl: u32,
    /// MX only, 0–65535.
    pub priority: Option<u16>,
    pub purpose: RecordPurpose,
    pub status: RecordStatus,
    pub propagation_status: PropagationStatus,
    /// 0–100.
    pub propagation_coverage: u32,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub metadata: serde_json::Value,
}

impl DnsRecord {
    pub fn dedup_key(&self) -> (DomainId, RecordType, String, String) {
        (self.domain_id, self.record_type, self.name.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Polling,
    Completed,
    Timeout,
    Cancelled,
}

/// A long-running propagation-polling session for one domain.
///
/// Invariants: a domain has at most one session in `Polling`;
/// `completed_at` is set iff `status != Polling`;
/// `overall_progress == 100 => status == Completed`; once
/// `now - started_at > max_duration`, the status monotonically becomes
/// `Timeout` and never returns to `Polling`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSession {
    pub id: SessionId,
    pub domain_id: DomainId,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub check_interval_ms: u64,
    pub max_duration_ms: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub estimated_completion: Option<chrono::DateTime<chrono::Utc>>,
    pub total_records: u32,
    pub propagated_records: u32,
    pub overall_progress: u32,
    pub metadata: serde_json::Value,
}
