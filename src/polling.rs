//! C12 — Polling Session Scheduler. Drives C10 at a cadence for one
//! domain's active records until the session reaches a terminal state.
//! Exposes a single-tick function; the caller decides how it's driven
//! (timer, queue worker, external cron).

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DnsEngineError, Result};
use crate::propagation::{self, calculate_global_coverage, RecordPropagationResult};
use crate::resolver::multi::MultiResolverQueryService;
use crate::store::{DnsRecordStore, PollingSessionStore};
use crate::types::{DomainId, PollingSession, PropagationStatus, RecordPurpose, SessionId, SessionStatus};

/// `startPollingSession`: idempotent — returns the existing
/// active session for the domain if one exists.
pub async fn start_polling_session(
    domain_id: DomainId,
    user_id: Uuid,
    store: &(impl DnsRecordStore + PollingSessionStore),
    config: &Config,
) -> Result<PollingSession> {
    if let Some(existing) = PollingSessionStore::get_active_for_domain(store, domain_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?
    {
        return Ok(existing);
    }

    let active_records = store
        .list_active(domain_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;

    let session = PollingSession {
        id: SessionId::new(),
        domain_id,
        user_id,
        status: SessionStatus::Polling,
        check_interval_ms: config.check_interval.as_millis() as u64,
        max_duration_ms: config.session_horizon.as_millis() as u64,
        started_at: Utc::now(),
        last_checked_at: None,
        completed_at: None,
        estimated_completion: None,
        total_records: active_records.len() as u32,
        propagated_records: 0,
        overall_progress: 0,
        metadata: serde_json::json!({}),
    };

    PollingSessionStore::insert(store, session.clone())
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
    Ok(session)
}

/// A per-record propagation update, ready to persist onto a
/// `DnsRecord` row.
#[derive(Debug, Clone)]
struct RecordUpdate {
    record_id: crate::types::RecordId,
    coverage: u32,
    status: PropagationStatus,
}

/// `checkPollingProgress`: one tick. Returns the session's state
/// after the tick, unchanged if the session wasn't `polling`.
pub async fn check_polling_progress(
    session_id: SessionId,
    store: &(impl DnsRecordStore + PollingSessionStore),
    resolvers: &MultiResolverQueryService,
) -> Result<PollingSession> {
    let Some(mut session) = PollingSessionStore::get(store, session_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?
    else {
        return Err(DnsEngineError::Validation(vec![format!("no such session {session_id}")]));
    };

    if session.status != SessionStatus::Polling {
        return Ok(session);
    }

    let now = Utc::now();
    let elapsed_ms = (now - session.started_at).num_milliseconds().max(0) as u64;
    if elapsed_ms > session.max_duration_ms {
        session.status = SessionStatus::Timeout;
        session.completed_at = Some(now);
        PollingSessionStore::update(store, session.clone())
            .await
            .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
        return Ok(session);
    }

    let active_records = store
        .list_active(session.domain_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;

    // One C10 probe per active record, concurrently; store writes follow.
    let probes = active_records.iter().map(|record| {
        let fqdn_domain = record.metadata.get("apex_domain").and_then(|v| v.as_str()).unwrap_or_default();
        let selector_or_sub = record_selector_hint(record);
        async move {
            let result = propagation::check_record_propagation(
                resolvers,
                fqdn_domain,
                record.purpose,
                selector_or_sub.as_deref(),
                &record.value,
            )
            .await;
            (record.id, result)
        }
    });
    let probed: Vec<(crate::types::RecordId, RecordPropagationResult)> = futures::future::join_all(probes).await;

    let mut updates = Vec::with_capacity(probed.len());
    let mut aggregate_inputs = Vec::with_capacity(probed.len());
    for (record_id, result) in &probed {
        updates.push(RecordUpdate {
            record_id: *record_id,
            coverage: result.coverage_percentage,
            status: result.status,
        });
        aggregate_inputs.push(result.clone());
    }

    // Persist per-record updates in parallel; independent of each other.
    let persists = updates.iter().zip(active_records.iter()).map(|(update, record)| {
        let mut updated = record.clone();
        updated.propagation_coverage = update.coverage;
        updated.propagation_status = update.status;
        updated.last_checked_at = Some(now);
        DnsRecordStore::update(store, updated)
    });
    futures::future::join_all(persists).await;

    let coverage = calculate_global_coverage(&aggregate_inputs);
    session.last_checked_at = Some(now);
    session.propagated_records = coverage.fully_propagated as u32;
    session.overall_progress = coverage.mean_percentage;
    session.metadata = serde_json::json!({
        "fully": coverage.fully_propagated,
        "partial": coverage.partially_propagated,
        "none": coverage.not_propagated,
    });

    if coverage.mean_percentage == 100 {
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
    }

    PollingSessionStore::update(store, session.clone())
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;

    info!(
        "polling tick for session {session_id}: {}% ({} records)",
        session.overall_progress,
        active_records.len()
    );

    Ok(session)
}

/// Reads a domain hint off a record's metadata, used to reconstruct
/// the DKIM selector or tracking subdomain the propagation checker
/// needs; set by the orchestrator at insert time.
fn record_selector_hint(record: &crate::types::DnsRecord) -> Option<String> {
    match record.purpose {
        RecordPurpose::Dkim | RecordPurpose::Tracking => {
            record.name.split('.').next().map(|s| s.to_string())
        }
        _ => None,
    }
}

/// `cancelPollingSession`: unconditional terminal transition.
pub async fn cancel_polling_session(
    session_id: SessionId,
    store: &(impl DnsRecordStore + PollingSessionStore),
) -> Result<PollingSession> {
    let Some(mut session) = PollingSessionStore::get(store, session_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?
    else {
        return Err(DnsEngineError::Validation(vec![format!("no such session {session_id}")]));
    };

    session.status = SessionStatus::Cancelled;
    session.completed_at = Some(Utc::now());
    PollingSessionStore::update(store, session.clone())
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;
    Ok(session)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EtaConfidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct EtaEstimate {
    pub time_remaining_secs: u64,
    pub confidence: EtaConfidence,
    pub estimated_completion: Option<DateTime<Utc>>,
}

const CACHE_BUFFER_SECS: u64 = 15 * 60;

/// ETA: TTL-based when data is thin, velocity-based thereafter.
pub fn estimate_time_remaining(session: &PollingSession, avg_ttl: Duration) -> EtaEstimate {
    if session.status != SessionStatus::Polling {
        return EtaEstimate {
            time_remaining_secs: 0,
            confidence: EtaConfidence::High,
            estimated_completion: session.completed_at,
        };
    }

    let elapsed = (Utc::now() - session.started_at).num_seconds().max(0) as f64;
    let elapsed_minutes = elapsed / 60.0;

    let (remaining_secs, confidence) = if elapsed_minutes < 5.0 {
        (1.5 * avg_ttl.as_secs_f64(), EtaConfidence::Low)
    } else {
        let velocity = session.overall_progress as f64 / elapsed_minutes.max(0.001);
        let remaining_percent = (100 - session.overall_progress) as f64;
        let eta_minutes = if velocity > 0.0 { remaining_percent / velocity } else { f64::MAX };
        let confidence = if elapsed_minutes < 15.0 { EtaConfidence::Medium } else { EtaConfidence::High };
        (eta_minutes * 60.0, confidence)
    };

    let total_secs = (remaining_secs.min(i64::MAX as f64) as u64).saturating_add(CACHE_BUFFER_SECS);
    EtaEstimate {
        time_remaining_secs: total_secs,
        confidence,
        estimated_completion: Some(Utc::now() + chrono::Duration::seconds(total_secs as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn session(status: SessionStatus, overall_progress: u32, started_minutes_ago: i64) -> PollingSession {
        PollingSession {
            id: SessionId::new(),
            domain_id: DomainId::new(),
            user_id: Uuid::new_v4(),
            status,
            check_interval_ms: 30_000,
            max_duration_ms: 172_800_000,
            started_at: Utc::now() - chrono::Duration::minutes(started_minutes_ago),
            last_checked_at: None,
            completed_at: None,
            estimated_completion: None,
            total_records: 5,
            propagated_records: 0,
            overall_progress,
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn terminal_session_has_zero_remaining() {
        let eta = estimate_time_remaining(&session(SessionStatus::Completed, 100, 10), Duration::from_secs(3600));
        assert_eq!(eta.time_remaining_secs, 0);
    }

    #[test]
    fn thin_data_uses_ttl_based_low_confidence_estimate() {
        let eta = estimate_time_remaining(&session(SessionStatus::Polling, 20, 2), Duration::from_secs(3600));
        assert_eq!(eta.confidence, EtaConfidence::Low);
        assert!(eta.time_remaining_secs >= CACHE_BUFFER_SECS);
    }

    #[test]
    fn sufficient_data_uses_velocity_based_estimate() {
        let eta = estimate_time_remaining(&session(SessionStatus::Polling, 50, 20), Duration::from_secs(3600));
        assert_eq!(eta.confidence, EtaConfidence::High);
    }

    #[tokio::test]
    async fn start_polling_session_is_idempotent() {
        let store = InMemoryStore::new();
        let domain_id = DomainId::new();
        let user_id = Uuid::new_v4();
        let config = Config::default();

        let first = start_polling_session(domain_id, user_id, &store, &config).await.unwrap();
        let second = start_polling_session(domain_id, user_id, &store, &config).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn stale_session_times_out_without_probing() {
        let store = InMemoryStore::new();
        let seeded = session(SessionStatus::Polling, 10, 49 * 60);
        let seeded_id = seeded.id;
        PollingSessionStore::insert(&store, seeded).await.unwrap();

        // No active records and an unreachable resolver pool would both
        // make a real probe hang; the timeout branch must short-circuit
        // before either is touched.
        let resolvers = MultiResolverQueryService::new(Duration::from_millis(1)).unwrap();
        let ticked = check_polling_progress(seeded_id, &store, &resolvers).await.unwrap();
        assert_eq!(ticked.status, SessionStatus::Timeout);
        assert!(ticked.completed_at.is_some());
    }

    #[tokio::test]
    async fn cancel_is_unconditional_and_terminal() {
        let store = InMemoryStore::new();
        let domain_id = DomainId::new();
        let user_id = Uuid::new_v4();
        let config = Config::default();

        let session = start_polling_session(domain_id, user_id, &store, &config).await.unwrap();
        let cancelled = cancel_polling_session(session.id, &store).await.unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
    }
}
