//! C9 — Multi-Resolver Query Service. Fans out to the fixed six-server
//! pool, one pinned [`TrustDnsLookup`] per server, each under a 5 s
//! hard timeout, and reports per-server plus aggregate results.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{ResolverEndpoint, ResolverProvider, RESOLVER_POOL};
use crate::resolver::dns::TrustDnsLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryRecordType {
    Txt,
    Mx,
    Cname,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeError {
    NoRecordsFound,
    Timeout,
    ServerFailure,
    Other(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PerServerQueryResult {
    pub server: std::net::IpAddr,
    pub provider: ResolverProvider,
    pub success: bool,
    pub records: Vec<String>,
    pub matches_expected: bool,
    pub error: Option<ProbeError>,
    pub queried_at: DateTime<Utc>,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiServerQueryResult {
    pub results: Vec<PerServerQueryResult>,
    pub propagation_percentage: u32,
    pub propagated_servers: usize,
    pub total_servers: usize,
    pub is_propagated: bool,
    pub queried_at: DateTime<Utc>,
}

/// Case-insensitive, whitespace-trimmed exact compare against any
/// returned record.
fn matches_any(records: &[String], expected: &str) -> bool {
    let expected = expected.trim();
    records
        .iter()
        .any(|r| r.trim().eq_ignore_ascii_case(expected))
}

async fn probe_one(
    endpoint: ResolverEndpoint,
    resolver: &TrustDnsLookup,
    name: &str,
    record_type: QueryRecordType,
    expected: Option<&str>,
    timeout: Duration,
) -> PerServerQueryResult {
    let queried_at = Utc::now();
    let started = Instant::now();

    let fetch = async {
        match record_type {
            QueryRecordType::Txt => resolver.resolve_txt(name).await,
            QueryRecordType::Mx => resolver
                .lookup_mx_formatted(name)
                .await,
            QueryRecordType::Cname => resolver.resolve_cname(name).await,
        }
    };

    let outcome = tokio::time::timeout(timeout, fetch).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Err(_) => PerServerQueryResult {
            server: endpoint.ip,
            provider: endpoint.provider,
            success: false,
            records: vec![],
            matches_expected: false,
            error: Some(ProbeError::Timeout),
            queried_at,
            response_time_ms,
        },
        Ok(Err(e)) => {
            let error = classify_error(&e);
            PerServerQueryResult {
                server: endpoint.ip,
                provider: endpoint.provider,
                success: false,
                records: vec![],
                matches_expected: false,
                error: Some(error),
                queried_at,
                response_time_ms,
            }
        }
        Ok(Ok(records)) => {
            if records.is_empty() {
                PerServerQueryResult {
                    server: endpoint.ip,
                    provider: endpoint.provider,
                    success: false,
                    records,
                    matches_expected: false,
                    error: Some(ProbeError::NoRecordsFound),
                    queried_at,
                    response_time_ms,
                }
            } else {
                let matches_expected = expected.is_some_and(|e| matches_any(&records, e));
                PerServerQueryResult {
                    server: endpoint.ip,
                    provider: endpoint.provider,
                    success: true,
                    records,
                    matches_expected,
                    error: None,
                    queried_at,
                    response_time_ms,
                }
            }
        }
    }
}

fn classify_error(e: &anyhow::Error) -> ProbeError {
    let msg = e.to_string().to_ascii_lowercase();
    if msg.contains("no records found") || msg.contains("nxdomain") || msg.contains("nodata") {
        ProbeError::NoRecordsFound
    } else if msg.contains("timed out") || msg.contains("timeout") {
        ProbeError::Timeout
    } else if msg.contains("servfail") || msg.contains("server failure") {
        ProbeError::ServerFailure
    } else {
        ProbeError::Other(e.to_string())
    }
}

/// Queries all six resolvers in parallel.
pub struct MultiResolverQueryService {
    timeout: Duration,
    resolvers: Vec<(ResolverEndpoint, TrustDnsLookup)>,
}

impl MultiResolverQueryService {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let mut resolvers = Vec::with_capacity(RESOLVER_POOL.len());
        for endpoint in RESOLVER_POOL {
            resolvers.push((endpoint, TrustDnsLookup::pinned(endpoint.ip, timeout)?));
        }
        Ok(Self { timeout, resolvers })
    }

    /// `queryDNSAcrossServers`: fans out to all six resolvers in
    /// parallel and aggregates.
    pub async fn query_across_servers(
        &self,
        name: &str,
        record_type: QueryRecordType,
        expected: Option<&str>,
    ) -> MultiServerQueryResult {
        let queried_at = Utc::now();
        let probes = self.resolvers.iter().map(|(endpoint, resolver)| {
            probe_one(*endpoint, resolver, name, record_type, expected, self.timeout)
        });
        let results: Vec<PerServerQueryResult> = futures::future::join_all(probes).await;

        let total_servers = results.len();
        let propagated_servers = results.iter().filter(|r| r.matches_expected).count();
        let propagation_percentage = if total_servers == 0 {
            0
        } else {
            ((propagated_servers as f64 / total_servers as f64) * 100.0).round() as u32
        };

        MultiServerQueryResult {
            results,
            propagation_percentage,
            propagated_servers,
            total_servers,
            is_propagated: propagation_percentage == 100,
            queried_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_any_is_case_insensitive_and_trims() {
        let records = vec![" v=spf1 include:_spf.example.com ~all ".to_string()];
        assert!(matches_any(&records, "V=SPF1 include:_spf.example.com ~all"));
    }

    #[test]
    fn classify_error_recognizes_timeout() {
        let err = anyhow::anyhow!("operation timed out");
        assert_eq!(classify_error(&err), ProbeError::Timeout);
    }
}
