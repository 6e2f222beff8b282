//! C10 — Propagation Checker. A thin semantic layer over the C9
//! multi-resolver query service: for a given record purpose, build the
//! right FQDN/record-type pair, classify each server's answer into one
//! of three disjoint buckets, and roll per-record results up into a
//! global coverage figure.

use serde::Serialize;

use crate::resolver::multi::{MultiResolverQueryService, MultiServerQueryResult, QueryRecordType};
use crate::types::{PropagationStatus, RecordPurpose};

/// Which of the three disjoint buckets a single server's answer for a
/// record falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerBucket {
    Correct,
    Missing,
    Wrong,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordPropagationResult {
    pub fqdn: String,
    pub record_type: QueryRecordType,
    pub correct: usize,
    pub missing: usize,
    pub wrong: usize,
    pub total_servers: usize,
    pub coverage_percentage: u32,
    pub status: PropagationStatus,
    pub raw: MultiServerQueryResult,
}

/// Per-record propagation status from server counts: `all` correct is
/// propagated, `any` correct is propagating, `none` is pending. This is
/// the count-based rule used for the per-tick per-record field, not
/// the percentage-bucket rule `PropagationStatus::from_percentage`
/// uses for global coverage classification.
fn status_from_counts(correct: usize, total_servers: usize) -> PropagationStatus {
    if total_servers > 0 && correct == total_servers {
        PropagationStatus::Propagated
    } else if correct > 0 {
        PropagationStatus::Propagating
    } else {
        PropagationStatus::Pending
    }
}

fn classify(result: &MultiServerQueryResult) -> (usize, usize, usize) {
    let mut correct = 0;
    let mut missing = 0;
    let mut wrong = 0;
    for server in &result.results {
        let bucket = if server.matches_expected {
            ServerBucket::Correct
        } else if server.records.is_empty() {
            ServerBucket::Missing
        } else {
            ServerBucket::Wrong
        };
        match bucket {
            ServerBucket::Correct => correct += 1,
            ServerBucket::Missing => missing += 1,
            ServerBucket::Wrong => wrong += 1,
        }
    }
    (correct, missing, wrong)
}

/// Builds the purpose-specific FQDN/record-type, probes across
/// the resolver pool, and buckets the per-server answers.
pub async fn check_record_propagation(
    service: &MultiResolverQueryService,
    domain: &str,
    purpose: RecordPurpose,
    selector_or_sub: Option<&str>,
    expected: &str,
) -> RecordPropagationResult {
    let (fqdn, record_type) = match purpose {
        RecordPurpose::Spf | RecordPurpose::Custom => (domain.to_string(), QueryRecordType::Txt),
        RecordPurpose::Dkim => {
            let selector = selector_or_sub.unwrap_or("default");
            (format!("{selector}._domainkey.{domain}"), QueryRecordType::Txt)
        }
        RecordPurpose::Dmarc => (format!("_dmarc.{domain}"), QueryRecordType::Txt),
        RecordPurpose::Mx => (domain.to_string(), QueryRecordType::Mx),
        RecordPurpose::Tracking => {
            let sub = selector_or_sub.unwrap_or("track");
            (format!("{sub}.{domain}"), QueryRecordType::Cname)
        }
    };

    let raw = service.query_across_servers(&fqdn, record_type, Some(expected)).await;
    let (correct, missing, wrong) = classify(&raw);
    let total_servers = raw.total_servers;
    let coverage_percentage = if total_servers == 0 {
        0
    } else {
        ((correct as f64 / total_servers as f64) * 100.0).round() as u32
    };

    let status = status_from_counts(correct, total_servers);

    RecordPropagationResult {
        fqdn,
        record_type,
        correct,
        missing,
        wrong,
        total_servers,
        coverage_percentage,
        status,
        raw,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GlobalCoverage {
    pub mean_percentage: u32,
    pub fully_propagated: usize,
    pub partially_propagated: usize,
    pub not_propagated: usize,
    pub total_records: usize,
}

/// `calculateGlobalCoverage`.
pub fn calculate_global_coverage(results: &[RecordPropagationResult]) -> GlobalCoverage {
    if results.is_empty() {
        return GlobalCoverage {
            mean_percentage: 0,
            fully_propagated: 0,
            partially_propagated: 0,
            not_propagated: 0,
            total_records: 0,
        };
    }

    let sum: u32 = results.iter().map(|r| r.coverage_percentage).sum();
    let mean_percentage = (sum as f64 / results.len() as f64).round() as u32;

    let fully_propagated = results.iter().filter(|r| r.coverage_percentage == 100).count();
    let not_propagated = results.iter().filter(|r| r.coverage_percentage == 0).count();
    let partially_propagated = results.len() - fully_propagated - not_propagated;

    GlobalCoverage {
        mean_percentage,
        fully_propagated,
        partially_propagated,
        not_propagated,
        total_records: results.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::multi::PerServerQueryResult;
    use chrono::Utc;

    fn fake_server(matches: bool, empty: bool) -> PerServerQueryResult {
        PerServerQueryResult {
            server: "1.1.1.1".parse().unwrap(),
            provider: crate::config::ResolverProvider::Cloudflare,
            success: !empty,
            records: if empty { vec![] } else { vec!["v=spf1 ~all".to_string()] },
            matches_expected: matches,
            error: None,
            queried_at: Utc::now(),
            response_time_ms: 10,
        }
    }

    fn fake_raw(servers: Vec<PerServerQueryResult>) -> MultiServerQueryResult {
        let total_servers = servers.len();
        let propagated_servers = servers.iter().filter(|s| s.matches_expected).count();
        MultiServerQueryResult {
            results: servers,
            propagation_percentage: ((propagated_servers as f64 / total_servers as f64) * 100.0).round() as u32,
            propagated_servers,
            total_servers,
            is_propagated: propagated_servers == total_servers,
            queried_at: Utc::now(),
        }
    }

    #[test]
    fn classify_splits_into_three_buckets() {
        let raw = fake_raw(vec![
            fake_server(true, false),
            fake_server(false, true),
            fake_server(false, false),
        ]);
        let (correct, missing, wrong) = classify(&raw);
        assert_eq!((correct, missing, wrong), (1, 1, 1));
    }

    #[test]
    fn global_coverage_buckets_records_by_percentage() {
        let full = RecordPropagationResult {
            fqdn: "a".to_string(),
            record_type: QueryRecordType::Txt,
            correct: 6,
            missing: 0,
            wrong: 0,
            total_servers: 6,
            coverage_percentage: 100,
            status: PropagationStatus::Propagated,
            raw: fake_raw(vec![fake_server(true, false); 6]),
        };
        let none = RecordPropagationResult {
            fqdn: "b".to_string(),
            record_type: QueryRecordType::Txt,
            correct: 0,
            missing: 6,
            wrong: 0,
            total_servers: 6,
            coverage_percentage: 0,
            status: PropagationStatus::Pending,
            raw: fake_raw(vec![fake_server(false, true); 6]),
        };
        let coverage = calculate_global_coverage(&[full, none]);
        assert_eq!(coverage.mean_percentage, 50);
        assert_eq!(coverage.fully_propagated, 1);
        assert_eq!(coverage.not_propagated, 1);
        assert_eq!(coverage.partially_propagated, 0);
    }

    // The percentage-bucket rule would call 10% coverage pending
    // (below its 40% threshold); the count rule used per-tick calls
    // any correct server propagating.
    #[test]
    fn status_from_counts_disagrees_with_percentage_rule_at_low_coverage() {
        assert_eq!(status_from_counts(1, 10), PropagationStatus::Propagating);
        assert_ne!(
            status_from_counts(1, 10),
            PropagationStatus::from_percentage(10)
        );
        assert_eq!(status_from_counts(0, 10), PropagationStatus::Pending);
        assert_eq!(status_from_counts(10, 10), PropagationStatus::Propagated);
        assert_eq!(status_from_counts(0, 0), PropagationStatus::Pending);
    }

    #[test]
    fn global_coverage_of_empty_slice_is_zero() {
        let coverage = calculate_global_coverage(&[]);
        assert_eq!(coverage.mean_percentage, 0);
        assert_eq!(coverage.total_records, 0);
    }
}
