//! C11 — Record Orchestrator. The single entry point that turns a
//! domain's email-platform intent into provisioned DNS records:
//! generate (C4–C8), batch-provision against the authoritative
//! provider with store-backed dedup, then aggregate a result.

use log::{info, warn};
use serde::Serialize;

use crate::dkim::{self, DkimRecord};
use crate::dmarc::{self, DmarcConfig, DmarcRecord};
use crate::error::{DnsEngineError, Result};
use crate::mx::{self, EmailPlatform, MxExchange, MxRecordSet};
use crate::provider::{DnsProvider, NewProviderRecord};
use crate::spf::flattener::{self, FlattenOptions};
use crate::spf::ip_resolver::ResolvedInclude;
use crate::store::DnsRecordStore;
use crate::tracking::{self, TrackingCname, TrackingProvider};
use crate::types::{DnsRecord, DomainId, RecordId, RecordPurpose, RecordStatus, RecordType};

#[derive(Debug, Clone)]
pub struct DkimMaterial {
    pub selector: Option<String>,
    pub public_key: String,
    pub key_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackingIntent {
    pub subdomain: String,
    pub provider: TrackingProvider,
}

/// Everything `setup_email_dns` needs for one domain.
#[derive(Debug, Clone)]
pub struct SetupEmailDnsConfig {
    pub domain_id: DomainId,
    pub domain: String,
    pub zone_handle: String,
    pub provider_token: String,
    pub platform: EmailPlatform,
    pub custom_mx: Option<Vec<MxExchange>>,
    pub existing_spf: Option<String>,
    pub additional_includes: Vec<String>,
    pub dmarc: DmarcConfig,
    pub dkim: Option<DkimMaterial>,
    pub tracking: Option<TrackingIntent>,
    pub skip_duplicates: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedRecord {
    pub record_type: RecordType,
    pub name: String,
    pub value: String,
    pub priority: Option<u16>,
    pub purpose: RecordPurpose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Created,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordProvisionResult {
    pub record: GeneratedRecord,
    pub outcome: ProvisionOutcome,
    pub provider_record_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetupResult {
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success: bool,
    pub records: Vec<RecordProvisionResult>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

fn platform_spf_include(platform: EmailPlatform) -> Option<&'static str> {
    match platform {
        EmailPlatform::GoogleWorkspace => Some("_spf.google.com"),
        EmailPlatform::Microsoft365 => Some("spf.protection.outlook.com"),
        EmailPlatform::Custom => None,
    }
}

/// Synthesizes a fresh SPF record from platform defaults plus any
/// caller-supplied includes, when no existing record is being
/// flattened.
fn synthesize_spf(platform: EmailPlatform, additional_includes: &[String]) -> String {
    let mut parts = vec!["v=spf1".to_string()];
    if let Some(include) = platform_spf_include(platform) {
        parts.push(format!("include:{include}"));
    }
    for include in additional_includes {
        parts.push(format!("include:{include}"));
    }
    parts.push("~all".to_string());
    parts.join(" ")
}

/// Phase 1: generate every record the config asks for.
/// `resolved_includes` carries C3's resolution of the *existing* SPF
/// record's includes, used only when flattening one.
///
/// Returns `(records, warnings, errors)`. A non-empty `errors` means at
/// least one phase failed its own validation and contributed no
/// record; callers must not treat that batch as fully successful.
pub fn generate_records(
    config: &SetupEmailDnsConfig,
    resolved_includes: &[ResolvedInclude],
    spf_record_cap: usize,
) -> (Vec<GeneratedRecord>, Vec<String>, Vec<String>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    match &config.existing_spf {
        Some(existing) => {
            match flattener::flatten_spf(existing, resolved_includes, &FlattenOptions::default(), spf_record_cap) {
                Ok(flattened) => {
                    warnings.extend(flattened.warnings);
                    records.push(GeneratedRecord {
                        record_type: RecordType::Txt,
                        name: "@".to_string(),
                        value: flattened.spf_record,
                        priority: None,
                        purpose: RecordPurpose::Spf,
                    });
                }
                Err(e) => {
                    errors.push(format!("SPF: {e}"));
                }
            }
        }
        None => {
            let spf_value = synthesize_spf(config.platform, &config.additional_includes);
            records.push(GeneratedRecord {
                record_type: RecordType::Txt,
                name: "@".to_string(),
                value: spf_value,
                priority: None,
                purpose: RecordPurpose::Spf,
            });
        }
    };

    match &config.dkim {
        Some(material) => {
            let dkim: DkimRecord = dkim::build_dkim_record(
                &config.domain,
                material.selector.as_deref(),
                &material.public_key,
                material.key_type.as_deref(),
                true,
                512,
            );
            warnings.extend(dkim.warnings.clone());
            if dkim.errors.is_empty() {
                records.push(GeneratedRecord {
                    record_type: RecordType::Txt,
                    name: dkim.name,
                    value: dkim::format_wire_strings(&dkim.chunks),
                    priority: None,
                    purpose: RecordPurpose::Dkim,
                });
            } else {
                errors.extend(dkim.errors.into_iter().map(|e| format!("DKIM: {e}")));
            }
        }
        None => {
            // Absent DKIM material degrades to a warning, not a hard
            // failure: SPF/DMARC/MX can still go live.
            warnings.push("no DKIM material supplied; DKIM must be provisioned manually later".to_string());
        }
    }

    let dmarc: DmarcRecord = dmarc::build_dmarc_record(&config.domain, &config.dmarc);
    warnings.extend(dmarc.warnings.clone());
    if dmarc.errors.is_empty() {
        records.push(GeneratedRecord {
            record_type: RecordType::Txt,
            name: dmarc.name,
            value: dmarc.value,
            priority: None,
            purpose: RecordPurpose::Dmarc,
        });
    } else {
        errors.extend(dmarc.errors.into_iter().map(|e| format!("DMARC: {e}")));
    }

    let mx: MxRecordSet = mx::build_mx_record(&config.domain, config.platform, config.custom_mx.clone());
    warnings.extend(mx.warnings.clone());
    if mx.errors.is_empty() {
        for exchange in mx.exchanges {
            records.push(GeneratedRecord {
                record_type: RecordType::Mx,
                name: mx.name.clone(),
                value: exchange.exchange,
                priority: Some(exchange.priority),
                purpose: RecordPurpose::Mx,
            });
        }
    } else {
        errors.extend(mx.errors.into_iter().map(|e| format!("MX: {e}")));
    }

    if let Some(intent) = &config.tracking {
        let cname: TrackingCname = tracking::build_tracking_cname(&config.domain, &intent.subdomain, intent.provider);
        warnings.extend(cname.warnings.clone());
        if cname.errors.is_empty() {
            records.push(GeneratedRecord {
                record_type: RecordType::Cname,
                name: cname.name,
                value: cname.target,
                priority: None,
                purpose: RecordPurpose::Tracking,
            });
        } else {
            errors.extend(cname.errors.into_iter().map(|e| format!("tracking: {e}")));
        }
    }

    (records, warnings, errors)
}

/// `setupEmailDNS`: generate, then batch-provision against the
/// authoritative provider with store-backed dedup.
pub async fn setup_email_dns(
    config: &SetupEmailDnsConfig,
    resolved_includes: &[ResolvedInclude],
    spf_record_cap: u32,
    provider: &dyn DnsProvider,
    store: &dyn DnsRecordStore,
    default_ttl: u32,
) -> SetupResult {
    let (generated, mut warnings, errors) = generate_records(config, resolved_includes, spf_record_cap as usize);

    let existing = match provider.list(&config.zone_handle, &config.provider_token).await {
        Ok(records) => records,
        Err(e) => {
            warnings.push(format!("could not fetch existing records from provider: {e}"));
            Vec::new()
        }
    };

    let mut results = Vec::with_capacity(generated.len());
    for record in generated {
        let is_duplicate = existing
            .iter()
            .any(|e| e.record_type == record.record_type && e.name == record.name && e.content == record.value);

        if is_duplicate {
            if config.skip_duplicates {
                results.push(RecordProvisionResult {
                    record,
                    outcome: ProvisionOutcome::Skipped,
                    provider_record_id: None,
                    error: None,
                });
            } else {
                results.push(RecordProvisionResult {
                    record: record.clone(),
                    outcome: ProvisionOutcome::Failed,
                    provider_record_id: None,
                    error: Some(format!("duplicate {:?} record at {}", record.record_type, record.name)),
                });
            }
            continue;
        }

        let created = provider
            .create(
                &config.zone_handle,
                &config.provider_token,
                NewProviderRecord {
                    record_type: record.record_type,
                    name: record.name.clone(),
                    content: record.value.clone(),
                    ttl: Some(default_ttl),
                    priority: record.priority,
                },
            )
            .await;

        match created {
            Err(e) => {
                warn!("provider create failed for {} {}: {e}", config.domain, record.name);
                results.push(RecordProvisionResult {
                    record,
                    outcome: ProvisionOutcome::Failed,
                    provider_record_id: None,
                    error: Some(e.to_string()),
                });
            }
            Ok(provider_record_id) => {
                let dns_record = DnsRecord {
                    id: RecordId::new(),
                    domain_id: config.domain_id,
                    record_type: record.record_type,
                    name: record.name.clone(),
                    value: record.value.clone(),
                    ttl: default_ttl,
                    priority: record.priority,
                    purpose: record.purpose,
                    status: RecordStatus::Active,
                    propagation_status: crate::types::PropagationStatus::Pending,
                    propagation_coverage: 0,
                    last_checked_at: None,
                    metadata: serde_json::json!({ "apex_domain": config.domain }),
                };
                match store.insert(dns_record).await {
                    Ok(()) => {
                        info!("provisioned {:?} record for {}", record.purpose, config.domain);
                        results.push(RecordProvisionResult {
                            record,
                            outcome: ProvisionOutcome::Created,
                            provider_record_id: Some(provider_record_id),
                            error: None,
                        });
                    }
                    Err(e) => {
                        // Provider write succeeded but the store write
                        // failed; retain the provider id so a later
                        // reconciler can heal it.
                        warnings.push(format!(
                            "record created at provider ({provider_record_id}) but store insert failed: {e}"
                        ));
                        results.push(RecordProvisionResult {
                            record,
                            outcome: ProvisionOutcome::Failed,
                            provider_record_id: Some(provider_record_id),
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }
    }

    let successful = results.iter().filter(|r| r.outcome == ProvisionOutcome::Created).count();
    let failed = results.iter().filter(|r| r.outcome == ProvisionOutcome::Failed).count();
    let skipped = results.iter().filter(|r| r.outcome == ProvisionOutcome::Skipped).count();

    SetupResult {
        successful,
        failed,
        skipped,
        success: failed == 0 && errors.is_empty(),
        records: results,
        warnings,
        errors,
    }
}

/// `verifyDNSConfiguration`: reports which purposes have at
/// least one active record.
pub async fn verify_dns_configuration(
    domain_id: DomainId,
    store: &dyn DnsRecordStore,
) -> Result<Vec<String>> {
    let active = store
        .list_active(domain_id)
        .await
        .map_err(|e| DnsEngineError::Persistence(e.to_string()))?;

    let required = [
        RecordPurpose::Spf,
        RecordPurpose::Dkim,
        RecordPurpose::Dmarc,
        RecordPurpose::Mx,
    ];
    let missing: Vec<String> = required
        .into_iter()
        .filter(|purpose| !active.iter().any(|r| r.purpose == *purpose))
        .map(|purpose| format!("{purpose:?}"))
        .collect();

    Ok(missing)
}
