//! C4 — SPF Flattener. Pure function: given the original SPF string and
//! its resolved include chains, rebuilds a flattened record that
//! replaces `include:` lookups with literal `ip4`/`ip6` mechanisms.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{DnsEngineError, Result};
use crate::spf::ip_resolver::ResolvedInclude;
use crate::spf::parser::{self, MechanismType, Qualifier};

#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    pub additional_includes: Vec<String>,
    pub preserve_includes: Vec<String>,
    pub remove_includes: Vec<String>,
    pub ipv6_support: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlattenResult {
    pub spf_record: String,
    pub original_lookup_count: usize,
    pub flattened_lookup_count: usize,
    pub ip_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Rebuilds a flattened SPF string.
///
/// `resolved` carries one [`ResolvedInclude`] per top-level include of
/// the original record (as produced by C3), used to source the
/// `ip4`/`ip6` literals that replace dropped includes.
pub fn flatten_spf(
    original: &str,
    resolved: &[ResolvedInclude],
    options: &FlattenOptions,
    record_cap: usize,
) -> Result<FlattenResult> {
    let parsed = parser::parse_spf(original)
        .map_err(|_| DnsEngineError::Validation(vec!["original record is not a valid SPF1 record".to_string()]))?;
    let original_lookup_count = parser::count_dns_lookups(&parsed);

    let mut parts: Vec<String> = vec!["v=spf1".to_string()];

    // Preserved includes keep their original qualifier and go first.
    for mechanism in parsed.mechanisms.iter().filter(|m| m.mechanism_type == MechanismType::Include) {
        let Some(target) = &mechanism.value else { continue };
        if options.remove_includes.iter().any(|d| d == target) {
            continue;
        }
        if options.preserve_includes.iter().any(|d| d == target) {
            parts.push(format!("{}include:{}", qualifier_prefix(mechanism.qualifier), target));
        }
    }

    for extra in &options.additional_includes {
        parts.push(format!("include:{extra}"));
    }

    let mut ipv4: BTreeSet<String> = BTreeSet::new();
    let mut ipv6: BTreeSet<String> = BTreeSet::new();
    for include in resolved {
        if options.preserve_includes.iter().any(|d| d == &include.domain)
            || options.remove_includes.iter().any(|d| d == &include.domain)
        {
            continue;
        }
        ipv4.extend(include.ipv4.iter().cloned());
        if options.ipv6_support {
            ipv6.extend(include.ipv6.iter().cloned());
        }
    }

    for ip in &ipv4 {
        parts.push(format!("ip4:{ip}"));
    }
    for ip in &ipv6 {
        parts.push(format!("ip6:{ip}"));
    }

    // Carry over every other mechanism, preserving order and qualifier.
    for mechanism in &parsed.mechanisms {
        match mechanism.mechanism_type {
            MechanismType::Include | MechanismType::Ip4 | MechanismType::Ip6 | MechanismType::All => continue,
            _ => {
                let value_suffix = mechanism.value.as_deref().map(|v| format!(":{v}")).unwrap_or_default();
                parts.push(format!(
                    "{}{}{}",
                    qualifier_prefix(mechanism.qualifier),
                    mechanism_name(mechanism.mechanism_type),
                    value_suffix
                ));
            }
        }
    }

    let all_qualifier = parsed.trailing_all_qualifier().unwrap_or(Qualifier::SoftFail);
    parts.push(format!("{}all", qualifier_prefix(all_qualifier)));

    let spf_record = parts.join(" ");

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if spf_record.len() > record_cap {
        errors.push(format!(
            "flattened SPF record length {} exceeds {} bytes",
            spf_record.len(),
            record_cap
        ));
        return Err(DnsEngineError::Limit(errors));
    }

    if spf_record.len() as f64 > record_cap as f64 * 0.9 {
        warnings.push(format!(
            "flattened SPF record is at {} of {} bytes (>90%)",
            spf_record.len(),
            record_cap
        ));
    }

    let flattened_parsed = parser::parse_spf(&spf_record)
        .map_err(|_| DnsEngineError::Validation(vec!["flattened record failed to re-parse".to_string()]))?;
    let flattened_lookup_count = parser::count_dns_lookups(&flattened_parsed);
    if flattened_lookup_count > 3 {
        warnings.push(format!(
            "flattened record still performs {flattened_lookup_count} lookups; consider flattening more"
        ));
    }

    let syntax = parser::validate_spf_syntax(&spf_record, &flattened_parsed, record_cap);
    warnings.extend(syntax.warnings);
    errors.extend(syntax.errors);

    Ok(FlattenResult {
        spf_record,
        original_lookup_count,
        flattened_lookup_count,
        ip_count: ipv4.len() + ipv6.len(),
        errors,
        warnings,
    })
}

fn qualifier_prefix(q: Qualifier) -> &'static str {
    match q {
        Qualifier::Pass => "",
        Qualifier::Fail => "-",
        Qualifier::SoftFail => "~",
        Qualifier::Neutral => "?",
    }
}

fn mechanism_name(t: MechanismType) -> &'static str {
    match t {
        MechanismType::Include => "include",
        MechanismType::A => "a",
        MechanismType::Mx => "mx",
        MechanismType::Ptr => "ptr",
        MechanismType::Ip4 => "ip4",
        MechanismType::Ip6 => "ip6",
        MechanismType::Exists => "exists",
        MechanismType::All => "all",
        MechanismType::Unknown => "unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlatteningBenefit {
    MustFlatten,
    Should,
    DoNotFlatten,
    Unnecessary,
}

/// Cost/benefit analysis, classifying whether flattening a record is
/// worthwhile from its resolved chain.
pub fn classify_flattening_benefit(total_lookups: usize, total_ip_count: usize, record_cap: usize) -> (FlatteningBenefit, String) {
    if total_lookups > 10 {
        return (
            FlatteningBenefit::MustFlatten,
            format!("SPF chain exceeds the 10-lookup limit ({total_lookups} lookups)"),
        );
    }
    if total_lookups >= 8 {
        return (
            FlatteningBenefit::Should,
            format!("SPF chain is at {total_lookups} lookups, close to the limit"),
        );
    }
    // Rough estimate: "ip4:a.b.c.d/nn " is ~16 bytes average.
    let estimated_size = 20 + total_ip_count * 16;
    if estimated_size > record_cap || total_ip_count > 50 {
        return (
            FlatteningBenefit::DoNotFlatten,
            "flattened record would likely exceed the 512-byte cap".to_string(),
        );
    }
    if total_lookups <= 3 {
        return (
            FlatteningBenefit::Unnecessary,
            format!("SPF chain only performs {total_lookups} lookups"),
        );
    }
    (
        FlatteningBenefit::Should,
        format!("SPF chain performs {total_lookups} lookups"),
    )
}
