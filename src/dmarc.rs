//! C6 — DMARC Generator. Builder, parser, and policy-progression
//! validator for `_dmarc.<domain>` TXT records.
//!
//! Generalizes ad hoc `dmarc_policy.contains("p=reject")` substring
//! checks into a typed policy model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
}

impl DmarcPolicy {
    fn level(self) -> u8 {
        match self {
            DmarcPolicy::None => 0,
            DmarcPolicy::Quarantine => 1,
            DmarcPolicy::Reject => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            DmarcPolicy::None => "none",
            DmarcPolicy::Quarantine => "quarantine",
            DmarcPolicy::Reject => "reject",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(DmarcPolicy::None),
            "quarantine" => Some(DmarcPolicy::Quarantine),
            "reject" => Some(DmarcPolicy::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMode {
    Relaxed,
    Strict,
}

#[derive(Debug, Clone, Default)]
pub struct DmarcConfig {
    pub policy: Option<DmarcPolicy>,
    pub subdomain_policy: Option<DmarcPolicy>,
    /// 0–100; omitted from the record when 100.
    pub pct: Option<u8>,
    pub rua: Vec<String>,
    pub ruf: Vec<String>,
    pub aspf: Option<AlignmentMode>,
    pub adkim: Option<AlignmentMode>,
    /// Report interval in seconds; emitted only when non-default (86400).
    pub ri: Option<u32>,
    pub rf: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DmarcRecord {
    pub name: String,
    pub value: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn alignment_char(mode: AlignmentMode) -> char {
    match mode {
        AlignmentMode::Relaxed => 'r',
        AlignmentMode::Strict => 's',
    }
}

/// Builds `_dmarc.domain`'s TXT value from a typed config.
pub fn build_dmarc_record(domain: &str, config: &DmarcConfig) -> DmarcRecord {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(policy) = config.policy else {
        errors.push("DMARC policy is required".to_string());
        return DmarcRecord {
            name: format!("_dmarc.{domain}"),
            value: String::new(),
            errors,
            warnings,
        };
    };

    if let Some(pct) = config.pct {
        if pct > 100 {
            errors.push(format!("pct {pct} is out of the 0-100 range"));
        }
    }

    let mut tags = vec!["v=DMARC1".to_string(), format!("p={}", policy.as_str())];

    if let Some(sp) = config.subdomain_policy {
        tags.push(format!("sp={}", sp.as_str()));
    }
    if let Some(pct) = config.pct {
        if pct != 100 {
            tags.push(format!("pct={pct}"));
        }
    }
    if !config.rua.is_empty() {
        let joined = config.rua.iter().map(|a| format!("mailto:{a}")).collect::<Vec<_>>().join(",");
        tags.push(format!("rua={joined}"));
    }
    if !config.ruf.is_empty() {
        let joined = config.ruf.iter().map(|a| format!("mailto:{a}")).collect::<Vec<_>>().join(",");
        tags.push(format!("ruf={joined}"));
    }
    if let Some(aspf) = config.aspf {
        if aspf == AlignmentMode::Strict {
            tags.push(format!("aspf={}", alignment_char(aspf)));
        }
    }
    if let Some(adkim) = config.adkim {
        if adkim == AlignmentMode::Strict {
            tags.push(format!("adkim={}", alignment_char(adkim)));
        }
    }
    if let Some(ri) = config.ri {
        if ri != 86400 {
            tags.push(format!("ri={ri}"));
        }
    }
    if let Some(rf) = &config.rf {
        tags.push(format!("rf={rf}"));
    }

    for addr in config.rua.iter().chain(config.ruf.iter()) {
        if !addr.contains('@') {
            warnings.push(format!("'{addr}' does not look like a mailto address"));
        }
    }

    DmarcRecord {
        name: format!("_dmarc.{domain}"),
        value: tags.join("; "),
        errors,
        warnings,
    }
}

/// Inverse of [`build_dmarc_record`]: parses an existing DMARC TXT
/// value back into a [`DmarcConfig`].
pub fn parse_dmarc_record(value: &str) -> Option<DmarcConfig> {
    if !value.trim_start().to_ascii_uppercase().starts_with("V=DMARC1") {
        return None;
    }

    let mut config = DmarcConfig::default();
    for tag in value.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        let Some((key, val)) = tag.split_once('=') else { continue };
        match key.trim() {
            "p" => config.policy = DmarcPolicy::parse(val.trim()),
            "sp" => config.subdomain_policy = DmarcPolicy::parse(val.trim()),
            "pct" => config.pct = val.trim().parse().ok(),
            "rua" => config.rua = val.split(',').map(|a| a.trim().trim_start_matches("mailto:").to_string()).collect(),
            "ruf" => config.ruf = val.split(',').map(|a| a.trim().trim_start_matches("mailto:").to_string()).collect(),
            "aspf" => config.aspf = parse_alignment(val.trim()),
            "adkim" => config.adkim = parse_alignment(val.trim()),
            "ri" => config.ri = val.trim().parse().ok(),
            "rf" => config.rf = Some(val.trim().to_string()),
            _ => {}
        }
    }
    Some(config)
}

fn parse_alignment(s: &str) -> Option<AlignmentMode> {
    match s {
        "r" => Some(AlignmentMode::Relaxed),
        "s" => Some(AlignmentMode::Strict),
        _ => None,
    }
}

/// Requires `v=DMARC1` and a valid `p=`.
pub fn validate_dmarc_record(value: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if !value.trim_start().to_ascii_uppercase().starts_with("V=DMARC1") {
        errors.push("DMARC record must start with v=DMARC1".to_string());
    }
    match parse_dmarc_record(value) {
        Some(cfg) if cfg.policy.is_some() => {}
        _ => errors.push("DMARC record has no valid p= policy tag".to_string()),
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressionResult {
    pub is_valid: bool,
    pub is_safe: bool,
    pub warnings: Vec<String>,
}

/// `validatePolicyProgression`.
pub fn validate_policy_progression(current: DmarcPolicy, new: DmarcPolicy) -> ProgressionResult {
    let is_valid = new.level() >= current.level();
    let delta = new.level() as i16 - current.level() as i16;
    let is_safe = is_valid && (0..=1).contains(&delta);

    let mut warnings = Vec::new();
    if !is_valid {
        warnings.push(format!(
            "{} -> {} is a policy regression",
            current.as_str(),
            new.as_str()
        ));
    } else if !is_safe {
        warnings.push(format!(
            "{} -> {} skips an enforcement level; consider an intermediate quarantine stage",
            current.as_str(),
            new.as_str()
        ));
    }

    ProgressionResult {
        is_valid,
        is_safe,
        warnings,
    }
}

/// A DMARC policy recommendation from domain age and existing authentication.
pub fn recommend_policy(domain_age_days: u32, has_spf: bool, has_dkim: bool) -> DmarcPolicy {
    if !has_spf && !has_dkim {
        return DmarcPolicy::None;
    }
    if domain_age_days < 30 {
        DmarcPolicy::None
    } else if domain_age_days < 90 {
        DmarcPolicy::Quarantine
    } else {
        DmarcPolicy::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_record() {
        let config = DmarcConfig {
            policy: Some(DmarcPolicy::Quarantine),
            ..Default::default()
        };
        let record = build_dmarc_record("example.com", &config);
        assert_eq!(record.name, "_dmarc.example.com");
        assert_eq!(record.value, "v=DMARC1; p=quarantine");
    }

    #[test]
    fn omits_pct_when_100() {
        let config = DmarcConfig {
            policy: Some(DmarcPolicy::Reject),
            pct: Some(100),
            ..Default::default()
        };
        let record = build_dmarc_record("example.com", &config);
        assert!(!record.value.contains("pct="));
    }

    #[test]
    fn emits_strict_alignment_only() {
        let config = DmarcConfig {
            policy: Some(DmarcPolicy::Reject),
            aspf: Some(AlignmentMode::Strict),
            adkim: Some(AlignmentMode::Relaxed),
            ..Default::default()
        };
        let record = build_dmarc_record("example.com", &config);
        assert!(record.value.contains("aspf=s"));
        assert!(!record.value.contains("adkim="));
    }

    #[test]
    fn parser_round_trips_builder_output() {
        let config = DmarcConfig {
            policy: Some(DmarcPolicy::Reject),
            subdomain_policy: Some(DmarcPolicy::Quarantine),
            pct: Some(50),
            rua: vec!["dmarc@example.com".to_string()],
            ..Default::default()
        };
        let record = build_dmarc_record("example.com", &config);
        let parsed = parse_dmarc_record(&record.value).unwrap();
        assert_eq!(parsed.policy, Some(DmarcPolicy::Reject));
        assert_eq!(parsed.subdomain_policy, Some(DmarcPolicy::Quarantine));
        assert_eq!(parsed.pct, Some(50));
        assert_eq!(parsed.rua, vec!["dmarc@example.com".to_string()]);
    }

    #[test]
    fn validator_requires_version_and_policy() {
        assert!(validate_dmarc_record("v=DMARC1; p=reject").is_ok());
        assert!(validate_dmarc_record("v=DMARC1; sp=reject").is_err());
        assert!(validate_dmarc_record("p=reject").is_err());
    }

    // Scenario: DMARC jump none -> reject is valid but unsafe.
    #[test]
    fn none_to_reject_is_valid_but_unsafe() {
        let result = validate_policy_progression(DmarcPolicy::None, DmarcPolicy::Reject);
        assert!(result.is_valid);
        assert!(!result.is_safe);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn regression_is_invalid_and_unsafe() {
        let result = validate_policy_progression(DmarcPolicy::Reject, DmarcPolicy::None);
        assert!(!result.is_valid);
        assert!(!result.is_safe);
    }

    // Progression transitivity bound.
    #[test]
    fn progression_transitivity_bound() {
        let ab = validate_policy_progression(DmarcPolicy::None, DmarcPolicy::Quarantine);
        let bc = validate_policy_progression(DmarcPolicy::Quarantine, DmarcPolicy::Reject);
        assert!(ab.is_safe && bc.is_safe);
        let total_delta = DmarcPolicy::Reject.level() as i16 - DmarcPolicy::None.level() as i16;
        assert!(total_delta <= 2);
    }

    #[test]
    fn recommendation_scales_with_domain_age() {
        assert_eq!(recommend_policy(10, false, false), DmarcPolicy::None);
        assert_eq!(recommend_policy(10, true, true), DmarcPolicy::None);
        assert_eq!(recommend_policy(45, true, true), DmarcPolicy::Quarantine);
        assert_eq!(recommend_policy(120, true, true), DmarcPolicy::Reject);
    }
}
