//! C1 — SPF Parser. Pure, stateless: tokenizes a raw TXT value into a
//! [`ParsedSpfRecord`] and reports syntax issues as structured lists
//! rather than by failing, except when the `v=spf1` prefix itself is
//! missing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Qualifier {
    Pass,
    Fail,
    SoftFail,
    Neutral,
}

impl Qualifier {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Qualifier::Pass),
            '-' => Some(Qualifier::Fail),
            '~' => Some(Qualifier::SoftFail),
            '?' => Some(Qualifier::Neutral),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Qualifier::Pass => '+',
            Qualifier::Fail => '-',
            Qualifier::SoftFail => '~',
            Qualifier::Neutral => '?',
        }
    }
}

impl Default for Qualifier {
    fn default() -> Self {
        Qualifier::Pass
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MechanismType {
    Include,
    A,
    Mx,
    Ptr,
    Ip4,
    Ip6,
    Exists,
    All,
    /// Anything not in the set above: `redirect=`, `exp=`, unknown
    /// extension mechanisms.
    Unknown,
}

impl MechanismType {
    /// `triggersLookup`: true iff the mechanism costs an RFC-7208
    /// DNS lookup.
    pub fn triggers_lookup(&self) -> bool {
        matches!(
            self,
            MechanismType::Include
                | MechanismType::A
                | MechanismType::Mx
                | MechanismType::Exists
                | MechanismType::Ptr
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Mechanism {
    #[serde(rename = "type")]
    pub mechanism_type: MechanismType,
    pub qualifier: Qualifier,
    pub value: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ParsedSpfRecord {
    pub version: String,
    pub mechanisms: Vec<Mechanism>,
}

impl ParsedSpfRecord {
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.mechanisms.iter().filter_map(|m| {
            (m.mechanism_type == MechanismType::Include)
                .then(|| m.value.as_deref())
                .flatten()
        })
    }

    pub fn ipv4(&self) -> impl Iterator<Item = &str> {
        self.mechanisms.iter().filter_map(|m| {
            (m.mechanism_type == MechanismType::Ip4)
                .then(|| m.value.as_deref())
                .flatten()
        })
    }

    pub fn ipv6(&self) -> impl Iterator<Item = &str> {
        self.mechanisms.iter().filter_map(|m| {
            (m.mechanism_type == MechanismType::Ip6)
                .then(|| m.value.as_deref())
                .flatten()
        })
    }

    /// Trailing `all` qualifier, if the record ends with one.
    pub fn trailing_all_qualifier(&self) -> Option<Qualifier> {
        self.mechanisms
            .iter()
            .rev()
            .find(|m| m.mechanism_type == MechanismType::All)
            .map(|m| m.qualifier)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("SPF record does not start with v=spf1")]
pub struct InvalidSpfSyntax;

/// Splits `[qualifier?][type](:value)?` into its parts.
fn parse_token(token: &str) -> Mechanism {
    let raw = token.to_string();
    let mut chars = token.chars();
    let (qualifier, rest) = match chars.next().and_then(Qualifier::from_char) {
        Some(q) => (q, chars.as_str()),
        None => (Qualifier::Pass, token),
    };

    let (type_part, value) = match rest.split_once(':') {
        Some((t, v)) => (t, Some(v.to_string())),
        None => match rest.split_once('=') {
            Some((t, v)) if t.eq_ignore_ascii_case("redirect") || t.eq_ignore_ascii_case("exp") => {
                (t, Some(v.to_string()))
            }
            _ => (rest, None),
        },
    };

    let mechanism_type = match type_part.to_ascii_lowercase().as_str() {
        "include" => MechanismType::Include,
        "a" => MechanismType::A,
        "mx" => MechanismType::Mx,
        "ptr" => MechanismType::Ptr,
        "ip4" => MechanismType::Ip4,
        "ip6" => MechanismType::Ip6,
        "exists" => MechanismType::Exists,
        "all" => MechanismType::All,
        _ => MechanismType::Unknown,
    };

    Mechanism {
        mechanism_type,
        qualifier,
        value,
        raw,
    }
}

/// Tokenizes a raw SPF TXT value into a [`ParsedSpfRecord`].
///
/// Leading whitespace is tolerated; the version check is
/// case-insensitive. Fails only when the record does not begin with
/// `v=spf1`.
pub fn parse_spf(raw: &str) -> Result<ParsedSpfRecord, InvalidSpfSyntax> {
    let trimmed = raw.trim_start();
    if !trimmed.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("v=spf1")) {
        return Err(InvalidSpfSyntax);
    }

    let mechanisms = trimmed
        .split_whitespace()
        .skip(1)
        .map(parse_token)
        .collect();

    Ok(ParsedSpfRecord {
        version: "spf1".to_string(),
        mechanisms,
    })
}

/// `countDNSLookups`: surface-level lookup-triggering mechanisms.
pub fn count_dns_lookups(parsed: &ParsedSpfRecord) -> usize {
    parsed
        .mechanisms
        .iter()
        .filter(|m| m.mechanism_type.triggers_lookup())
        .count()
}

#[derive(Debug, Clone, Serialize)]
pub struct SpfSyntaxReport {
    pub exceeds_character_limit: bool,
    pub exceeds_lookup_limit: bool,
    pub surface_lookups: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// `validateSPFSyntax`. Never fails; everything surfaces as a
/// structured list.
pub fn validate_spf_syntax(raw: &str, parsed: &ParsedSpfRecord, record_cap: usize) -> SpfSyntaxReport {
    let surface_lookups = count_dns_lookups(parsed);
    let exceeds_character_limit = raw.len() > record_cap;
    let exceeds_lookup_limit = surface_lookups > 10;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if exceeds_character_limit {
        errors.push(format!(
            "SPF record length {} exceeds {} bytes",
            raw.len(),
            record_cap
        ));
    }
    if exceeds_lookup_limit {
        errors.push(format!(
            "SPF record exceeds the 10-lookup limit ({surface_lookups} lookups)"
        ));
    } else if surface_lookups >= 8 {
        warnings.push(format!(
            "SPF record is close to the 10-lookup limit ({surface_lookups} lookups)"
        ));
    }

    if parsed.trailing_all_qualifier().is_none() {
        warnings.push("SPF record has no trailing `all` mechanism".to_string());
    }

    if parsed
        .mechanisms
        .iter()
        .any(|m| m.mechanism_type == MechanismType::Ptr)
    {
        warnings.push("SPF record uses the deprecated `ptr` mechanism".to_string());
    }

    for m in &parsed.mechanisms {
        if m.mechanism_type == MechanismType::Unknown {
            warnings.push(format!("unknown SPF mechanism: `{}`", m.raw));
        }
    }

    SpfSyntaxReport {
        exceeds_character_limit,
        exceeds_lookup_limit,
        surface_lookups,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_version() {
        assert!(parse_spf("include:_spf.google.com ~all").is_err());
    }

    #[test]
    fn tolerates_leading_whitespace_and_case() {
        let parsed = parse_spf("  V=SPF1 ~all").unwrap();
        assert_eq!(parsed.mechanisms.len(), 1);
    }

    #[test]
    fn parses_qualifier_and_value() {
        let parsed = parse_spf("v=spf1 -include:_spf.example.com ip4:1.2.3.0/24 ~all").unwrap();
        assert_eq!(parsed.mechanisms[0].qualifier, Qualifier::Fail);
        assert_eq!(parsed.mechanisms[0].value.as_deref(), Some("_spf.example.com"));
        assert_eq!(parsed.mechanisms[1].value.as_deref(), Some("1.2.3.0/24"));
        assert_eq!(parsed.trailing_all_qualifier(), Some(Qualifier::SoftFail));
    }

    // countDnsLookups matches the mechanism count of lookup-triggering
    // types.
    #[test]
    fn count_dns_lookups_matches_triggering_mechanisms() {
        let raw = "v=spf1 include:a.com a:b.com mx ip4:1.2.3.4 exists:%{i}.x ptr ~all";
        let parsed = parse_spf(raw).unwrap();
        let expected = parsed
            .mechanisms
            .iter()
            .filter(|m| m.mechanism_type.triggers_lookup())
            .count();
        assert_eq!(count_dns_lookups(&parsed), expected);
        assert_eq!(expected, 5);
    }

    #[test]
    fn validate_reports_missing_all_and_unknown_mechanism() {
        let raw = "v=spf1 include:a.com frobnicate:x";
        let parsed = parse_spf(raw).unwrap();
        let report = validate_spf_syntax(raw, &parsed, 512);
        assert!(report.warnings.iter().any(|w| w.contains("no trailing")));
        assert!(report.warnings.iter().any(|w| w.contains("unknown")));
    }

    #[test]
    fn validate_flags_character_and_lookup_limits() {
        let includes: String = (0..11)
            .map(|i| format!("include:s{i}.example.com "))
            .collect();
        let raw = format!("v=spf1 {includes}~all");
        let parsed = parse_spf(&raw).unwrap();
        let report = validate_spf_syntax(&raw, &parsed, 512);
        assert!(report.exceeds_lookup_limit);
        assert!(!report.errors.is_empty());
    }
}
