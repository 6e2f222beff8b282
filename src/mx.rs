//! C7 — MX Generator. Emits the platform MX set (or a caller-supplied
//! custom one) at the apex.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HOSTNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+\.?$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailPlatform {
    GoogleWorkspace,
    Microsoft365,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxExchange {
    pub priority: u16,
    pub exchange: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MxRecordSet {
    pub name: String,
    pub exchanges: Vec<MxExchange>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn google_workspace_set() -> Vec<MxExchange> {
    vec![MxExchange {
        priority: 1,
        exchange: "smtp.google.com".to_string(),
    }]
}

fn microsoft_365_set(domain: &str) -> Vec<MxExchange> {
    // Microsoft 365 provisions a tenant-specific MX host derived from
    // the domain's `mail.protection.outlook.com` record.
    let label = domain.replace('.', "-");
    vec![MxExchange {
        priority: 0,
        exchange: format!("{label}.mail.protection.outlook.com"),
    }]
}

/// Builds the apex MX set for a platform, or validates a
/// caller-supplied custom set.
pub fn build_mx_record(domain: &str, platform: EmailPlatform, custom: Option<Vec<MxExchange>>) -> MxRecordSet {
    let exchanges = match (platform, custom) {
        (EmailPlatform::Custom, Some(custom)) => custom,
        (EmailPlatform::Custom, None) => vec![],
        (EmailPlatform::GoogleWorkspace, _) => google_workspace_set(),
        (EmailPlatform::Microsoft365, _) => microsoft_365_set(domain),
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if exchanges.is_empty() {
        errors.push("no MX exchanges supplied".to_string());
    }

    let mut seen_priorities = std::collections::HashSet::new();
    for mx in &exchanges {
        if !HOSTNAME_RE.is_match(&mx.exchange) {
            errors.push(format!("'{}' is not a valid MX exchange hostname", mx.exchange));
        }
        if !seen_priorities.insert(mx.priority) {
            warnings.push(format!("duplicate MX priority {}", mx.priority));
        }
    }

    MxRecordSet {
        name: "@".to_string(),
        exchanges,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_workspace_defaults() {
        let record = build_mx_record("example.com", EmailPlatform::GoogleWorkspace, None);
        assert_eq!(record.name, "@");
        assert_eq!(record.exchanges.len(), 1);
        assert_eq!(record.exchanges[0].exchange, "smtp.google.com");
        assert!(record.errors.is_empty());
    }

    #[test]
    fn custom_set_is_validated() {
        let custom = vec![
            MxExchange { priority: 10, exchange: "mail.example.com".to_string() },
            MxExchange { priority: 10, exchange: "not a host!!".to_string() },
        ];
        let record = build_mx_record("example.com", EmailPlatform::Custom, Some(custom));
        assert!(!record.errors.is_empty());
        assert!(!record.warnings.is_empty());
    }

    #[test]
    fn empty_custom_set_errors() {
        let record = build_mx_record("example.com", EmailPlatform::Custom, None);
        assert!(!record.errors.is_empty());
    }
}
