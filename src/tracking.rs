//! C8 — Tracking CNAME. Builds and validates the branded-tracking
//! subdomain used by the email platform to rewrite open/click links.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackingProvider {
    Smartlead,
}

impl TrackingProvider {
    fn target(self) -> &'static str {
        match self {
            TrackingProvider::Smartlead => "open.sleadtrack.com",
        }
    }
}

const COMMON_SUBDOMAINS: [&str; 5] = ["track", "links", "go", "email", "mail"];

#[derive(Debug, Clone, Serialize)]
pub struct TrackingCname {
    pub name: String,
    pub target: String,
    /// The CNAME must resolve publicly, not be rewritten by an edge
    /// proxy (e.g. Cloudflare's orange cloud).
    pub must_not_be_proxied: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn validate_subdomain(subdomain: &str, domain: &str) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if subdomain.is_empty() {
        errors.push("tracking subdomain must not be empty".to_string());
        return (errors, warnings);
    }
    if subdomain.len() > 63 {
        errors.push(format!("tracking subdomain '{subdomain}' exceeds 63 characters"));
    }
    if subdomain.chars().any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')) {
        errors.push(format!(
            "tracking subdomain '{subdomain}' contains characters outside [a-z0-9-]"
        ));
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        errors.push("tracking subdomain must not start or end with a hyphen".to_string());
    }
    if subdomain.eq_ignore_ascii_case(domain) {
        errors.push("tracking subdomain must not equal the apex domain".to_string());
    }

    if subdomain.len() > 30 {
        warnings.push("tracking subdomain is unusually long (> 30 chars)".to_string());
    }
    if subdomain.contains("--") {
        warnings.push("tracking subdomain contains a double hyphen".to_string());
    }
    if !COMMON_SUBDOMAINS.contains(&subdomain) {
        warnings.push(format!(
            "'{subdomain}' is not a common tracking subdomain name ({})",
            COMMON_SUBDOMAINS.join(", ")
        ));
    }

    (errors, warnings)
}

/// Builds `subdomain.domain CNAME provider-target`.
pub fn build_tracking_cname(domain: &str, subdomain: &str, provider: TrackingProvider) -> TrackingCname {
    let (errors, warnings) = validate_subdomain(subdomain, domain);

    TrackingCname {
        name: format!("{subdomain}.{domain}"),
        target: provider.target().to_string(),
        must_not_be_proxied: true,
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_smartlead_cname() {
        let record = build_tracking_cname("example.com", "track", TrackingProvider::Smartlead);
        assert_eq!(record.name, "track.example.com");
        assert_eq!(record.target, "open.sleadtrack.com");
        assert!(record.errors.is_empty());
    }

    #[test]
    fn rejects_empty_and_uppercase_and_apex_equal() {
        assert!(!build_tracking_cname("example.com", "", TrackingProvider::Smartlead).errors.is_empty());
        assert!(!build_tracking_cname("example.com", "Track", TrackingProvider::Smartlead).errors.is_empty());
        assert!(!build_tracking_cname("example.com", "example.com", TrackingProvider::Smartlead).errors.is_empty());
    }

    #[test]
    fn rejects_leading_trailing_hyphen_and_bad_chars() {
        assert!(!build_tracking_cname("example.com", "-track", TrackingProvider::Smartlead).errors.is_empty());
        assert!(!build_tracking_cname("example.com", "track_", TrackingProvider::Smartlead).errors.is_empty());
        assert!(!build_tracking_cname("example.com", "tr@ck", TrackingProvider::Smartlead).errors.is_empty());
    }

    #[test]
    fn warns_on_uncommon_name_and_double_hyphen() {
        let record = build_tracking_cname("example.com", "zz--unusual", TrackingProvider::Smartlead);
        assert!(record.warnings.iter().any(|w| w.contains("double hyphen")));
        assert!(record.warnings.iter().any(|w| w.contains("not a common")));
    }
}
