//! C5 — DKIM Formatter. Pure function: formats a supplied base64
//! public key into a `v=DKIM1` TXT value and, when needed, splits it
//! into ≤255-char wire strings. Key *generation* is out of scope;
//! material always arrives from the caller.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+$").unwrap()
});

const DEFAULT_SELECTOR: &str = "google";
const WIRE_STRING_CAP: usize = 255;

#[derive(Debug, Clone, Serialize)]
pub struct DkimRecord {
    pub name: String,
    pub value: String,
    pub requires_splitting: bool,
    pub chunks: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn build_value(key: &str, key_type: &str) -> (String, bool) {
    let stripped: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    let value = format!("v=DKIM1; k={key_type}; p={stripped}");
    (value, stripped.is_empty())
}

fn split_into_chunks(value: &str, cap: usize) -> Vec<String> {
    value
        .as_bytes()
        .chunks(cap)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

/// Builds `selector._domainkey.domain` and its `v=DKIM1; k=<type>;
/// p=...` value (`k` defaults to `rsa`; `ed25519` is accepted
/// syntactically), splitting into ≤255-char strings when the wire
/// value requires it.
pub fn build_dkim_record(
    domain: &str,
    selector: Option<&str>,
    public_key: &str,
    key_type: Option<&str>,
    split: bool,
    record_cap: usize,
) -> DkimRecord {
    let selector = selector.unwrap_or(DEFAULT_SELECTOR);
    let key_type = key_type.unwrap_or("rsa");
    let name = format!("{selector}._domainkey.{domain}");
    let (value, key_empty) = build_value(public_key, key_type);
    let requires_splitting = value.len() > WIRE_STRING_CAP;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !DOMAIN_RE.is_match(domain) {
        errors.push(format!("'{domain}' is not a valid domain"));
    }
    if key_empty {
        errors.push("DKIM public key is empty after whitespace stripping".to_string());
    }
    if value.len() > record_cap {
        warnings.push(format!("DKIM record length {} exceeds {} bytes", value.len(), record_cap));
    }
    if requires_splitting && !split {
        errors.push(format!(
            "DKIM value is {} bytes (> {WIRE_STRING_CAP}) and splitting is disabled",
            value.len()
        ));
    }

    if key_type == "rsa" {
        if let Some(bits) = estimate_key_bits(&value) {
            if bits != 1024 && bits != 2048 {
                warnings.push(format!("unusual DKIM key length ({bits} bits)"));
            }
        }
    }

    let chunks = if requires_splitting && split {
        split_into_chunks(&value, WIRE_STRING_CAP)
    } else {
        vec![value.clone()]
    };

    DkimRecord {
        name,
        value,
        requires_splitting,
        chunks,
        errors,
        warnings,
    }
}

/// Rough estimate of RSA key size in bits from the base64 payload
/// length, used only to produce the "unusual key length" warning.
fn estimate_key_bits(value: &str) -> Option<u32> {
    let p = value.split("p=").nth(1)?;
    let b64_len = p.len();
    // base64 expands by 4/3; a 2048-bit RSA SubjectPublicKeyInfo is
    // ~294 bytes -> ~392 base64 chars, 1024-bit ~162 bytes -> ~216 chars.
    if b64_len == 0 {
        return None;
    }
    let approx_bytes = (b64_len as f64) * 3.0 / 4.0;
    let approx_bits = (approx_bytes * 8.0) as u32;
    Some(match approx_bits {
        0..=1400 => 1024,
        1401..=2800 => 2048,
        other => other,
    })
}

/// Formats chunks as quoted DNS strings: `"s1" "s2" ...`.
pub fn format_wire_strings(chunks: &[String]) -> String {
    chunks
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // DKIM split concatenation round-trips and every chunk is ≤255 bytes.
    #[test]
    fn split_concatenation_round_trips() {
        let key: String = "A".repeat(300);
        let record = build_dkim_record("example.com", None, &key, None, true, 512);
        assert!(record.requires_splitting);
        let concatenated: String = record.chunks.concat();
        assert_eq!(concatenated, record.value);
        assert!(record.chunks.iter().all(|c| c.len() <= 255));
    }

    // Scenario: DKIM 300-char key splits into two strings.
    #[test]
    fn three_hundred_char_key_splits_into_two_chunks() {
        let key: String = "B".repeat(300);
        let record = build_dkim_record("example.com", None, &key, None, true, 512);
        assert_eq!(record.value.len(), 318);
        assert_eq!(record.chunks.len(), 2);
        assert_eq!(record.chunks[0].len(), 255);
        assert_eq!(record.chunks[1].len(), 63);
        let formatted = format_wire_strings(&record.chunks);
        assert_eq!(formatted, format!("\"{}\" \"{}\"", record.chunks[0], record.chunks[1]));
    }

    #[test]
    fn strips_whitespace_from_key() {
        let record = build_dkim_record("example.com", None, "AB CD\nEF", None, false, 512);
        assert!(record.value.contains("p=ABCDEF"));
    }

    #[test]
    fn fails_without_splitting_when_required_and_disabled() {
        let key: String = "C".repeat(300);
        let record = build_dkim_record("example.com", None, &key, None, false, 512);
        assert!(!record.errors.is_empty());
    }

    #[test]
    fn default_selector_is_google() {
        let record = build_dkim_record("example.com", None, "shortkey", None, false, 512);
        assert_eq!(record.name, "google._domainkey.example.com");
    }

    #[test]
    fn rejects_invalid_domain() {
        let record = build_dkim_record("not a domain", None, "shortkey", None, false, 512);
        assert!(record.errors.iter().any(|e| e.contains("not a valid domain")));
    }
}
