use thiserror::Error;

/// The four structured error kinds of the DNS engine.
///
/// Generators (C1, C4–C8) mostly report problems inline as
/// `errors`/`warnings` on their result structs rather than through this
/// enum; `DnsEngineError` is for the genuinely exceptional cases: hard
/// limit breaches that gate provisioning, and provider/store failures.
#[derive(Debug, Error)]
pub enum DnsEngineError {
    /// Bad input: domain syntax, subdomain characters, policy enum,
    /// percentage range, email format.
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    /// Hard stop that gates provisioning: a flattened SPF record still
    /// exceeds the TXT record cap after flattening.
    #[error("limit exceeded: {0:?}")]
    Limit(Vec<String>),

    /// DNS probe failure, provider list failure, timeout. Degrades
    /// behaviour but does not abort a batch by itself.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Provider create or store write failed.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, DnsEngineError>;
