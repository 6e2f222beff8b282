//! The resolver capability traits shared by C2 (single-resolver SPF
//! walk) and C9 (multi-resolver propagation pool), plus the live
//! `trust-dns-resolver`-backed implementation.

pub mod dns;
pub mod multi;

use async_trait::async_trait;

/// The capability C2's SPF walker is injected with: TXT, A, AAAA, MX.
///
/// Mirrors the shape of a plain `ResolverTrait`, generalized from
/// "does this domain look legitimate" probes to the raw record
/// accessors the SPF walk needs.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> anyhow::Result<Vec<String>>;
    async fn lookup_a(&self, name: &str) -> anyhow::Result<Vec<std::net::Ipv4Addr>>;
    async fn lookup_aaaa(&self, name: &str) -> anyhow::Result<Vec<std::net::Ipv6Addr>>;
    /// Exchange hostnames, priority-ordered.
    async fn lookup_mx(&self, name: &str) -> anyhow::Result<Vec<String>>;
}

pub use dns::TrustDnsLookup;
