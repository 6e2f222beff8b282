//! Live DNS resolver wrapper over `trust-dns-resolver`.
//!
//! `Arc<TokioAsyncResolver>`, `Clone` handle, `resolve_txt` helper,
//! generalized to implement the
//! [`DnsLookup`](crate::resolver::DnsLookup) capability C2 needs, plus
//! a constructor that pins a single resolver IP for C9's pool.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
};

use super::DnsLookup;

/// DNS resolver wrapper, optionally pinned to a single upstream server.
#[derive(Clone)]
pub struct TrustDnsLookup {
    inner: Arc<TokioAsyncResolver>,
}

impl TrustDnsLookup {
    /// System-default resolver configuration.
    pub fn new() -> anyhow::Result<Self> {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Ok(Self {
            inner: Arc::new(resolver),
        })
    }

    /// Pins resolution to a single server IP with the given per-query
    /// timeout, used by C9 to query one pool member at a time.
    pub fn pinned(server: IpAddr, timeout: Duration) -> anyhow::Result<Self> {
        let group = NameServerConfigGroup::from_ips_clear(&[server], 53, true);
        let config = ResolverConfig::from_parts(None, vec![], group);
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(config, opts);
        Ok(Self {
            inner: Arc::new(resolver),
        })
    }

    /// Resolve TXT records for a domain, returning raw string
    /// fragments concatenated per record.
    pub async fn resolve_txt(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let response = self.inner.txt_lookup(name).await?;
        let mut records = Vec::new();
        for r in response.iter() {
            let joined: String = r
                .txt_data()
                .iter()
                .filter_map(|chunk| std::str::from_utf8(chunk).ok())
                .collect();
            records.push(joined);
        }
        Ok(records)
    }

    /// MX records formatted as `"<priority> <exchange>"`, the wire
    /// shape C9 compares against an expected value.
    pub async fn lookup_mx_formatted(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let response = self.inner.mx_lookup(name).await?;
        Ok(response
            .iter()
            .map(|mx| {
                format!(
                    "{} {}",
                    mx.preference(),
                    mx.exchange().to_utf8().trim_end_matches('.')
                )
            })
            .collect())
    }

    /// Resolves a CNAME target.
    pub async fn resolve_cname(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let response = self.inner.lookup(name, trust_dns_resolver::proto::rr::RecordType::CNAME).await?;
        Ok(response
            .iter()
            .filter_map(|r| r.as_cname())
            .map(|n| n.to_utf8().trim_end_matches('.').to_string())
            .collect())
    }

    /// True if the domain has any A/AAAA or MX record.
    pub async fn check_domain(&self, domain: &str) -> bool {
        let ascii_domain = match idna::domain_to_ascii(domain) {
            Ok(d) => d,
            Err(_) => return false,
        };

        let a_exists = self
            .inner
            .lookup_ip(ascii_domain.clone())
            .await
            .map(|ips| ips.iter().next().is_some())
            .unwrap_or(false);

        let mx_exists = self
            .inner
            .mx_lookup(ascii_domain)
            .await
            .map(|mx| mx.iter().next().is_some())
            .unwrap_or(false);

        a_exists || mx_exists
    }
}

#[async_trait]
impl DnsLookup for TrustDnsLookup {
    async fn lookup_txt(&self, name: &str) -> anyhow::Result<Vec<String>> {
        self.resolve_txt(name).await
    }

    async fn lookup_a(&self, name: &str) -> anyhow::Result<Vec<std::net::Ipv4Addr>> {
        let response = self.inner.ipv4_lookup(name).await?;
        Ok(response.iter().map(|r| r.0).collect())
    }

    async fn lookup_aaaa(&self, name: &str) -> anyhow::Result<Vec<std::net::Ipv6Addr>> {
        let response = self.inner.ipv6_lookup(name).await?;
        Ok(response.iter().map(|r| r.0).collect())
    }

    async fn lookup_mx(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let response = self.inner.mx_lookup(name).await?;
        Ok(response
            .iter()
            .map(|mx| mx.exchange().to_utf8().trim_end_matches('.').to_string())
            .collect())
    }
}
