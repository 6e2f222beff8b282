//! C3 — SPF IP Resolver. Wraps C2 and flattens each top-level include
//! subtree into a single [`ResolvedInclude`], with a process-wide,
//! TTL'd, domain-keyed cache.
//!
//! The cache handle follows an `Arc`-wrapped, `Clone` resolver-handle
//! pattern, guarding its map with `parking_lot::Mutex` for process-wide
//! mutable state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::resolver::DnsLookup;
use crate::spf::lookup::{self, LookupOptions, SpfIncludeChain};

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedInclude {
    pub domain: String,
    pub ipv4: HashSet<String>,
    pub ipv6: HashSet<String>,
    pub nested_lookups: usize,
    pub error: Option<String>,
}

fn flatten_chain(chain: &SpfIncludeChain) -> ResolvedInclude {
    let mut ipv4 = chain.ipv4.clone();
    let mut ipv6 = chain.ipv6.clone();
    let mut error = chain.error.clone();

    fn collect(node: &SpfIncludeChain, ipv4: &mut HashSet<String>, ipv6: &mut HashSet<String>) {
        ipv4.extend(node.ipv4.iter().cloned());
        ipv6.extend(node.ipv6.iter().cloned());
        for child in &node.nested_includes {
            collect(child, ipv4, ipv6);
        }
    }

    for child in &chain.nested_includes {
        collect(child, &mut ipv4, &mut ipv6);
        if error.is_none() {
            error = child.error.clone();
        }
    }

    ResolvedInclude {
        domain: chain.domain.clone(),
        ipv4,
        ipv6,
        nested_lookups: chain.lookup_count,
        error,
    }
}

#[derive(Clone)]
struct CacheEntry {
    includes: Vec<ResolvedInclude>,
    total_lookups: usize,
    exceeds_limit: bool,
    cached_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlattenedSpf {
    pub includes: Vec<ResolvedInclude>,
    pub total_lookups: usize,
    pub exceeds_limit: bool,
}

/// Resolves and caches the flattened per-include IP sets for a domain.
#[derive(Clone)]
pub struct SpfIpResolver {
    ttl: Duration,
    cache: Arc<Mutex<std::collections::HashMap<String, CacheEntry>>>,
}

impl SpfIpResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    /// Flattens each top-level include chain of `domain`'s SPF record
    /// into its own [`ResolvedInclude`], using the cache when fresh.
    pub async fn resolve(&self, resolver: &(dyn DnsLookup), domain: &str) -> FlattenedSpf {
        if let Some(entry) = self.cache.lock().get(domain) {
            if entry.cached_at.elapsed() < self.ttl {
                return FlattenedSpf {
                    includes: entry.includes.clone(),
                    total_lookups: entry.total_lookups,
                    exceeds_limit: entry.exceeds_limit,
                };
            }
        }

        let result = lookup::resolve_spf(resolver, domain, LookupOptions::default()).await;
        let includes: Vec<ResolvedInclude> = result.root.nested_includes.iter().map(flatten_chain).collect();

        let entry = CacheEntry {
            includes: includes.clone(),
            total_lookups: result.total_lookups,
            exceeds_limit: result.exceeds_limit,
            cached_at: Instant::now(),
        };
        self.cache.lock().insert(domain.to_string(), entry);

        FlattenedSpf {
            includes,
            total_lookups: result.total_lookups,
            exceeds_limit: result.exceeds_limit,
        }
    }

    pub fn invalidate(&self, domain: &str) {
        self.cache.lock().remove(domain);
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.lock().len(),
        }
    }
}

impl Default for SpfIpResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DnsLookup;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::net::{Ipv4Addr, Ipv6Addr};

    struct MockResolver {
        txt: Map<String, Vec<String>>,
    }

    #[async_trait]
    impl DnsLookup for MockResolver {
        async fn lookup_txt(&self, name: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.txt.get(name).cloned().unwrap_or_default())
        }
        async fn lookup_a(&self, _name: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
            Ok(vec![])
        }
        async fn lookup_aaaa(&self, _name: &str) -> anyhow::Result<Vec<Ipv6Addr>> {
            Ok(vec![])
        }
        async fn lookup_mx(&self, _name: &str) -> anyhow::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn caches_and_invalidates() {
        let mut txt = Map::new();
        txt.insert(
            "acme.test".to_string(),
            vec!["v=spf1 include:_spf.google.com ~all".to_string()],
        );
        txt.insert(
            "_spf.google.com".to_string(),
            vec!["v=spf1 ip4:1.2.3.0/24 ~all".to_string()],
        );
        let resolver = MockResolver { txt };
        let ip_resolver = SpfIpResolver::new(Duration::from_secs(60));

        let first = ip_resolver.resolve(&resolver, "acme.test").await;
        assert_eq!(first.includes.len(), 1);
        assert!(first.includes[0].ipv4.contains("1.2.3.0/24"));
        assert_eq!(ip_resolver.stats().entries, 1);

        ip_resolver.invalidate("acme.test");
        assert_eq!(ip_resolver.stats().entries, 0);
    }
}
