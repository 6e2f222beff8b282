//! C2 — SPF Lookup Resolver. Recursively expands `include`/`a`/`mx`
//! over an injected [`DnsLookup`] capability, counting RFC-7208
//! lookups and detecting cycles.
//!
//! The recursion uses the same own-future boxed-recursion technique as
//! a strict/soft-all scan, generalized into the full lookup-counting,
//! cycle-detecting walk.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::resolver::DnsLookup;
use crate::spf::parser::{self, MechanismType};

#[derive(Debug, Clone, Serialize, Default)]
pub struct SpfIncludeChain {
    pub domain: String,
    pub depth: usize,
    pub ipv4: HashSet<String>,
    pub ipv6: HashSet<String>,
    /// Accumulated over the subtree rooted here, including the
    /// include-mechanism edges into each child.
    pub lookup_count: usize,
    pub nested_includes: Vec<SpfIncludeChain>,
    pub circular: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpfLookupResult {
    pub root: SpfIncludeChain,
    pub total_lookups: usize,
    pub exceeds_limit: bool,
    pub warnings: Vec<String>,
    pub ipv4: HashSet<String>,
    pub ipv6: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct LookupOptions {
    pub max_depth: usize,
    pub ipv6_enabled: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            ipv6_enabled: true,
        }
    }
}

/// Per-resolution TXT cache: keyed by domain, alive only for the
/// duration of one `resolve_spf` call.
type TxtCache = HashMap<String, Option<String>>;

async fn fetch_spf_txt(
    resolver: &(dyn DnsLookup),
    domain: &str,
    cache: &mut TxtCache,
) -> Option<String> {
    if let Some(cached) = cache.get(domain) {
        return cached.clone();
    }
    let found = resolver
        .lookup_txt(domain)
        .await
        .ok()
        .and_then(|records| records.into_iter().find(|r| r.trim_start().to_ascii_lowercase().starts_with("v=spf1")));
    cache.insert(domain.to_string(), found.clone());
    found
}

fn walk<'a>(
    resolver: &'a (dyn DnsLookup),
    domain: String,
    depth: usize,
    visited: &'a mut HashSet<String>,
    cache: &'a mut TxtCache,
    options: LookupOptions,
) -> Pin<Box<dyn Future<Output = SpfIncludeChain> + Send + 'a>> {
    Box::pin(async move {
        if visited.contains(&domain) {
            return SpfIncludeChain {
                domain,
                depth,
                circular: true,
                lookup_count: 0,
                ..Default::default()
            };
        }
        visited.insert(domain.clone());

        if depth > options.max_depth {
            return SpfIncludeChain {
                domain,
                depth,
                error: Some("maximum SPF include depth exceeded".to_string()),
                lookup_count: 0,
                ..Default::default()
            };
        }

        let mut chain = SpfIncludeChain {
            domain: domain.clone(),
            depth,
            ..Default::default()
        };

        let txt = match fetch_spf_txt(resolver, &domain, cache).await {
            Some(t) => t,
            None => {
                chain.error = Some(format!("no SPF record found for {domain}"));
                return chain;
            }
        };

        let parsed = match parser::parse_spf(&txt) {
            Ok(p) => p,
            Err(_) => {
                chain.error = Some(format!("invalid SPF syntax for {domain}"));
                return chain;
            }
        };

        for mechanism in &parsed.mechanisms {
            match mechanism.mechanism_type {
                MechanismType::Include => {
                    let Some(target) = mechanism.value.clone() else {
                        continue;
                    };
                    chain.lookup_count += 1;
                    let child = walk(resolver, target, depth + 1, &mut *visited, &mut *cache, options).await;
                    chain.lookup_count += child.lookup_count;
                    chain.nested_includes.push(child);
                }
                MechanismType::A => {
                    chain.lookup_count += 1;
                    let target = mechanism.value.clone().unwrap_or_else(|| domain.clone());
                    if let Ok(ips) = resolver.lookup_a(&target).await {
                        chain.ipv4.extend(ips.iter().map(|ip| ip.to_string()));
                    }
                    if options.ipv6_enabled {
                        if let Ok(ips) = resolver.lookup_aaaa(&target).await {
                            chain.ipv6.extend(ips.iter().map(|ip| ip.to_string()));
                        }
                    }
                }
                MechanismType::Mx => {
                    chain.lookup_count += 1;
                    let target = mechanism.value.clone().unwrap_or_else(|| domain.clone());
                    if let Ok(exchanges) = resolver.lookup_mx(&target).await {
                        for exchange in exchanges {
                            if let Ok(ips) = resolver.lookup_a(&exchange).await {
                                chain.ipv4.extend(ips.iter().map(|ip| ip.to_string()));
                            }
                            if options.ipv6_enabled {
                                if let Ok(ips) = resolver.lookup_aaaa(&exchange).await {
                                    chain.ipv6.extend(ips.iter().map(|ip| ip.to_string()));
                                }
                            }
                        }
                    }
                }
                MechanismType::Ptr | MechanismType::Exists => {
                    chain.lookup_count += 1;
                }
                MechanismType::Ip4 => {
                    if let Some(v) = &mechanism.value {
                        chain.ipv4.insert(v.clone());
                    }
                }
                MechanismType::Ip6 => {
                    if let Some(v) = &mechanism.value {
                        chain.ipv6.insert(v.clone());
                    }
                }
                MechanismType::All | MechanismType::Unknown => {}
            }
        }

        chain
    })
}

fn union_ips(chain: &SpfIncludeChain, ipv4: &mut HashSet<String>, ipv6: &mut HashSet<String>) {
    ipv4.extend(chain.ipv4.iter().cloned());
    ipv6.extend(chain.ipv6.iter().cloned());
    for child in &chain.nested_includes {
        union_ips(child, ipv4, ipv6);
    }
}

/// Walks `domain`'s SPF record, producing the full include forest plus
/// a deduplicated union of all reachable IPv4/IPv6 literals.
pub async fn resolve_spf(
    resolver: &(dyn DnsLookup),
    domain: &str,
    options: LookupOptions,
) -> SpfLookupResult {
    let mut visited = HashSet::new();
    let mut cache = TxtCache::new();
    let root = walk(resolver, domain.to_string(), 0, &mut visited, &mut cache, options).await;

    let total_lookups = root.lookup_count;
    let exceeds_limit = total_lookups > 10;
    let mut warnings = Vec::new();
    if (8..=9).contains(&total_lookups) {
        warnings.push(format!(
            "SPF chain for {domain} is at {total_lookups} lookups, approaching the 10-lookup limit"
        ));
    }

    let mut ipv4 = HashSet::new();
    let mut ipv6 = HashSet::new();
    union_ips(&root, &mut ipv4, &mut ipv6);

    SpfLookupResult {
        root,
        total_lookups,
        exceeds_limit,
        warnings,
        ipv4,
        ipv6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap as Map;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::Mutex;

    struct MockResolver {
        txt: Map<String, Vec<String>>,
        a: Map<String, Vec<Ipv4Addr>>,
        mx: Map<String, Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DnsLookup for MockResolver {
        async fn lookup_txt(&self, name: &str) -> anyhow::Result<Vec<String>> {
            self.calls.lock().unwrap().push(format!("txt:{name}"));
            Ok(self.txt.get(name).cloned().unwrap_or_default())
        }

        async fn lookup_a(&self, name: &str) -> anyhow::Result<Vec<Ipv4Addr>> {
            Ok(self.a.get(name).cloned().unwrap_or_default())
        }

        async fn lookup_aaaa(&self, _name: &str) -> anyhow::Result<Vec<Ipv6Addr>> {
            Ok(vec![])
        }

        async fn lookup_mx(&self, name: &str) -> anyhow::Result<Vec<String>> {
            Ok(self.mx.get(name).cloned().unwrap_or_default())
        }
    }

    // Scenario: Google-only SPF resolves to one chain.
    #[tokio::test]
    async fn google_only_spf_resolves_to_one_chain() {
        let mut txt = Map::new();
        txt.insert(
            "acme.test".to_string(),
            vec!["v=spf1 include:_spf.google.com ~all".to_string()],
        );
        txt.insert(
            "_spf.google.com".to_string(),
            vec!["v=spf1 ip4:216.239.32.0/19 ip4:64.233.160.0/19 ~all".to_string()],
        );
        let resolver = MockResolver {
            txt,
            a: Map::new(),
            mx: Map::new(),
            calls: Mutex::new(vec![]),
        };

        let result = resolve_spf(&resolver, "acme.test", LookupOptions::default()).await;
        assert_eq!(result.total_lookups, 1);
        assert!(!result.exceeds_limit);
        assert!(result.ipv4.contains("216.239.32.0/19"));
        assert!(result.ipv4.contains("64.233.160.0/19"));
    }

    // Scenario: 11-include SPF trips the cap.
    #[tokio::test]
    async fn eleven_includes_trip_the_cap() {
        let mut txt = Map::new();
        let includes: String = (1..=11)
            .map(|i| format!("include:spf{i}.test "))
            .collect();
        txt.insert("acme.test".to_string(), vec![format!("v=spf1 {includes}~all")]);
        for i in 1..=11 {
            txt.insert(
                format!("spf{i}.test"),
                vec![format!("v=spf1 ip4:10.0.{i}.0/24 ~all")],
            );
        }
        let resolver = MockResolver {
            txt,
            a: Map::new(),
            mx: Map::new(),
            calls: Mutex::new(vec![]),
        };

        let result = resolve_spf(&resolver, "acme.test", LookupOptions::default()).await;
        assert_eq!(result.total_lookups, 11);
        assert!(result.exceeds_limit);
    }

    // Scenario: circular includes terminate.
    #[tokio::test]
    async fn circular_includes_terminate() {
        let mut txt = Map::new();
        txt.insert("a.test".to_string(), vec!["v=spf1 include:b.test ~all".to_string()]);
        txt.insert("b.test".to_string(), vec!["v=spf1 include:a.test ~all".to_string()]);
        let resolver = MockResolver {
            txt,
            a: Map::new(),
            mx: Map::new(),
            calls: Mutex::new(vec![]),
        };

        let result = resolve_spf(&resolver, "a.test", LookupOptions::default()).await;
        let b_node = &result.root.nested_includes[0];
        assert_eq!(b_node.domain, "b.test");
        let a_nested = &b_node.nested_includes[0];
        assert_eq!(a_nested.domain, "a.test");
        assert!(a_nested.circular);
        assert_eq!(a_nested.lookup_count, 0);
    }

    #[tokio::test]
    async fn missing_include_record_still_counts_one_lookup() {
        let mut txt = Map::new();
        txt.insert(
            "acme.test".to_string(),
            vec!["v=spf1 include:ghost.test ~all".to_string()],
        );
        let resolver = MockResolver {
            txt,
            a: Map::new(),
            mx: Map::new(),
            calls: Mutex::new(vec![]),
        };

        let result = resolve_spf(&resolver, "acme.test", LookupOptions::default()).await;
        assert_eq!(result.total_lookups, 1);
        assert_eq!(result.root.nested_includes[0].error.as_deref(), Some("no SPF record found for ghost.test"));
    }

    #[tokio::test]
    async fn mx_mechanism_resolves_each_exchange() {
        let mut txt = Map::new();
        txt.insert("acme.test".to_string(), vec!["v=spf1 mx ~all".to_string()]);
        let mut mx = Map::new();
        mx.insert("acme.test".to_string(), vec!["mail.acme.test".to_string()]);
        let mut a = Map::new();
        a.insert("mail.acme.test".to_string(), vec![Ipv4Addr::new(1, 2, 3, 4)]);

        let resolver = MockResolver {
            txt,
            a,
            mx,
            calls: Mutex::new(vec![]),
        };

        let result = resolve_spf(&resolver, "acme.test", LookupOptions::default()).await;
        assert_eq!(result.total_lookups, 1);
        assert!(result.ipv4.contains("1.2.3.4"));
    }
}
