use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Which public recursive DNS provider a pinned resolver IP belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverProvider {
    Google,
    Cloudflare,
    Opendns,
}

/// One pinned recursive resolver in the fixed pool.
#[derive(Debug, Clone, Copy)]
pub struct ResolverEndpoint {
    pub ip: IpAddr,
    pub provider: ResolverProvider,
}

/// The fixed six-member pool: two each of Google, Cloudflare, OpenDNS.
pub const RESOLVER_POOL: [ResolverEndpoint; 6] = [
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
        provider: ResolverProvider::Google,
    },
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
        provider: ResolverProvider::Google,
    },
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
        provider: ResolverProvider::Cloudflare,
    },
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(1, 0, 0, 1)),
        provider: ResolverProvider::Cloudflare,
    },
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222)),
        provider: ResolverProvider::Opendns,
    },
    ResolverEndpoint {
        ip: IpAddr::V4(Ipv4Addr::new(208, 67, 220, 220)),
        provider: ResolverProvider::Opendns,
    },
];

/// Defaults table, overridable per call.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_ttl: u32,
    pub resolver_timeout: Duration,
    pub check_interval: Duration,
    pub session_horizon: Duration,
    pub spf_max_depth: usize,
    pub spf_lookup_limit: usize,
    pub dns_txt_string_cap: usize,
    pub spf_record_cap: usize,
    pub ip_cache_ttl: Duration,
    pub status_cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: 3600,
            resolver_timeout: Duration::from_secs(5),
            check_interval: Duration::from_millis(30_000),
            session_horizon: Duration::from_millis(172_800_000),
            spf_max_depth: 10,
            spf_lookup_limit: 10,
            dns_txt_string_cap: 255,
            spf_record_cap: 512,
            ip_cache_ttl: Duration::from_secs(3600),
            status_cache_ttl: Duration::from_secs(10),
        }
    }
}
