//! DNSBL reputation lookups.
//!
//! An address is listed in a zone when `<reversed octets>.<zone>` resolves to
//! any A record. Zones are consulted in order and the first listing wins.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dns::{DnsResolver, RecordType};

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationOptions {
    pub zones: Vec<String>,
}

impl Default for ReputationOptions {
    fn default() -> Self {
        Self {
            zones: vec!["zen.spamhaus.org".to_string(), "bl.spamcop.net".to_string()],
        }
    }
}

pub struct ReputationChecker {
    resolver: Arc<DnsResolver>,
    zones: Vec<String>,
}

impl ReputationChecker {
    pub fn new(resolver: Arc<DnsResolver>, options: ReputationOptions) -> Self {
        let zones = options
            .zones
            .into_iter()
            .map(|zone| zone.trim().trim_matches('.').to_ascii_lowercase())
            .filter(|zone| !zone.is_empty())
            .collect();
        Self { resolver, zones }
    }

    pub async fn is_listed(&self, ip: Ipv4Addr) -> bool {
        for zone in &self.zones {
            let query = dnsbl_query(ip, zone);
            if self.resolver.resolve(&query, RecordType::A).await.is_found() {
                warn!(%ip, zone = %zone, "address listed on DNSBL");
                return true;
            }
        }
        debug!(%ip, "address not listed");
        false
    }

    /// Checks the addresses of the domain's mail exchangers, or of the domain
    /// itself when it publishes no MX.
    pub async fn domain_listed(&self, domain: &str) -> bool {
        for host in self.resolver.mail_hosts(domain).await {
            for ip in self.resolver.ipv4(&host).await {
                if self.is_listed(ip).await {
                    return true;
                }
            }
        }
        false
    }
}

pub(crate) fn dnsbl_query(ip: Ipv4Addr, zone: &str) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{d}.{c}.{b}.{a}.{zone}")
}
