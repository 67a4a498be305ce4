//! Cached, timeout-bounded DNS lookups (MX, A, TXT).
//!
//! [`DnsResolver`] is an explicitly constructed service: callers share it via
//! `Arc` and every instance owns its own cache. Lookup failures of any kind
//! (NXDOMAIN, empty answer, timeout, malformed response) surface as absence.

mod cache;
mod error;
mod options;
mod types;
mod upstream;

pub use error::{DnsError, UpstreamError};
pub use options::ResolverOptions;
pub use types::{MxRecord, RecordSet, RecordType, Resolution};
pub use upstream::{TrustDnsUpstream, Upstream};

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use cache::DnsCache;

pub struct DnsResolver {
    upstream: Arc<dyn Upstream>,
    cache: DnsCache,
    lifetime: Duration,
}

impl DnsResolver {
    /// Builds a resolver talking to `options.nameservers`.
    pub fn new(options: &ResolverOptions) -> Result<Self, DnsError> {
        let upstream = TrustDnsUpstream::new(options)?;
        Ok(Self::with_upstream(Arc::new(upstream), options))
    }

    pub fn with_upstream(upstream: Arc<dyn Upstream>, options: &ResolverOptions) -> Self {
        Self {
            upstream,
            cache: DnsCache::new(options.cache_ttl),
            lifetime: options.lifetime,
        }
    }

    /// Resolves `name` for `record_type`, serving fresh cache entries without a
    /// network round trip. Only positive answers are cached.
    pub async fn resolve(&self, name: &str, record_type: RecordType) -> Resolution {
        let key = name.trim().trim_end_matches('.').to_ascii_lowercase();
        if let Some(records) = self.cache.get(&key, record_type) {
            debug!(name = %key, %record_type, "dns cache hit");
            return Resolution::Found(records);
        }

        let answer = tokio::time::timeout(self.lifetime, self.upstream.query(&key, record_type)).await;
        match answer {
            Ok(Ok(records)) if !records.is_empty() => {
                self.cache.insert(&key, records.clone());
                Resolution::Found(records)
            }
            Ok(Ok(_)) | Ok(Err(UpstreamError::NoRecords)) => {
                debug!(name = %key, %record_type, "no records");
                Resolution::NotFound
            }
            Ok(Err(UpstreamError::Timeout)) | Err(_) => {
                debug!(name = %key, %record_type, "dns query timed out");
                Resolution::TimedOut
            }
            Ok(Err(err)) => {
                debug!(name = %key, %record_type, error = %err, "dns query failed");
                Resolution::NotFound
            }
        }
    }

    /// MX and A lookups run concurrently; either one resolving counts as mail
    /// infrastructure (A-record fallback).
    pub async fn has_mail_infrastructure(&self, domain: &str) -> bool {
        !self.mail_hosts(domain).await.is_empty()
    }

    /// Hosts to contact for `domain`: its exchangers by preference, or the
    /// domain itself when it has no MX but an A record. Empty when neither
    /// resolves. MX and A are looked up concurrently.
    pub async fn mail_hosts(&self, domain: &str) -> Vec<String> {
        let (exchangers, a) = tokio::join!(
            self.mx_hosts(domain),
            self.resolve(domain, RecordType::A)
        );
        debug!(
            domain,
            mx = exchangers.len(),
            a = a.is_found(),
            "mail infrastructure check"
        );
        if !exchangers.is_empty() {
            exchangers.into_iter().map(|mx| mx.exchange).collect()
        } else if a.is_found() {
            vec![domain.trim().trim_end_matches('.').to_ascii_lowercase()]
        } else {
            Vec::new()
        }
    }

    /// Exchanges sorted by ascending preference, deduplicated.
    pub async fn mx_hosts(&self, domain: &str) -> Vec<MxRecord> {
        let mut records = match self.resolve(domain, RecordType::Mx).await {
            Resolution::Found(RecordSet::Mx(records)) => records,
            _ => return Vec::new(),
        };
        records.retain(|record| !record.exchange.is_empty());
        records.sort();
        records.dedup();
        records
    }

    pub async fn ipv4(&self, name: &str) -> Vec<Ipv4Addr> {
        match self.resolve(name, RecordType::A).await {
            Resolution::Found(RecordSet::A(addrs)) => addrs,
            _ => Vec::new(),
        }
    }

    pub async fn txt(&self, name: &str) -> Vec<String> {
        match self.resolve(name, RecordType::Txt).await {
            Resolution::Found(RecordSet::Txt(records)) => records,
            _ => Vec::new(),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
