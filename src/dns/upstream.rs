use std::net::IpAddr;

use async_trait::async_trait;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfigGroup, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    lookup::TxtLookup,
};

use super::{DnsError, MxRecord, RecordSet, RecordType, ResolverOptions, UpstreamError};

/// The network side of the resolver. Tests swap in a deterministic stub.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn query(&self, name: &str, record_type: RecordType) -> Result<RecordSet, UpstreamError>;
}

/// [`Upstream`] backed by `trust-dns` talking to a fixed nameserver list.
pub struct TrustDnsUpstream {
    resolver: TokioAsyncResolver,
}

impl TrustDnsUpstream {
    pub fn new(options: &ResolverOptions) -> Result<Self, DnsError> {
        if options.nameservers.is_empty() {
            return Err(DnsError::NoNameservers);
        }
        let mut ips = Vec::with_capacity(options.nameservers.len());
        for value in &options.nameservers {
            let ip = value
                .trim()
                .parse::<IpAddr>()
                .map_err(|source| DnsError::InvalidNameserver {
                    value: value.clone(),
                    source,
                })?;
            ips.push(ip);
        }

        let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);
        let mut opts = ResolverOpts::default();
        opts.timeout = options.query_timeout;
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }
}

#[async_trait]
impl Upstream for TrustDnsUpstream {
    async fn query(&self, name: &str, record_type: RecordType) -> Result<RecordSet, UpstreamError> {
        match record_type {
            RecordType::Mx => {
                let lookup = self.resolver.mx_lookup(name).await.map_err(classify)?;
                let records = lookup
                    .iter()
                    .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(&mx.exchange().to_utf8())))
                    .collect();
                Ok(RecordSet::Mx(records))
            }
            RecordType::A => {
                let lookup = self.resolver.ipv4_lookup(name).await.map_err(classify)?;
                Ok(RecordSet::A(lookup.iter().map(|a| a.0).collect()))
            }
            RecordType::Txt => {
                let lookup = self.resolver.txt_lookup(name).await.map_err(classify)?;
                Ok(RecordSet::Txt(collect_txt_records(&lookup)))
            }
        }
    }
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

fn collect_txt_records(lookup: &TxtLookup) -> Vec<String> {
    lookup
        .iter()
        .map(|txt| {
            txt.txt_data()
                .iter()
                .map(|piece| String::from_utf8_lossy(piece))
                .collect::<String>()
        })
        .collect()
}

fn classify(err: ResolveError) -> UpstreamError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => UpstreamError::NoRecords,
        ResolveErrorKind::Timeout => UpstreamError::Timeout,
        _ => UpstreamError::Lookup(err.to_string()),
    }
}
