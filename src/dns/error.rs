use thiserror::Error;

/// Errors raised by the resolver itself. Individual lookups never fail this
/// way: they fold into [`Resolution::NotFound`](super::Resolution::NotFound).
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("no upstream nameserver configured")]
    NoNameservers,
    #[error("invalid nameserver address '{value}': {source}")]
    InvalidNameserver {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Failure reported by an [`Upstream`](super::Upstream) for a single query.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("no records found")]
    NoRecords,
    #[error("query timed out")]
    Timeout,
    #[error("lookup failed: {0}")]
    Lookup(String),
}
