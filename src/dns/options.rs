use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Resolver knobs. Defaults: Google and Cloudflare public resolvers, 2 s per
/// query, 4 s overall, 600 s cache freshness.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    pub nameservers: Vec<String>,
    pub query_timeout: Duration,
    pub lifetime: Duration,
    pub cache_ttl: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            nameservers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],
            query_timeout: Duration::from_secs(2),
            lifetime: Duration::from_secs(4),
            cache_ttl: Duration::from_secs(600),
        }
    }
}
