//! SPF / DKIM / DMARC presence checks over TXT lookups.

mod dkim;
mod dmarc;
mod spf;
mod types;

pub use types::{AuthFlags, AuthLookupOptions, DEFAULT_DKIM_SELECTORS};

use std::sync::Arc;

use tracing::debug;

use crate::dns::DnsResolver;

pub struct AuthChecker {
    resolver: Arc<DnsResolver>,
    options: AuthLookupOptions,
}

impl AuthChecker {
    pub fn new(resolver: Arc<DnsResolver>, options: AuthLookupOptions) -> Self {
        Self { resolver, options }
    }

    /// Runs the three checks concurrently. A lookup that cannot complete
    /// reports `false` for its flag.
    pub async fn check_auth(&self, domain: &str) -> AuthFlags {
        let (spf, dkim, dmarc) = tokio::join!(
            self.has_spf(domain),
            self.has_dkim(domain),
            self.has_dmarc(domain)
        );
        let flags = AuthFlags { spf, dkim, dmarc };
        debug!(domain, ?flags, "auth records checked");
        flags
    }

    pub async fn has_spf(&self, domain: &str) -> bool {
        spf::is_published(&self.resolver.txt(domain).await)
    }

    pub async fn has_dmarc(&self, domain: &str) -> bool {
        dmarc::is_published(&self.resolver.txt(&fqdn("_dmarc", domain)).await)
    }

    /// First selector (in configured order) publishing a DKIM1 key wins.
    pub async fn has_dkim(&self, domain: &str) -> bool {
        for selector in self.options.dkim_selectors() {
            let records = self.resolver.txt(&dkim::selector_name(selector, domain)).await;
            if dkim::is_key_record(&records) {
                debug!(domain, selector = %selector, "dkim selector found");
                return true;
            }
        }
        false
    }
}

pub(crate) fn fqdn(label: &str, domain: &str) -> String {
    let trimmed = label.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", trimmed.to_ascii_lowercase(), domain)
    }
}

#[cfg(test)]
mod tests;
