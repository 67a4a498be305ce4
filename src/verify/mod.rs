//! Verification orchestrator: one call, one [`VerificationResult`].
//!
//! Syntax is checked first and short-circuits without touching the network.
//! Delivery (MX/A resolution and the SMTP probe) then runs alongside the
//! disposable, auth-record and reputation checks.

mod types;

pub use types::{BuildError, VerificationResult, Verdict, VerifyOptions};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::AuthChecker;
use crate::config::Config;
use crate::disposable::DisposableDomainCache;
use crate::dns::DnsResolver;
use crate::greylist::{GreylistError, GreylistStore};
use crate::reputation::ReputationChecker;
use crate::smtp::{MailboxProbe, Rejection, SmtpOutcome, SmtpProber, probe_exchangers};
use crate::validator::EmailAddress;

#[derive(Debug, Default)]
struct Delivery {
    mx_found: bool,
    smtp: Option<SmtpOutcome>,
    mx_host: Option<String>,
    /// Only set after a temporary failure: whether the retry was queued.
    queued: Option<bool>,
}

pub struct Verifier {
    resolver: Arc<DnsResolver>,
    prober: Arc<dyn MailboxProbe>,
    greylist: GreylistStore,
    disposable: Arc<DisposableDomainCache>,
    auth: AuthChecker,
    reputation: ReputationChecker,
    options: VerifyOptions,
}

impl Verifier {
    /// Assembles a verifier from explicit components. Auth and reputation
    /// checks share `resolver` and its cache.
    pub fn new(
        resolver: Arc<DnsResolver>,
        prober: Arc<dyn MailboxProbe>,
        greylist: GreylistStore,
        disposable: Arc<DisposableDomainCache>,
        config: &Config,
    ) -> Self {
        Self {
            auth: AuthChecker::new(Arc::clone(&resolver), config.auth.clone()),
            reputation: ReputationChecker::new(Arc::clone(&resolver), config.reputation.clone()),
            resolver,
            prober,
            greylist,
            disposable,
            options: config.verify.clone(),
        }
    }

    /// Live network components built from `config`.
    pub fn from_config(config: &Config, greylist: GreylistStore) -> Result<Self, BuildError> {
        let resolver = Arc::new(DnsResolver::new(&config.resolver)?);
        let prober = Arc::new(SmtpProber::new(config.probe.clone(), Arc::clone(&resolver))?);
        let disposable = Arc::new(DisposableDomainCache::new(config.disposable.clone())?);
        Ok(Self::new(resolver, prober, greylist, disposable, config))
    }

    pub async fn verify(&self, input: &str) -> VerificationResult {
        let email = match EmailAddress::parse(input) {
            Ok(email) => email,
            Err(err) => {
                debug!(input, reasons = ?err.reasons(), "syntax rejected");
                return VerificationResult::invalid_syntax(input);
            }
        };
        let domain = email.ascii_domain();

        let (delivery, disposable, auth, reputation_listed) = tokio::join!(
            self.check_delivery(&email),
            self.disposable.is_disposable(domain),
            self.auth.check_auth(domain),
            self.reputation.domain_listed(domain),
        );

        let verdict = match (delivery.smtp, delivery.queued) {
            (Some(SmtpOutcome::Accepted), _) if disposable => Verdict::Risky,
            (Some(SmtpOutcome::Accepted), _) if delivery.mx_found => Verdict::Valid,
            (Some(SmtpOutcome::TemporaryFailure { .. }), Some(true)) => Verdict::Greylisted,
            (Some(SmtpOutcome::TemporaryFailure { .. }), _) => Verdict::Unknown,
            _ => Verdict::Invalid,
        };

        info!(
            address = %email,
            %verdict,
            mx_host = delivery.mx_host.as_deref().unwrap_or("-"),
            disposable,
            reputation_listed,
            "address verified"
        );

        VerificationResult {
            address: input.to_string(),
            syntax_valid: true,
            mx_found: delivery.mx_found,
            smtp: delivery.smtp,
            mx_host: delivery.mx_host,
            disposable,
            auth,
            reputation_listed,
            verdict,
        }
    }

    /// Number of addresses waiting for a retry.
    pub async fn greylist_count(&self) -> Result<u64, GreylistError> {
        self.greylist.count().await
    }

    async fn check_delivery(&self, email: &EmailAddress) -> Delivery {
        let domain = email.ascii_domain();
        let hosts = self.resolver.mail_hosts(domain).await;
        if hosts.is_empty() {
            debug!(domain, "no MX or A record");
            return Delivery::default();
        }

        let address = email.canonical();
        let deadline = self.options.probe_deadline;
        let answer = match tokio::time::timeout(
            deadline,
            probe_exchangers(self.prober.as_ref(), &hosts, &address),
        )
        .await
        {
            Ok(answer) => answer,
            Err(_) => {
                warn!(%address, ?deadline, "mail exchangers did not answer in time");
                return Delivery {
                    mx_found: true,
                    smtp: Some(SmtpOutcome::Rejected(Rejection::Unreachable)),
                    ..Delivery::default()
                };
            }
        };

        let queued = match (&answer.outcome, &answer.mx_host) {
            (SmtpOutcome::TemporaryFailure { .. }, Some(host)) => {
                match self
                    .greylist
                    .upsert(&address, host, self.options.greylist_delay)
                    .await
                {
                    Ok(record) => {
                        debug!(%address, tries = record.attempt_count, "queued for retry");
                        Some(true)
                    }
                    Err(err) => {
                        warn!(%address, error = %err, "cannot queue greylisted address");
                        Some(false)
                    }
                }
            }
            _ => None,
        };

        Delivery {
            mx_found: true,
            smtp: Some(answer.outcome),
            mx_host: answer.mx_host,
            queued,
        }
    }
}

#[cfg(test)]
mod tests;
