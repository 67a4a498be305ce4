use std::fmt;
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthFlags;
use crate::disposable::DisposableError;
use crate::dns::DnsError;
use crate::smtp::{SmtpError, SmtpOutcome};

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Delay before the first retry of a deferred address.
    pub greylist_delay: Duration,
    /// Upper bound on the whole SMTP stage of one `verify` call, across all
    /// exchangers and transports.
    pub probe_deadline: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            greylist_delay: Duration::from_secs(600),
            probe_deadline: Duration::from_secs(60),
        }
    }
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Accepted, but the domain hands out throw-away addresses.
    Risky,
    Invalid,
    /// Deferred, and the retry could not be queued.
    Unknown,
    /// Deferred and queued for a background retry.
    Greylisted,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Risky => "risky",
            Self::Invalid => "invalid",
            Self::Unknown => "unknown",
            Self::Greylisted => "greylisted",
        })
    }
}

/// Everything learned about one address in a single `verify` call.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub address: String,
    pub syntax_valid: bool,
    /// MX records, or an A record standing in for them.
    pub mx_found: bool,
    /// `None` when no exchanger was probed.
    pub smtp: Option<SmtpOutcome>,
    pub mx_host: Option<String>,
    pub disposable: bool,
    pub auth: AuthFlags,
    pub reputation_listed: bool,
    pub verdict: Verdict,
}

impl VerificationResult {
    pub(crate) fn invalid_syntax(address: &str) -> Self {
        Self {
            address: address.to_string(),
            syntax_valid: false,
            mx_found: false,
            smtp: None,
            mx_host: None,
            disposable: false,
            auth: AuthFlags::default(),
            reputation_listed: false,
            verdict: Verdict::Invalid,
        }
    }
}

/// Failure to assemble a [`Verifier`](super::Verifier) from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("DNS resolver: {0}")]
    Dns(#[from] DnsError),
    #[error("SMTP prober: {0}")]
    Smtp(#[from] SmtpError),
    #[error("disposable domain cache: {0}")]
    Disposable(#[from] DisposableError),
}
