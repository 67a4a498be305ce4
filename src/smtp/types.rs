use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Why a mailbox check ended in [`SmtpOutcome::Rejected`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The server answered with a definitive non-250, non-4xx code.
    Code(u16),
    /// No transport could complete a dialogue with the host.
    Unreachable,
}

/// Result of one mailbox check against one mail exchanger.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpOutcome {
    Accepted,
    Rejected(Rejection),
    /// 4xx: the server deferred its decision (typically greylisting).
    TemporaryFailure { code: u16 },
}

impl SmtpOutcome {
    /// Maps an `RCPT TO` reply code onto the three outcomes.
    pub fn from_code(code: u16) -> Self {
        match code {
            250 => Self::Accepted,
            400..=499 => Self::TemporaryFailure { code },
            other => Self::Rejected(Rejection::Code(other)),
        }
    }

    /// Accepted, or rejected with an explicit code. Unreachable hosts and
    /// temporary failures are not definitive.
    pub fn is_definitive(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected(Rejection::Code(_)))
    }
}

impl fmt::Display for SmtpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected(Rejection::Code(code)) => write!(f, "rejected ({code})"),
            Self::Rejected(Rejection::Unreachable) => f.write_str("rejected (unreachable)"),
            Self::TemporaryFailure { code } => write!(f, "temporary failure ({code})"),
        }
    }
}

/// How a transport secures the session.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Plaintext, upgraded with STARTTLS when the server advertises it.
    StartTls,
    Plain,
    /// TLS from the first byte (SMTPS).
    Implicit,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub port: u16,
    pub security: Security,
}

impl Transport {
    pub const fn new(port: u16, security: Security) -> Self {
        Self { port, security }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.security {
            Security::StartTls => "starttls",
            Security::Plain => "plain",
            Security::Implicit => "tls",
        };
        write!(f, "{}/{label}", self.port)
    }
}

/// Outcome over a domain's exchanger list, with the host that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangerOutcome {
    pub outcome: SmtpOutcome,
    pub mx_host: Option<String>,
}
