use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::types::{Security, Transport};

/// Transports in the order they are attempted.
pub const DEFAULT_TRANSPORTS: [Transport; 3] = [
    Transport::new(587, Security::StartTls),
    Transport::new(25, Security::Plain),
    Transport::new(465, Security::Implicit),
];

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub helo_domain: String,
    pub connect_timeout: Duration,
    /// Per command: the time allowed to send it and read its complete reply.
    pub command_timeout: Duration,
    /// Ceiling on one whole conversation, from connect to QUIT.
    pub session_timeout: Duration,
    pub transports: Vec<Transport>,
    /// Mail exchangers routinely present self-signed or mismatched
    /// certificates; the probe only needs the channel, not the identity.
    pub accept_invalid_certs: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            helo_domain: "verify.local".to_string(),
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(5),
            session_timeout: Duration::from_secs(20),
            transports: DEFAULT_TRANSPORTS.to_vec(),
            accept_invalid_certs: true,
        }
    }
}

impl ProbeOptions {
    /// Name announced in `EHLO`; `localhost` when unset.
    pub fn helo_name(&self) -> &str {
        match self.helo_domain.trim() {
            "" => "localhost",
            name => name,
        }
    }
}
