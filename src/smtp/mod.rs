//! Non-delivering SMTP mailbox probing.
//!
//! A probe opens a session, sends `EHLO`, an empty reverse-path `MAIL FROM`
//! and `RCPT TO` for the target, then `QUIT`. `DATA` is never sent. Each
//! exchanger is tried on 587 (STARTTLS when offered), then 25 (plaintext),
//! then 465 (implicit TLS); a transport that cannot be reached is never
//! retried.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::SmtpError;
pub use options::{DEFAULT_TRANSPORTS, ProbeOptions};
pub use probe::{MailboxProbe, SmtpProber, probe_exchangers};
pub use types::{ExchangerOutcome, Rejection, Security, SmtpOutcome, Transport};
