#![forbid(unsafe_code)]
//! mailprobe: mailbox existence probing without delivering mail.
//!
//! The pipeline is: syntax check, MX/A resolution, a non-delivering SMTP
//! dialogue, and informational checks (disposable domains, SPF/DKIM/DMARC,
//! DNSBL reputation). Temporary SMTP failures are queued in a SQLite-backed
//! greylist and retried in the background by [`RetryScheduler`].

pub mod auth;
pub mod config;
pub mod disposable;
pub mod dns;
pub mod greylist;
pub mod reputation;
pub mod smtp;
pub mod validator;
pub mod verify;

pub use auth::{AuthChecker, AuthFlags, AuthLookupOptions};
pub use config::Config;
pub use disposable::{
    DisposableDomainCache, DisposableError, DisposableOptions, DomainListSource, FileListSource,
    HttpListSource, StaticListSource,
};
pub use dns::{DnsError, DnsResolver, RecordSet, RecordType, Resolution, ResolverOptions, Upstream};
pub use greylist::{
    GreylistError, GreylistRecord, GreylistStore, PassSummary, RetryPolicy, RetryScheduler,
};
pub use reputation::{ReputationChecker, ReputationOptions};
pub use smtp::{MailboxProbe, ProbeOptions, Rejection, SmtpOutcome, SmtpProber};
pub use validator::{EmailAddress, EmailError, ValidationReport, validate_email};
pub use verify::{BuildError, VerificationResult, Verdict, Verifier, VerifyOptions};
