//! Persistent greylist queue and the background retry loop draining it.
//!
//! An address lands here when an exchanger defers `RCPT TO` with a 4xx
//! reply. [`RetryScheduler`] re-probes due entries with exponential backoff
//! and removes them on a definitive answer or once the attempt ceiling is
//! reached.

mod error;
mod scheduler;
mod store;

pub use error::GreylistError;
pub use scheduler::{PassSummary, RetryPolicy, RetryScheduler};
pub use store::{GreylistRecord, GreylistStore};

#[cfg(test)]
mod tests;
