//! Structural address validation. No network access happens here.

mod domain;
mod local;
mod types;

pub use types::{EmailAddress, EmailError, ValidationReport};

use domain::check_domain;
use local::check_local;

/// Runs every structural rule and reports all failures at once.
pub fn validate_email(email: &str) -> ValidationReport {
    match EmailAddress::parse(email) {
        Ok(_) => ValidationReport {
            ok: true,
            reasons: Vec::new(),
        },
        Err(err) => ValidationReport {
            ok: false,
            reasons: err.reasons().to_vec(),
        },
    }
}

impl EmailAddress {
    /// Validates `email` and returns the immutable, normalised address.
    pub fn parse(email: &str) -> Result<Self, EmailError> {
        let input = email.trim();
        let mut reasons = Vec::new();

        if input.len() > 254 {
            reasons.push(format!("total length {} > 254", input.len()));
        }

        let parts: Vec<&str> = input.split('@').collect();
        if parts.len() != 2 {
            reasons.push("must contain exactly one '@'".to_string());
            return Err(EmailError::Invalid { reasons });
        }
        let (local, domain) = (parts[0], parts[1]);

        check_local(local, &mut reasons);
        let ascii_domain = check_domain(domain, &mut reasons);

        match ascii_domain {
            Some(ascii) if reasons.is_empty() => {
                Ok(EmailAddress::from_parts(email, local, domain, ascii))
            }
            _ => Err(EmailError::Invalid { reasons }),
        }
    }
}
