use std::fmt;

use thiserror::Error;

/// Outcome of a structural syntax check: `ok` plus every rule that failed.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub ok: bool,
    pub reasons: Vec<String>,
}

/// A syntactically valid address. Only [`EmailAddress::parse`] builds one, so
/// holding a value is proof that the structural checks passed.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    original: String,
    local: String,
    domain: String,
    ascii_domain: String,
}

impl EmailAddress {
    pub(crate) fn from_parts(original: &str, local: &str, domain: &str, ascii_domain: String) -> Self {
        Self {
            original: original.to_string(),
            local: local.to_string(),
            domain: domain.to_lowercase(),
            ascii_domain,
        }
    }

    /// The input exactly as supplied (untrimmed).
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Lower-cased domain, possibly containing Unicode labels.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// IDNA (punycode) form of the domain, used for every network lookup.
    pub fn ascii_domain(&self) -> &str {
        &self.ascii_domain
    }

    /// `local@ascii_domain`, the form sent in `RCPT TO` and stored in the greylist.
    pub fn canonical(&self) -> String {
        format!("{}@{}", self.local, self.ascii_domain)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("invalid email address: {}", reasons.join("; "))]
    Invalid { reasons: Vec<String> },
}

impl EmailError {
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Invalid { reasons } => reasons,
        }
    }
}
