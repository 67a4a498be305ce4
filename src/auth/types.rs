#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Presence of the three sender-authentication records for a domain.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthFlags {
    pub spf: bool,
    pub dkim: bool,
    pub dmarc: bool,
}

/// Common DKIM selector labels, probed in this order.
pub const DEFAULT_DKIM_SELECTORS: &[&str] =
    &["selector1", "selector2", "default", "dkim", "google", "mail"];

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLookupOptions {
    dkim_selectors: Vec<String>,
}

impl AuthLookupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an empty selector list instead of the defaults.
    pub fn without_selectors() -> Self {
        Self {
            dkim_selectors: Vec::new(),
        }
    }

    pub fn with_dkim_selector(mut self, selector: impl Into<String>) -> Self {
        if let Some(normalized) = normalize_selector(selector.into()) {
            if !self.dkim_selectors.contains(&normalized) {
                self.dkim_selectors.push(normalized);
            }
        }
        self
    }

    pub fn with_dkim_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for selector in selectors {
            self = self.with_dkim_selector(selector);
        }
        self
    }

    pub fn dkim_selectors(&self) -> &[String] {
        &self.dkim_selectors
    }
}

impl Default for AuthLookupOptions {
    fn default() -> Self {
        Self::without_selectors().with_dkim_selectors(DEFAULT_DKIM_SELECTORS.iter().copied())
    }
}

fn normalize_selector(input: String) -> Option<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
