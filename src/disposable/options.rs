use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Public newline-delimited disposable-domain lists.
pub const DEFAULT_LIST_URLS: [&str; 3] = [
    "https://raw.githubusercontent.com/andreis/disposable-email-domains/master/domains.txt",
    "https://raw.githubusercontent.com/wesbos/burner-email-providers/master/emails.txt",
    "https://raw.githubusercontent.com/disposable/disposable-email-domains/master/domains.txt",
];

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposableOptions {
    /// Age after which the set is refreshed.
    pub ttl: Duration,
    pub list_urls: Vec<String>,
    pub fetch_timeout: Duration,
    /// Minimum wait before retrying after a refresh that yielded nothing.
    pub failure_backoff: Duration,
    /// Written after each successful refresh; reused at startup while fresh.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for DisposableOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            list_urls: DEFAULT_LIST_URLS.iter().map(|u| u.to_string()).collect(),
            fetch_timeout: Duration::from_secs(10),
            failure_backoff: Duration::from_secs(5 * 60),
            snapshot_path: None,
        }
    }
}
