//! Disposable (throw-away) email domain detection.
//!
//! The domain set is the union of several public lists, refreshed once it is
//! older than the TTL. Readers clone an `Arc` to the current set; a refresh
//! swaps in a new one.

mod error;
mod options;
mod source;

pub use error::DisposableError;
pub use options::{DEFAULT_LIST_URLS, DisposableOptions};
pub use source::{
    DomainListSource, FileListSource, HttpListSource, StaticListSource, parse_domain_list,
};

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Default)]
struct DomainSet {
    domains: Arc<HashSet<String>>,
    fetched_at: Option<Instant>,
    failed_at: Option<Instant>,
}

pub struct DisposableDomainCache {
    sources: Vec<Box<dyn DomainListSource>>,
    options: DisposableOptions,
    state: RwLock<DomainSet>,
    refresh_lock: Mutex<()>,
}

impl DisposableDomainCache {
    /// HTTP sources from `options.list_urls`, seeded from the snapshot file
    /// when it is still fresh.
    pub fn new(options: DisposableOptions) -> Result<Self, DisposableError> {
        let client = reqwest::Client::builder()
            .timeout(options.fetch_timeout)
            .build()
            .map_err(DisposableError::Client)?;
        let sources = options
            .list_urls
            .iter()
            .map(|url| Box::new(HttpListSource::new(url, client.clone())) as Box<dyn DomainListSource>)
            .collect();
        Ok(Self::with_sources(sources, options))
    }

    pub fn with_sources(sources: Vec<Box<dyn DomainListSource>>, options: DisposableOptions) -> Self {
        let initial = options
            .snapshot_path
            .as_deref()
            .and_then(|path| load_snapshot(path, &options))
            .unwrap_or_default();
        Self {
            sources,
            options,
            state: RwLock::new(initial),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Membership test on the lower-cased domain, refreshing a stale set
    /// first.
    pub async fn is_disposable(&self, domain: &str) -> bool {
        if self.needs_refresh() {
            let _guard = self.refresh_lock.lock().await;
            // Another caller may have refreshed while we waited.
            if self.needs_refresh() {
                if let Err(err) = self.refresh_locked().await {
                    warn!(error = %err, "disposable list refresh failed, keeping previous set");
                }
            }
        }
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        self.domains().contains(&domain)
    }

    /// Fetches every source now. Returns the size of the new set.
    pub async fn refresh(&self) -> Result<usize, DisposableError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Current set, without triggering a refresh.
    pub fn domains(&self) -> Arc<HashSet<String>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state.domains)
    }

    fn needs_refresh(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let stale = state
            .fetched_at
            .is_none_or(|at| at.elapsed() >= self.options.ttl);
        let backing_off = state
            .failed_at
            .is_some_and(|at| at.elapsed() < self.options.failure_backoff);
        stale && !backing_off
    }

    async fn refresh_locked(&self) -> Result<usize, DisposableError> {
        let mut merged = HashSet::new();
        for source in &self.sources {
            match source.fetch().await {
                Ok(body) => {
                    let domains = parse_domain_list(&body);
                    debug!(source = source.name(), count = domains.len(), "disposable list fetched");
                    merged.extend(domains);
                }
                Err(err) => warn!(source = source.name(), error = %err, "disposable list unavailable"),
            }
        }

        let now = Instant::now();
        if merged.is_empty() {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.failed_at = Some(now);
            return Err(DisposableError::Empty);
        }

        let count = merged.len();
        let merged = Arc::new(merged);
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            *state = DomainSet {
                domains: Arc::clone(&merged),
                fetched_at: Some(now),
                failed_at: None,
            };
        }
        info!(count, "disposable domain set refreshed");

        if let Some(path) = &self.options.snapshot_path {
            if let Err(err) = write_snapshot(path, &merged).await {
                warn!(error = %err, "cannot write disposable snapshot");
            }
        }
        Ok(count)
    }
}

fn load_snapshot(path: &Path, options: &DisposableOptions) -> Option<DomainSet> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let age = SystemTime::now().duration_since(modified).unwrap_or_default();
    if age >= options.ttl {
        debug!(path = %path.display(), ?age, "disposable snapshot expired");
        return None;
    }
    let body = std::fs::read_to_string(path).ok()?;
    let domains = parse_domain_list(&body);
    if domains.is_empty() {
        return None;
    }
    debug!(path = %path.display(), count = domains.len(), "disposable snapshot loaded");
    Some(DomainSet {
        domains: Arc::new(domains),
        fetched_at: Instant::now().checked_sub(age),
        failed_at: None,
    })
}

async fn write_snapshot(path: &Path, domains: &HashSet<String>) -> Result<(), DisposableError> {
    let mut sorted: Vec<&str> = domains.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut body = sorted.join("\n");
    body.push('\n');
    tokio::fs::write(path, body)
        .await
        .map_err(|source| DisposableError::Io {
            path: path.to_path_buf(),
            source,
        })
}
