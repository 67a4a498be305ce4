use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;

use super::error::DisposableError;

/// Somewhere a disposable-domain list can be fetched from.
#[async_trait]
pub trait DomainListSource: Send + Sync {
    /// Label used in log events.
    fn name(&self) -> &str;

    /// Raw newline-delimited list.
    async fn fetch(&self) -> Result<String, DisposableError>;
}

pub struct HttpListSource {
    url: String,
    client: reqwest::Client,
}

impl HttpListSource {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl DomainListSource for HttpListSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<String, DisposableError> {
        let fetch_err = |source| DisposableError::Fetch {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().await.map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DisposableError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_err)
    }
}

pub struct FileListSource {
    path: PathBuf,
    label: String,
}

impl FileListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

#[async_trait]
impl DomainListSource for FileListSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<String, DisposableError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DisposableError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Fixed in-memory list.
pub struct StaticListSource {
    body: String,
}

impl StaticListSource {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = domains
            .into_iter()
            .map(|d| d.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self { body }
    }
}

#[async_trait]
impl DomainListSource for StaticListSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<String, DisposableError> {
        Ok(self.body.clone())
    }
}

/// Trims and lower-cases each line; blank lines and `#` comments are skipped.
pub fn parse_domain_list(body: &str) -> HashSet<String> {
    body.lines()
        .map(|line| line.trim().trim_end_matches('.'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_ascii_lowercase)
        .collect()
}
