//! # `hpetl-extract`: API Extraction Stage
//!
//! Fetches every record of one API resource and writes them, in order, to the
//! raw snapshot. Two response shapes are understood:
//!
//! - a bare JSON array (a single, unpaginated page), and
//! - an envelope `{"results": [...], "next": "<url>" | null}` whose `next`
//!   link is followed until it is null.

use async_trait::async_trait;
use hpetl::{snapshot, EtlError, RawRecord, RetryConfig, Stage, StageKind, StageReport};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Custom error types for the extraction process.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("Request to '{url}' failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid API URL '{0}'")]
    InvalidUrl(String),
    #[error("Malformed payload from '{url}': {reason}")]
    Payload { url: String, reason: String },
}

impl From<ExtractError> for EtlError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Fetch { .. } => EtlError::Network(err.to_string()),
            ExtractError::Payload { .. } => EtlError::Parse(err.to_string()),
            ExtractError::InvalidUrl(_) => EtlError::Config(err.to_string()),
            ExtractError::Client(_) => EtlError::Internal(err.into()),
        }
    }
}

/// Where to extract from.
#[derive(Debug, Clone)]
pub struct ApiSource {
    pub base_url: String,
    pub resource: String,
    /// Sent as the `page_size` query parameter on the first request.
    pub page_size: Option<u32>,
    /// Pause between consecutive page requests.
    pub request_delay: Duration,
}

impl ApiSource {
    pub fn new(base_url: &str, resource: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            resource: resource.to_string(),
            page_size: None,
            request_delay: Duration::ZERO,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Builds `{base_url}/{resource}`, plus `page_size` when configured.
    pub fn first_page_url(&self) -> Result<Url, ExtractError> {
        let base = self.base_url.trim_end_matches('/');
        let resource = self.resource.trim_matches('/');
        let raw = if resource.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{resource}")
        };

        let mut url = Url::parse(&raw).map_err(|_| ExtractError::InvalidUrl(raw.clone()))?;
        if let Some(size) = self.page_size {
            url.query_pairs_mut()
                .append_pair("page_size", &size.to_string());
        }
        Ok(url)
    }
}

/// The two page shapes the extractor accepts.
#[derive(Deserialize)]
#[serde(untagged)]
enum Page {
    Items(Vec<Value>),
    Envelope {
        results: Vec<Value>,
        #[serde(default)]
        next: Option<String>,
    },
}

/// Fetches resources over HTTP, applying the configured retry policy to each
/// page request.
pub struct ApiExtractor {
    client: Client,
    retry: RetryConfig,
}

impl ApiExtractor {
    pub fn new(retry: RetryConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .connect_timeout(retry.connect_timeout())
            .timeout(retry.request_timeout())
            .user_agent(concat!("hpetl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ExtractError::Client)?;
        Ok(Self { client, retry })
    }

    async fn fetch_page(&self, url: &Url) -> Result<Page, ExtractError> {
        let client = &self.client;
        let body = self
            .retry
            .run(url.as_str(), || async move {
                client
                    .get(url.clone())
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await
            })
            .await
            .map_err(|source| ExtractError::Fetch {
                url: url.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| ExtractError::Payload {
            url: url.to_string(),
            reason: format!("expected a JSON array or a results envelope: {e}"),
        })
    }

    /// Fetches all pages of `source` and concatenates their records in order.
    pub async fn fetch_all(&self, source: &ApiSource) -> Result<Vec<RawRecord>, ExtractError> {
        let mut next_url = Some(source.first_page_url()?);
        let mut visited = HashSet::new();
        let mut records = Vec::new();
        let mut page_number = 0usize;

        info!("Extracting '{}' from {}", source.resource, source.base_url);

        while let Some(url) = next_url.take() {
            if !visited.insert(url.to_string()) {
                return Err(ExtractError::Payload {
                    url: url.to_string(),
                    reason: "pagination links back to an already fetched page".to_string(),
                });
            }
            if page_number > 0 && !source.request_delay.is_zero() {
                tokio::time::sleep(source.request_delay).await;
            }
            page_number += 1;

            let (items, next) = match self.fetch_page(&url).await? {
                Page::Items(items) => (items, None),
                Page::Envelope { results, next } => (results, next),
            };
            info!("  - Page {page_number}: {} records", items.len());

            for (position, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => records.push(RawRecord(map)),
                    other => {
                        return Err(ExtractError::Payload {
                            url: url.to_string(),
                            reason: format!("item {position} is not a JSON object: {other}"),
                        })
                    }
                }
            }

            next_url = match next {
                Some(link) if !link.trim().is_empty() => {
                    debug!("Following next page link '{link}'");
                    Some(url.join(&link).map_err(|_| ExtractError::InvalidUrl(link))?)
                }
                _ => None,
            };
        }

        info!("Total '{}' extracted: {}", source.resource, records.len());
        Ok(records)
    }

    /// Fetches everything and writes the raw snapshot to `output`.
    ///
    /// Nothing is written unless every page was fetched and parsed.
    pub async fn extract_to(
        &self,
        source: &ApiSource,
        output: &Path,
    ) -> Result<StageReport, EtlError> {
        let records = self.fetch_all(source).await?;
        snapshot::write_snapshot(output, &records)?;

        let mut report = StageReport::new(
            StageKind::Extract,
            source.first_page_url()?.to_string(),
            output.display().to_string(),
        );
        report.records_read = records.len();
        report.records_written = records.len();
        Ok(report)
    }
}

/// The extract stage bound to its source and output path.
pub struct ExtractStage {
    pub extractor: ApiExtractor,
    pub source: ApiSource,
    pub output: PathBuf,
}

#[async_trait]
impl Stage for ExtractStage {
    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    async fn run(&self) -> Result<StageReport, EtlError> {
        self.extractor.extract_to(&self.source, &self.output).await
    }
}
