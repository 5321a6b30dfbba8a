// src/services/search.rs

//! Search client service.
//!
//! Walks the remote result set page by page for one `SearchSpec`, filters
//! listings against the include/exclude terms, diffs them against the job's
//! snapshot and hands new listings and price drops to a `MatchSink`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, GeoTable, Listing, RemoteListing, SearchSpec, Snapshot};
use crate::pipeline::diff::{DiffEngine, DiffStats};
use crate::utils::http::{FetchedBody, RateLimitedTransport};

/// One page of raw results from the search backend.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the page starting at offset `start`. An empty page ends the sweep.
    async fn fetch_page(
        &self,
        spec: &SearchSpec,
        start: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteListing>>;
}

/// Receives the listings that are new or got cheaper.
#[async_trait]
pub trait MatchSink: Send {
    async fn on_match(&mut self, listing: &Listing) -> Result<()>;
}

/// Sink that ignores every match, used for priming sweeps.
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl MatchSink for NoopSink {
    async fn on_match(&mut self, _listing: &Listing) -> Result<()> {
        Ok(())
    }
}

/// Counters for one sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Successful page fetches, including the final empty page
    pub pages: usize,
    /// Same-page retries after transient failures
    pub retries: usize,
    /// Listings returned by the API
    pub fetched: usize,
    /// Listings that passed the include/exclude filters
    pub matched: usize,
    pub diff: DiffStats,
    /// Whether the sweep stopped early on cancellation
    pub cancelled: bool,
}

/// Paginated, retrying sweep over a `ListingSource`.
#[derive(Clone)]
pub struct SearchClient {
    source: Arc<dyn ListingSource>,
    link_base: String,
    engine: DiffEngine,
}

impl SearchClient {
    pub fn new(source: Arc<dyn ListingSource>, link_base: impl Into<String>) -> Self {
        Self {
            source,
            link_base: link_base.into(),
            engine: DiffEngine::new(),
        }
    }

    /// Run one full sweep for `spec`, updating `snapshot` in place.
    ///
    /// Timeouts and 502s retry the same page; any other fetch error or a sink
    /// error aborts the sweep. Cancellation ends it cleanly.
    pub async fn search(
        &self,
        spec: &SearchSpec,
        snapshot: &mut Snapshot,
        cancel: &CancellationToken,
        sink: &mut dyn MatchSink,
    ) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        let mut start = 0;

        loop {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                return Ok(stats);
            }

            let page = match self.source.fetch_page(spec, start, cancel).await {
                Ok(page) => page,
                Err(AppError::Cancelled) => {
                    stats.cancelled = true;
                    return Ok(stats);
                }
                Err(e) if e.is_transient() => {
                    log::debug!("Retrying page at offset {}: {}", start, e);
                    stats.retries += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            stats.pages += 1;
            if page.is_empty() {
                return Ok(stats);
            }
            stats.fetched += page.len();
            start += page.len();

            for remote in &page {
                if !spec.matches(&remote.title, &remote.description) {
                    continue;
                }
                stats.matched += 1;

                let mut listing = Listing::from_remote(remote, &self.link_base);
                let kind = self.engine.observe(snapshot, &mut listing);
                stats.diff.record(kind);

                if kind.is_notifiable() {
                    sink.on_match(&listing).await?;
                }
            }
        }
    }
}

/// Response body of the search endpoint.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search_objects: Vec<RemoteListing>,
}

/// `ListingSource` backed by the HTTP search API.
pub struct ApiSource {
    transport: Arc<RateLimitedTransport>,
    base_url: Url,
    geo: GeoTable,
}

impl ApiSource {
    pub fn new(
        transport: Arc<RateLimitedTransport>,
        config: &ApiConfig,
        geo: GeoTable,
    ) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: Url::parse(&config.base_url)?,
            geo,
        })
    }

    /// Build the request URL for one page.
    pub fn page_url(&self, spec: &SearchSpec, start: usize) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("keywords", &spec.keywords)
                .append_pair("order_by", "newest")
                .append_pair("start", &start.to_string());

            if let Some(code) = spec.area_code {
                let (lat, long) = self.geo.lat_long(code).ok_or(AppError::Geo(code))?;
                query
                    .append_pair("latitude", &format!("{lat:.5}"))
                    .append_pair("longitude", &format!("{long:.5}"));
                if let Some(km) = spec.radius_km {
                    query.append_pair("distance", &(u64::from(km) * 1000).to_string());
                }
            }
            if let Some(min) = spec.min_price {
                query.append_pair("min_sale_price", &min.to_string());
            }
            if let Some(max) = spec.max_price {
                query.append_pair("max_sale_price", &max.to_string());
            }
        }
        Ok(url)
    }
}

/// Interpret a fetched page: 200 is decoded, 502 is retryable, anything else fatal.
fn parse_page(fetched: FetchedBody) -> Result<Vec<RemoteListing>> {
    match fetched.status {
        200 => {
            let response: SearchResponse = serde_json::from_str(&fetched.body)?;
            Ok(response.search_objects)
        }
        502 => Err(AppError::BadGateway),
        status => Err(AppError::Status { status }),
    }
}

#[async_trait]
impl ListingSource for ApiSource {
    async fn fetch_page(
        &self,
        spec: &SearchSpec,
        start: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteListing>> {
        let url = self.page_url(spec, start)?;
        let fetched = self.transport.get(url, cancel).await?;
        parse_page(fetched)
    }
}
