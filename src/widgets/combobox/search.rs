//! Remote search with debounce and stale-response protection
//!
//! Every keystroke that qualifies for a remote search calls
//! [`SearchScheduler::schedule`], which bumps a sequence number and spawns a
//! task that sleeps for the debounce interval. When it wakes, a task whose
//! number is no longer the latest gives up silently; otherwise it reports
//! `Started`, performs the request and reports `Finished` through the
//! instance's [`Postman`]. The widget applies a `Finished` result only if its
//! sequence number is still current, so out-of-order responses are dropped.

use super::options::{coerce_options, ComboOption};
use crate::runtime::Postman;
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search endpoint {endpoint}: {message}")]
    Endpoint { endpoint: String, message: String },

    #[error("search request failed: {0}")]
    Transport(String),

    #[error("search returned status {0}")]
    Status(u16),

    #[error("search response was not JSON: {0}")]
    Decode(String),
}

/// Performs one search request
pub trait SearchClient: Send + Sync + 'static {
    fn search(&self, endpoint: &str, query: &str)
        -> BoxFuture<'static, Result<Vec<ComboOption>, SearchError>>;
}

/// `GET {endpoint}?q={query}` against an origin, expecting a JSON array
pub struct HttpSearchClient {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpSearchClient {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let base = reqwest::Url::parse(base).with_context(|| format!("Invalid origin: {base}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, base })
    }
}

impl SearchClient for HttpSearchClient {
    fn search(
        &self,
        endpoint: &str,
        query: &str,
    ) -> BoxFuture<'static, Result<Vec<ComboOption>, SearchError>> {
        let client = self.client.clone();
        let url = self.base.join(endpoint).map(|mut url| {
            url.query_pairs_mut().append_pair("q", query);
            url
        });
        let endpoint = endpoint.to_string();

        async move {
            let url = url.map_err(|e| SearchError::Endpoint {
                endpoint,
                message: e.to_string(),
            })?;
            let response = client
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| SearchError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(SearchError::Status(status.as_u16()));
            }
            let data: serde_json::Value = response
                .json()
                .await
                .map_err(|e| SearchError::Decode(e.to_string()))?;
            Ok(coerce_options(&data))
        }
        .boxed()
    }
}

/// Progress of one scheduled search, delivered as mail
#[derive(Debug)]
pub enum SearchMessage {
    Started {
        seq: u64,
        query: String,
    },
    Finished {
        seq: u64,
        query: String,
        result: Result<Vec<ComboOption>, SearchError>,
    },
}

/// Debounces searches and tracks which one is current
#[derive(Debug, Clone)]
pub struct SearchScheduler {
    latest: Arc<AtomicU64>,
    debounce: Duration,
}

impl SearchScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            debounce,
        }
    }

    /// Whether `seq` is the most recently scheduled search
    pub fn is_current(&self, seq: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == seq
    }

    /// Supersede anything pending or in flight
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Schedule a search for `query`, superseding earlier ones
    ///
    /// Returns the sequence number, or `None` when called outside a tokio
    /// runtime.
    pub fn schedule(
        &self,
        client: Arc<dyn SearchClient>,
        endpoint: &str,
        query: &str,
        postman: Postman,
    ) -> Option<u64> {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!("remote search needs a tokio runtime");
            return None;
        };

        let latest = self.latest.clone();
        let debounce = self.debounce;
        let endpoint = endpoint.to_string();
        let query = query.to_string();
        handle.spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != seq {
                tracing::trace!(seq, "search superseded during debounce");
                return;
            }
            if !postman.post(SearchMessage::Started {
                seq,
                query: query.clone(),
            }) {
                return;
            }
            tracing::debug!(seq, %endpoint, %query, "searching");
            let result = client.search(&endpoint, &query).await;
            postman.post(SearchMessage::Finished { seq, query, result });
        });
        Some(seq)
    }
}
