//! Template cache - coalescing retrieval of markup and style text
//!
//! Every component instance of a given kind asks for the same two files.
//! The cache makes sure each URL is retrieved at most once per process:
//!
//! ```text
//! fetch(url)
//!    │
//!    ├─ Ready(text)     → return text
//!    ├─ InFlight(fut)   → await the shared future
//!    └─ absent          → start retrieval, store InFlight, await it
//!                            │
//!                            ├─ Ok  → entry becomes Ready
//!                            └─ Err → entry removed (next call retries)
//! ```
//!
//! Entries are never evicted. Failures are shared with every concurrent
//! waiter but never stored.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Errors from template retrieval
///
/// Cloneable because one failure is handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("template request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("no template registered for {0}")]
    NotFound(String),
}

type Retrieval = Shared<BoxFuture<'static, Result<Arc<str>, TemplateError>>>;

/// Where template text comes from
pub trait TemplateSource: Send + Sync + 'static {
    fn retrieve(&self, url: &str) -> BoxFuture<'static, Result<Arc<str>, TemplateError>>;
}

enum Entry {
    Ready(Arc<str>),
    InFlight(Retrieval),
}

/// Process-wide URL → text cache
#[derive(Clone)]
pub struct TemplateCache {
    source: Arc<dyn TemplateSource>,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl TemplateCache {
    pub fn new(source: impl TemplateSource) -> Self {
        Self {
            source: Arc::new(source),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries stay consistent even if a holder panicked mid-insert
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the text for `url`, retrieving it at most once
    pub async fn fetch(&self, url: &str) -> Result<Arc<str>, TemplateError> {
        let retrieval = {
            let mut entries = self.lock();
            match entries.get(url) {
                Some(Entry::Ready(text)) => return Ok(text.clone()),
                Some(Entry::InFlight(pending)) => pending.clone(),
                None => {
                    tracing::debug!(url, "template cache miss");
                    let pending = self.source.retrieve(url).shared();
                    entries.insert(url.to_string(), Entry::InFlight(pending.clone()));
                    pending
                }
            }
        };

        let result = retrieval.clone().await;

        let mut entries = self.lock();
        let ours = matches!(
            entries.get(url),
            Some(Entry::InFlight(pending)) if Shared::ptr_eq(pending, &retrieval)
        );
        if ours {
            match &result {
                Ok(text) => {
                    entries.insert(url.to_string(), Entry::Ready(text.clone()));
                }
                Err(e) => {
                    tracing::warn!(url, error = %e, "template retrieval failed");
                    entries.remove(url);
                }
            }
        }
        result
    }

    /// Whether `url` has completed successfully
    pub fn is_cached(&self, url: &str) -> bool {
        matches!(self.lock().get(url), Some(Entry::Ready(_)))
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("entries", &self.lock().len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sources
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieves templates over HTTP, resolving paths against a base origin
pub struct HttpTemplateSource {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpTemplateSource {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let base = reqwest::Url::parse(base).with_context(|| format!("Invalid origin: {base}"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, base })
    }
}

impl TemplateSource for HttpTemplateSource {
    fn retrieve(&self, url: &str) -> BoxFuture<'static, Result<Arc<str>, TemplateError>> {
        let client = self.client.clone();
        let resolved = self.base.join(url);
        let url = url.to_string();

        async move {
            let transport = |e: &dyn std::fmt::Display| TemplateError::Transport {
                url: url.clone(),
                message: e.to_string(),
            };
            let resolved = resolved.map_err(|e| transport(&e))?;
            let response = client
                .get(resolved)
                .send()
                .await
                .map_err(|e| transport(&e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(TemplateError::Status {
                    url: url.clone(),
                    status: status.as_u16(),
                });
            }
            let text = response.text().await.map_err(|e| transport(&e))?;
            Ok(Arc::from(text))
        }
        .boxed()
    }
}

/// Templates held in memory, keyed by path
#[derive(Debug, Default, Clone)]
pub struct StaticTemplates {
    files: HashMap<String, Arc<str>>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, text: &str) -> Self {
        self.files.insert(url.to_string(), Arc::from(text));
        self
    }
}

impl TemplateSource for StaticTemplates {
    fn retrieve(&self, url: &str) -> BoxFuture<'static, Result<Arc<str>, TemplateError>> {
        let result = self
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(url.to_string()));
        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts retrievals and resolves after a short delay so callers overlap
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl TemplateSource for CountingSource {
        fn retrieve(&self, url: &str) -> BoxFuture<'static, Result<Arc<str>, TemplateError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_first && call == 0;
            let url = url.to_string();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if fail {
                    Err(TemplateError::Status { url, status: 500 })
                } else {
                    Ok(Arc::from(format!("<p>{url}</p>")))
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_fetches_share_one_retrieval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TemplateCache::new(CountingSource {
            calls: calls.clone(),
            fail_first: false,
        });

        let (a, b, c) = tokio::join!(
            cache.fetch("/m.html"),
            cache.fetch("/m.html"),
            cache.fetch("/m.html")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(&*a.unwrap(), "<p>/m.html</p>");
        assert_eq!(b.unwrap(), c.unwrap());

        // Completed entries answer without touching the source
        cache.fetch("/m.html").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached("/m.html"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_but_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TemplateCache::new(CountingSource {
            calls: calls.clone(),
            fail_first: true,
        });

        let (a, b) = tokio::join!(cache.fetch("/x.css"), cache.fetch("/x.css"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(a, Err(TemplateError::Status { status: 500, .. })));
        assert_eq!(a, b);
        assert!(!cache.is_cached("/x.css"));

        let retry = cache.fetch("/x.css").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(retry.is_ok());
    }

    #[tokio::test]
    async fn test_static_templates_report_missing_paths() {
        let cache = TemplateCache::new(StaticTemplates::new().with("/a", "A"));
        assert_eq!(&*cache.fetch("/a").await.unwrap(), "A");
        assert_eq!(
            cache.fetch("/b").await,
            Err(TemplateError::NotFound("/b".into()))
        );
    }
}
