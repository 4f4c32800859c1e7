//! The sync orchestrator: fetch, archive, link, write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use brewpick_catalog::{archive_filename, CatalogStore, ImageArchiver, WriteOutcome};
use brewpick_core::{AppConfig, CatalogEntry, Product};
use brewpick_youzan::{build_http_client, LinkResolver, TokenProvider, TokenStats, YouzanClient};
use chrono::Utc;
use tokio::sync::broadcast;

use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::retry::retry_with_backoff;
use crate::status::{SyncOutcome, SyncStatus};

/// Recorded as `last_error` when the listing came back empty.
pub const EMPTY_UPSTREAM_ERROR: &str = "upstream returned empty products";

/// Reported to callers when an empty listing is not written.
pub const EMPTY_UPSTREAM_REASON: &str = "upstream returned empty products, skip write";

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Clears the in-progress flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Coordinates catalog syncs and tracks their status.
///
/// At most one run is active at a time; a trigger that arrives while a run is
/// active returns [`SyncOutcome::AlreadyRunning`] immediately.
pub struct SyncService {
    tokens: Arc<TokenProvider>,
    youzan: YouzanClient,
    links: Option<LinkResolver>,
    archiver: ImageArchiver,
    store: CatalogStore,
    backoff_base_ms: u64,
    running: AtomicBool,
    status: Mutex<SyncStatus>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncService {
    /// `links: None` disables deep-link resolution.
    #[must_use]
    pub fn new(
        tokens: Arc<TokenProvider>,
        youzan: YouzanClient,
        links: Option<LinkResolver>,
        archiver: ImageArchiver,
        store: CatalogStore,
        backoff_base_ms: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tokens,
            youzan,
            links,
            archiver,
            store,
            backoff_base_ms,
            running: AtomicBool::new(false),
            status: Mutex::new(SyncStatus::default()),
            events,
        }
    }

    /// Wires every component from application config.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if an HTTP client cannot be built or the
    /// listing endpoint or payload template is invalid.
    pub fn from_config(config: &AppConfig) -> Result<Self, SyncError> {
        let http = build_http_client(config.http_timeout_secs, &config.user_agent)?;
        let tokens = Arc::new(TokenProvider::new(http.clone(), &config.youzan));
        let youzan = YouzanClient::new(http.clone(), Arc::clone(&tokens), &config.youzan)?;
        let links = config.sync.resolve_links.then(|| {
            LinkResolver::new(http, Arc::clone(&tokens), config.youzan.links.clone())
        });
        let archiver = ImageArchiver::new(
            &config.images_dir,
            config.http_timeout_secs,
            &config.user_agent,
        )?;
        let store = CatalogStore::new(&config.catalog_path);
        Ok(Self::new(
            tokens,
            youzan,
            links,
            archiver,
            store,
            config.sync.backoff_base_ms,
        ))
    }

    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Whether a listing endpoint is configured at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.youzan.is_configured()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Current status with the live in-progress flag.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        let mut status = self.lock_status().clone();
        status.in_progress = self.running.load(Ordering::Acquire);
        status
    }

    pub async fn token_stats(&self) -> TokenStats {
        self.tokens.stats().await
    }

    /// Runs one sync, retrying the fetch up to `max_retries` times.
    ///
    /// Failures are also recorded in [`SyncStatus::last_error`] and broadcast
    /// as [`SyncEvent::Error`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the fetch fails after retries or the catalog
    /// cannot be written.
    pub async fn run(&self, max_retries: u32) -> Result<SyncOutcome, SyncError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("sync already in progress; trigger dropped");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        {
            let mut status = self.lock_status();
            status.last_run_at = Some(Utc::now());
            status.last_error = None;
        }
        tracing::info!(max_retries, "sync run started");

        match self.run_pipeline(max_retries).await {
            Ok(SyncOutcome::Written { count }) => {
                {
                    let mut status = self.lock_status();
                    status.last_count = count;
                    status.last_success_at = Some(Utc::now());
                }
                self.publish(SyncEvent::Complete {
                    count,
                    at: Utc::now(),
                });
                tracing::info!(count, "sync run complete");
                Ok(SyncOutcome::Written { count })
            }
            Ok(SyncOutcome::Skipped { reason }) => {
                tracing::warn!(reason = %reason, "sync run skipped");
                Ok(SyncOutcome::Skipped { reason })
            }
            Ok(SyncOutcome::AlreadyRunning) => Ok(SyncOutcome::AlreadyRunning),
            Err(e) => {
                tracing::error!(error = %e, "sync run failed");
                self.record_failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, max_retries: u32) -> Result<SyncOutcome, SyncError> {
        let products = retry_with_backoff(max_retries, self.backoff_base_ms, || async {
            self.youzan.fetch_all().await.map_err(SyncError::from)
        })
        .await?;

        if products.is_empty() {
            self.record_failure(EMPTY_UPSTREAM_ERROR.to_string());
            return Ok(SyncOutcome::Skipped {
                reason: EMPTY_UPSTREAM_REASON.to_string(),
            });
        }

        let fetched = products.len();
        let mut entries = Vec::with_capacity(fetched);
        for product in products {
            if let Some(entry) = self.build_entry(product).await {
                entries.push(entry);
            }
        }
        tracing::info!(fetched, kept = entries.len(), "catalog entries assembled");

        match self.store.write(entries).await? {
            WriteOutcome::Written { count } => Ok(SyncOutcome::Written { count }),
            WriteOutcome::Skipped { reason } => {
                self.record_failure(reason.clone());
                Ok(SyncOutcome::Skipped { reason })
            }
        }
    }

    /// Archives the image and resolves the link for one product. Products
    /// without an image URL are dropped.
    async fn build_entry(&self, product: Product) -> Option<CatalogEntry> {
        let image_url = product.usable_image_url()?.to_string();
        let filename = archive_filename(&product.title, product.id.as_ref(), &image_url);

        let archived = match self.archiver.archive(&image_url, &filename).await {
            Ok(_) => Some(filename),
            Err(e) => {
                tracing::warn!(
                    id = ?product.id,
                    url = %image_url,
                    error = %e,
                    "image archive failed; keeping entry without filename"
                );
                None
            }
        };

        let mini_program_url = match (&self.links, product.alias.as_deref()) {
            (Some(links), Some(alias)) => links.resolve_link(alias, &product.title).await,
            _ => String::new(),
        };

        CatalogEntry::from_product(product, archived, mini_program_url)
    }

    fn record_failure(&self, message: String) {
        self.lock_status().last_error = Some(message.clone());
        self.publish(SyncEvent::Error {
            error: message,
            at: Utc::now(),
        });
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn lock_status(&self) -> MutexGuard<'_, SyncStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
