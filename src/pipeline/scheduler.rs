// src/pipeline/scheduler.rs

//! Poll rotation over all registered queries.
//!
//! A single background task walks the job set in id order, one pass per job:
//! load the snapshot, sweep the search API, persist the snapshot. Control
//! calls (`register`, `stop`, `stop_all`, `status`) run concurrently from
//! other tasks and only touch the shared job map, so a stop takes effect by
//! the next sweep of that job at the latest. Store writes and deletes for one
//! id are serialized through a per-id lock.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{ChatRef, Config, GeoTable, Listing, Notification, ParsedQuery, SearchSpec};
use crate::pipeline::dedup::DedupCache;
use crate::services::notify::Notifier;
use crate::services::query::parse_query;
use crate::services::search::{ApiSource, MatchSink, NoopSink, SearchClient, SweepStats};
use crate::storage::{LocalStorage, SnapshotStore};
use crate::utils::http::{RateLimitedTransport, create_async_client};

/// Lifecycle of a registered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    /// Known to the scheduler, not yet picked up by a rotation
    Registered,
    /// Part of the active rotation
    Running,
    /// Removed from the rotation; terminal
    Stopped,
}

/// One registered (chat, query) pair.
#[derive(Debug, Clone)]
pub struct QueryJob {
    pub id: String,
    pub chat: ChatRef,
    pub spec: SearchSpec,
    pub state: JobState,
    /// Distinguishes successive registrations of the same id
    pub generation: u64,
}

/// Result of one job pass.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub id: String,
    pub priming: bool,
    pub stats: Option<SweepStats>,
    pub notified: usize,
    pub suppressed: usize,
    pub persisted: bool,
    pub error: Option<String>,
}

/// Totals for one rotation over all jobs.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub jobs: usize,
    pub notified: usize,
    pub failures: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    fn add(&mut self, outcome: &JobOutcome) {
        self.jobs += 1;
        self.notified += outcome.notified;
        if outcome.error.is_some() {
            self.failures += 1;
        }
    }
}

/// Sink that gates matches through the dedup cache and forwards them.
struct NotifySink<'a> {
    chat: &'a ChatRef,
    dedup: &'a DedupCache,
    notifier: &'a dyn Notifier,
    sent: usize,
    suppressed: usize,
}

#[async_trait]
impl MatchSink for NotifySink<'_> {
    async fn on_match(&mut self, listing: &Listing) -> Result<()> {
        let notification = Notification::new(self.chat.clone(), listing);
        let fingerprint = notification.fingerprint();
        if !self.dedup.should_notify(&fingerprint) {
            self.suppressed += 1;
            return Ok(());
        }
        if let Err(e) = self.notifier.notify(&notification).await {
            self.dedup.forget(&fingerprint);
            return Err(e);
        }
        self.sent += 1;
        Ok(())
    }
}

/// Owns the job set and drives the poll rotation.
pub struct Scheduler {
    jobs: DashMap<String, QueryJob>,
    store_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    store: Arc<dyn SnapshotStore>,
    client: SearchClient,
    dedup: DedupCache,
    notifier: Arc<dyn Notifier>,
    cycle_pause: Duration,
    next_generation: AtomicU64,
    last_cycle: Mutex<Option<Duration>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        client: SearchClient,
        notifier: Arc<dyn Notifier>,
        dedup: DedupCache,
        cycle_pause: Duration,
    ) -> Self {
        Self {
            jobs: DashMap::new(),
            store_locks: DashMap::new(),
            store,
            client,
            dedup,
            notifier,
            cycle_pause,
            next_generation: AtomicU64::new(1),
            last_cycle: Mutex::new(None),
        }
    }

    /// Wire the HTTP source, local storage and dedup cache from configuration.
    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        config.validate()?;

        let http = create_async_client(&config.api)?;
        let transport = Arc::new(RateLimitedTransport::new(
            http,
            config.transport.request_delay(),
        ));
        let source = ApiSource::new(transport, &config.api, GeoTable::new(&config.geo))?;
        let client = SearchClient::new(Arc::new(source), &config.api.item_link_base);
        let store = Arc::new(LocalStorage::new(&config.storage.data_dir));
        let dedup = DedupCache::new(Duration::from_secs(config.dedup.ttl_secs));

        Ok(Self::new(
            store,
            client,
            notifier,
            dedup,
            config.scheduler.cycle_pause(),
        ))
    }

    // --- Control surface ---

    /// Register a query. Re-registering an active id is a no-op returning the same id.
    pub async fn register(&self, raw: &str, default_chat: &str) -> Result<String> {
        let parsed = parse_query(raw, default_chat)?;
        if parsed.is_wildcard() {
            return Err(AppError::validation("'*' can only be used to stop searches"));
        }
        if parsed.spec.is_filter_only() {
            return Err(AppError::validation(format!(
                "query '{}' has no keywords",
                parsed.query
            )));
        }

        let id = parsed.id.clone();
        if !self.insert(parsed) {
            log::debug!("Already searching {}", id);
            return Ok(id);
        }

        let lock = self.store_lock(&id);
        let _guard = lock.lock().await;
        if !self.jobs.contains_key(&id) {
            return Ok(id);
        }
        if let Err(e) = self.store.mark(&id).await {
            log::warn!("Couldn't persist registration of {}: {}", id, e);
        }
        log::info!("Registered {}", id);
        Ok(id)
    }

    /// Register one query per non-empty line.
    pub async fn register_batch(&self, lines: &str, default_chat: &str) -> Vec<Result<String>> {
        let mut results = Vec::new();
        for line in lines.lines().map(str::trim).filter(|l| !l.is_empty()) {
            results.push(self.register(line, default_chat).await);
        }
        results
    }

    /// Stop one query, or every query when the query part is `*`.
    pub async fn stop(&self, raw: &str, default_chat: &str) -> Result<Vec<String>> {
        let parsed = parse_query(raw, default_chat)?;
        if parsed.is_wildcard() {
            return self.stop_all().await;
        }
        match self.stop_job(&parsed.id).await? {
            true => Ok(vec![parsed.id]),
            false => Ok(Vec::new()),
        }
    }

    /// Stop a job by id and delete its snapshot. Returns whether it was active.
    pub async fn stop_job(&self, id: &str) -> Result<bool> {
        let Some((_, mut job)) = self.jobs.remove(id) else {
            return Ok(false);
        };
        job.state = JobState::Stopped;
        log::info!("Stopping {}", job.id);

        let lock = self.store_lock(id);
        let _guard = lock.lock().await;
        self.store.delete(id).await?;
        Ok(true)
    }

    /// Stop every job and delete every stored snapshot.
    pub async fn stop_all(&self) -> Result<Vec<String>> {
        log::info!("Stopping all searches");

        let mut ids = self.status();
        match self.store.list_keys().await {
            Ok(keys) => ids.extend(keys),
            Err(e) => log::warn!("Couldn't list stored searches: {}", e),
        }
        ids.sort();
        ids.dedup();

        let mut stopped = Vec::new();
        let mut first_error = None;
        for id in ids {
            if let Some((_, mut job)) = self.jobs.remove(&id) {
                job.state = JobState::Stopped;
            }
            let lock = self.store_lock(&id);
            let _guard = lock.lock().await;
            match self.store.delete(&id).await {
                Ok(()) => stopped.push(id),
                Err(e) => {
                    log::error!("Couldn't delete snapshot for {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stopped),
        }
    }

    /// Active job ids, sorted.
    pub fn status(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Active job ids as newline-separated text accepted by `register_batch`.
    pub fn export(&self) -> String {
        self.status().join("\n")
    }

    pub fn job(&self, id: &str) -> Option<QueryJob> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// Duration of the last completed rotation.
    pub fn last_cycle_elapsed(&self) -> Option<Duration> {
        self.last_cycle.lock().ok().and_then(|elapsed| *elapsed)
    }

    /// Reload jobs registered before the last shutdown.
    pub async fn rehydrate(&self) -> Result<usize> {
        let mut loaded = 0;
        for key in self.store.list_keys().await? {
            let parsed = match parse_query(&key, "") {
                Ok(parsed) if !parsed.spec.is_filter_only() => parsed,
                Ok(_) => {
                    log::warn!("Skipping stored search without keywords: {}", key);
                    continue;
                }
                Err(e) => {
                    log::warn!("Couldn't parse stored search {}: {}", key, e);
                    continue;
                }
            };
            if self.insert(parsed) {
                log::info!("Loaded from store: {}", key);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    /// Insert a new job unless the id is already active.
    fn insert(&self, parsed: ParsedQuery) -> bool {
        match self.jobs.entry(parsed.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(QueryJob {
                    chat: parsed.chat_ref(),
                    id: parsed.id,
                    spec: parsed.spec,
                    state: JobState::Registered,
                    generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                });
                true
            }
        }
    }

    fn store_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.store_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Whether `job` is still the active registration for its id.
    fn is_current(&self, job: &QueryJob) -> bool {
        self.jobs
            .get(&job.id)
            .is_some_and(|active| active.generation == job.generation)
    }

    // --- Rotation ---

    /// Run one pass for a single job.
    ///
    /// An empty snapshot triggers a silent priming sweep; otherwise matches go
    /// through the dedup cache to the notifier. The snapshot is persisted only
    /// while the job is still the same registration, and not after a failed
    /// delivery, so the next pass diffs against the last stored prices again.
    pub async fn run_job(&self, job: &QueryJob, cancel: &CancellationToken) -> JobOutcome {
        let mut outcome = JobOutcome {
            id: job.id.clone(),
            ..JobOutcome::default()
        };

        let mut snapshot = match self.store.get(&job.id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Couldn't load snapshot for {}: {}. Priming again.", job.id, e);
                Default::default()
            }
        };
        outcome.priming = snapshot.is_empty();

        let result = if outcome.priming {
            log::debug!("Priming {}", job.id);
            self.client
                .search(&job.spec, &mut snapshot, cancel, &mut NoopSink)
                .await
        } else {
            let mut sink = NotifySink {
                chat: &job.chat,
                dedup: &self.dedup,
                notifier: self.notifier.as_ref(),
                sent: 0,
                suppressed: 0,
            };
            let result = self
                .client
                .search(&job.spec, &mut snapshot, cancel, &mut sink)
                .await;
            outcome.notified = sink.sent;
            outcome.suppressed = sink.suppressed;
            result
        };

        let mut delivery_failed = false;
        let complete = match result {
            Ok(stats) => {
                log::debug!(
                    "Swept {}: {} pages, {} matched, {} notified",
                    job.id,
                    stats.pages,
                    stats.matched,
                    outcome.notified
                );
                let complete = !stats.cancelled;
                outcome.stats = Some(stats);
                complete
            }
            Err(e) => {
                log::error!("Search failed for {}: {}", job.id, e);
                delivery_failed = matches!(e, AppError::Notify(_));
                outcome.error = Some(e.to_string());
                false
            }
        };

        // A partial priming sweep would make unseen listings look new next time.
        if (outcome.priming && !complete) || delivery_failed || snapshot.is_empty() {
            return outcome;
        }

        // A stop takes the same lock before deleting, so it cannot interleave
        // between the generation check and the write.
        let lock = self.store_lock(&job.id);
        let _guard = lock.lock().await;
        if !self.is_current(job) {
            return outcome;
        }

        match self.store.put(&job.id, &snapshot).await {
            Ok(()) => outcome.persisted = true,
            Err(e) => {
                log::error!("Couldn't store snapshot for {}: {}", job.id, e);
                outcome.error.get_or_insert_with(|| e.to_string());
            }
        }
        outcome
    }

    /// Sweep every job once, in id order.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        for id in self.status() {
            if cancel.is_cancelled() {
                break;
            }

            // Jobs stopped since the id list was taken are skipped.
            let job = match self.jobs.get_mut(&id) {
                Some(mut job) => {
                    if job.state == JobState::Registered {
                        job.state = JobState::Running;
                    }
                    job.clone()
                }
                None => continue,
            };

            log::debug!("Searching {}", id);
            let outcome = self.run_job(&job, cancel).await;
            report.add(&outcome);
        }

        let purged = self.dedup.purge_expired();
        report.elapsed = start.elapsed();
        if let Ok(mut last) = self.last_cycle.lock() {
            *last = Some(report.elapsed);
        }

        crate::utils::log::summary(
            "Rotation complete",
            &[
                ("jobs", report.jobs.to_string()),
                ("notified", report.notified.to_string()),
                ("failures", report.failures.to_string()),
                ("dedup purged", purged.to_string()),
                ("elapsed", format!("{:.1?}", report.elapsed)),
            ],
        );
        report
    }

    /// Rotate until cancelled, pausing between cycles.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        log::info!("Search rotation started with {} jobs", self.jobs.len());
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.run_cycle(&cancel).await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cycle_pause) => {}
            }
        }
        log::info!("Search rotation finished");
    }

    /// Start the rotation on a background task.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> SchedulerHandle {
        let scheduler = Arc::clone(self);
        let task_cancel = cancel.clone();
        SchedulerHandle {
            cancel,
            task: tokio::spawn(scheduler.run(task_cancel)),
        }
    }
}

/// Handle to a running rotation task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the rotation and wait for the in-flight sweep to wind down.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await?;
        Ok(())
    }
}
