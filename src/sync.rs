//! Live-sync engine: applies the bucket change feed to the published
//! aggregate through a staging buffer and a single serialized flush path.
//!
//! One task owns everything that mutates state: it consumes change events
//! into the staging buffer and, on a timer tick or an explicit refresh
//! request, drains the buffer into the shared aggregate under a single write
//! guard. Because the ticker and the refresh channel are just two arms of
//! the same `select!`, flushes can never overlap and need no extra locking.

use {
    crate::config::Config,
    crate::filter::{average_age, AverageAge, FilterError, UserFilter},
    crate::model::{merge, UserRecord, Users},
    crate::parser::parse_object,
    crate::snapshot,
    crate::store::{EventKind, ObjectEvent, ObjectStore},
    std::collections::HashMap,
    std::sync::Arc,
    std::time::Duration,
    tokio::sync::{mpsc, watch, RwLock},
    tokio::time::interval,
};

/// Pending per-key diffs accumulated between flushes. `None` marks an
/// explicit whole-entity delete.
type StagingBuffer = HashMap<String, Option<UserRecord>>;

/// Live-sync engine state. Constructed once, then consumed by [`SyncEngine::run`].
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    users: Arc<RwLock<Users>>,
    staging: StagingBuffer,
    data_bucket: String,
    result_bucket: String,
    snapshot_object: String,
    flush_interval: Duration,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, users: Arc<RwLock<Users>>, config: &Config) -> Self {
        Self {
            store,
            users,
            staging: StagingBuffer::new(),
            data_bucket: config.data_bucket.clone(),
            result_bucket: config.result_bucket.clone(),
            snapshot_object: config.snapshot_object.clone(),
            flush_interval: config.flush_interval,
        }
    }

    /// Event loop: consume the change feed, flush on ticker ticks and
    /// refresh requests, stop on shutdown or when the feed closes. A final
    /// flush runs on the way out so pending diffs are not lost.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ObjectEvent>,
        mut refresh_rx: mpsc::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        log::info!(
            "live-sync engine started (flush every {:?})",
            self.flush_interval
        );

        let mut ticker = interval(self.flush_interval);
        // The first tick completes immediately; consume it so the first
        // periodic flush waits a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.stage_event(event).await,
                        None => {
                            log::warn!("change feed closed, stopping live sync");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
                Some(()) = refresh_rx.recv() => {
                    log::info!("force refresh requested");
                    self.flush().await;
                }
                _ = shutdown_rx.changed() => {
                    log::info!("shutdown requested, stopping live sync");
                    break;
                }
            }
        }

        self.flush().await;
        log::info!("live-sync engine stopped");
    }

    /// Fold one change notification into the staging buffer.
    ///
    /// A key touched for the first time is seeded from the published record,
    /// so a later flush applies a field-level update instead of discarding
    /// fields the event did not mention. Removing a picture object clears
    /// only the picture path; removing a demographic object marks the whole
    /// entity for deletion, overriding any pending partial edits.
    async fn stage_event(&mut self, event: ObjectEvent) {
        let key = event.object.stem.clone();

        if !self.staging.contains_key(&key) {
            let live = self.users.read().await.get(&key).cloned();
            self.staging
                .insert(key.clone(), Some(merge(None, live.as_ref())));
        }

        match event.kind {
            EventKind::Removed => {
                let Some(entry) = self.staging.get_mut(&key) else {
                    return;
                };
                if event.object.is_tabular() {
                    // Losing the demographic object is losing the entity.
                    log::debug!("staged delete for {}", key);
                    *entry = None;
                } else if let Some(record) = entry.as_mut() {
                    // Partial removal: the entity survives losing its picture.
                    log::debug!("staged picture removal for {}", key);
                    record.picture_path.clear();
                }
            }
            EventKind::Created => {
                let parsed = parse_object(
                    self.store.as_ref(),
                    &self.data_bucket,
                    &event.object,
                )
                .await;
                if parsed.is_none() {
                    log::debug!("event for {} contributed no record", event.object.key);
                }
                if let Some(entry) = self.staging.get_mut(&key) {
                    // Incoming first: the most recent event wins per field.
                    let merged = merge(parsed.as_ref(), entry.as_ref());
                    *entry = Some(merged);
                }
            }
        }
    }

    /// Apply every staged diff to the published aggregate under one write
    /// guard, then mirror the result to the snapshot object.
    ///
    /// `drain()` empties the buffer in place, so the next cycle only carries
    /// genuinely new changes and an immediate re-flush is a no-op on the
    /// aggregate. A failed snapshot export is logged and does not roll back
    /// the in-memory flush: the aggregate is the source of truth and the
    /// export is best-effort mirroring.
    async fn flush(&mut self) {
        let pending = self.staging.len();
        let exported = {
            let mut users = self.users.write().await;
            for (key, staged) in self.staging.drain() {
                match staged {
                    Some(record) => {
                        users.insert(key, record);
                    }
                    None => {
                        users.remove(&key);
                    }
                }
            }
            users.clone()
        };
        if pending > 0 {
            log::info!(
                "flushed {} staged entries, aggregate holds {} users",
                pending,
                exported.len()
            );
        }

        if let Err(e) = snapshot::export_snapshot(
            self.store.as_ref(),
            &self.result_bucket,
            &self.snapshot_object,
            &exported,
        )
        .await
        {
            log::warn!("snapshot export failed: {}", e);
        }
    }
}

/// Read-side handle consumed by an external request layer.
///
/// Queries only take the read lock, so they run concurrently with each
/// other and only wait out an in-progress flush application.
#[derive(Clone)]
pub struct QueryHandle {
    users: Arc<RwLock<Users>>,
    refresh_tx: mpsc::Sender<()>,
}

impl QueryHandle {
    pub fn new(users: Arc<RwLock<Users>>, refresh_tx: mpsc::Sender<()>) -> Self {
        Self { users, refresh_tx }
    }

    /// Current filtered view of the aggregate. A malformed parameter fails
    /// the whole query before the aggregate is touched.
    pub async fn filtered(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<Users, FilterError> {
        let filter = UserFilter::from_params(params)?;
        let users = self.users.read().await;
        Ok(filter.apply(&users))
    }

    /// Summary statistics over the current filtered view.
    pub async fn stats(
        &self,
        params: &HashMap<String, String>,
    ) -> Result<AverageAge, FilterError> {
        let subset = self.filtered(params).await?;
        Ok(average_age(&subset))
    }

    /// Request an out-of-cycle flush. Non-blocking: when a trigger is
    /// already pending it coalesces with this one instead of queueing.
    pub fn force_refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }
}

/// Capacity of the force-refresh channel. One pending trigger is enough;
/// additional requests while a flush is pending coalesce.
pub const REFRESH_CHANNEL_CAPACITY: usize = 1;
