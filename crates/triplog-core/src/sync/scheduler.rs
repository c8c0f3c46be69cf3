//! Single-flight background upload scheduling.
//!
//! The scheduler owns all retry state: an atomically tested in-flight flag
//! collapses concurrent triggers into one active session, and a consecutive
//! failure counter sends it dormant until a connectivity-regained signal
//! resets the context. There is no request-level retry or backoff below
//! this layer.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::db::{Database, SqliteTripStore, SqliteUserStore, TripStore, UserStore};
use crate::error::Result;
use crate::sync::upload::{TripPayload, UploadOutcome, UploadSession, UploadTransport};

/// Connectivity class reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Wifi,
    Cellular,
}

impl Connectivity {
    /// Under non-WiFi connectivity only vital traces are uploaded, to
    /// conserve data.
    #[must_use]
    pub const fn vital_only(self) -> bool {
        matches!(self, Self::Cellular)
    }
}

/// How a trigger call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another upload held the in-flight flag; nothing was started
    AlreadyRunning,
    /// No authenticated user; sync skipped silently
    NoUser,
    /// The failure threshold was reached earlier; dormant until a
    /// connectivity signal resets the counter
    Paused,
    /// No trip yielded an uploadable batch
    NothingToSend,
    /// Backlog drained; `uploaded` sessions succeeded
    Drained { uploaded: usize },
    /// Stopped mid-cycle after failures reached the threshold
    FailedOut { uploaded: usize },
}

/// Decides which unsynced data to send next and drives upload sessions.
pub struct SyncScheduler<T: UploadTransport> {
    db: Arc<Mutex<Database>>,
    transport: T,
    config: EngineConfig,
    uploading: AtomicBool,
    failures: AtomicU32,
}

impl<T: UploadTransport> SyncScheduler<T> {
    #[must_use]
    pub fn new(db: Arc<Mutex<Database>>, transport: T, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
            uploading: AtomicBool::new(false),
            failures: AtomicU32::new(0),
        }
    }

    /// Consecutive failures since the last successful session.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// True while an upload cycle is in flight.
    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    /// Entry point for the connectivity-regained signal: resets the failure
    /// context, then triggers a sync cycle.
    pub async fn on_connectivity_restored(&self, connectivity: Connectivity) -> Result<SyncOutcome> {
        self.failures.store(0, Ordering::SeqCst);
        self.trigger_background_sync(connectivity).await
    }

    /// Upload unsynced trips until the backlog drains or failures reach the
    /// threshold. At most one cycle runs per device; concurrent triggers
    /// collapse into the active one.
    pub async fn trigger_background_sync(&self, connectivity: Connectivity) -> Result<SyncOutcome> {
        if self
            .uploading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("upload already in flight, ignoring trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        }

        let outcome = self.run_cycle(connectivity).await;
        self.uploading.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_cycle(&self, connectivity: Connectivity) -> Result<SyncOutcome> {
        let user = {
            let db = self.db.lock().await;
            SqliteUserStore::new(db.connection()).current_user()?
        };
        let Some(user) = user else {
            tracing::debug!("no authenticated user, skipping sync");
            return Ok(SyncOutcome::NoUser);
        };

        if self.consecutive_failures() >= self.config.failure_threshold {
            tracing::debug!("failure threshold reached, staying dormant");
            return Ok(SyncOutcome::Paused);
        }

        let vital_only = connectivity.vital_only();
        let mut uploaded = 0usize;

        loop {
            let Some(payload) = self.next_payload(&user.email, vital_only).await? else {
                return Ok(if uploaded == 0 {
                    SyncOutcome::NothingToSend
                } else {
                    SyncOutcome::Drained { uploaded }
                });
            };

            let guid = payload.guid;
            let batch = payload.traces.len();
            let session = UploadSession::new(payload, user.clone());

            match session.execute(&self.transport).await {
                Ok(outcome) => {
                    self.failures.store(0, Ordering::SeqCst);
                    self.acknowledge(&outcome).await?;
                    uploaded += 1;
                    tracing::debug!(%guid, batch, "uploaded trace batch");
                    // loop again immediately to drain any remaining backlog
                }
                Err(error) => {
                    let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::warn!(%guid, failures, "trip upload failed: {error}");
                    if failures >= self.config.failure_threshold {
                        tracing::warn!(
                            "upload failure threshold reached, dormant until connectivity returns"
                        );
                        return Ok(SyncOutcome::FailedOut { uploaded });
                    }
                }
            }
        }
    }

    /// Pick the next batch: newest-first over trips with unsent traces,
    /// stopping at the first trip that yields a non-empty bounded batch.
    async fn next_payload(&self, owner: &str, vital_only: bool) -> Result<Option<TripPayload>> {
        let db = self.db.lock().await;
        let store = SqliteTripStore::new(db.connection());

        for trip in store.trips_with_unsent_traces(Some(owner), vital_only)? {
            let traces =
                store.unsent_traces(&trip.guid, self.config.batch_upload_count, vital_only)?;
            if !traces.is_empty() {
                return Ok(Some(TripPayload {
                    guid: trip.guid,
                    distance: trip.distance,
                    status: trip.status,
                    traces,
                }));
            }
        }
        Ok(None)
    }

    /// Record a successful session: flip the batch's trace flags and, once a
    /// non-live trip has nothing left to send, its metadata flag.
    async fn acknowledge(&self, outcome: &UploadOutcome) -> Result<()> {
        let db = self.db.lock().await;
        let store = SqliteTripStore::new(db.connection());

        store.mark_traces_synced(&outcome.trace_ids)?;
        if outcome.status.is_terminal() && store.unsent_traces(&outcome.guid, 1, false)?.is_empty()
        {
            store.mark_trip_synced(&outcome.guid)?;
        }
        Ok(())
    }
}
