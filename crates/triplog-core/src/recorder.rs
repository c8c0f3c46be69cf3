//! Live trip recording pipeline.
//!
//! Traces flow through a bounded channel into a single consumer task that
//! folds each one into the running accumulator and appends it durably, in
//! arrival order. Closing the channel ends the trip: it is validated against
//! the configured minimums and finalized or deleted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::accumulator::TripAccumulator;
use crate::config::EngineConfig;
use crate::db::{Database, SqliteTripStore, TripStore};
use crate::error::{Error, Result};
use crate::models::{TracePayload, TripGuid, TripStatus};

/// What recording ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub guid: TripGuid,
    /// Finalized when the trip met the minimums, Deleted otherwise
    pub status: TripStatus,
    pub distance_meters: f64,
    pub duration_ms: i64,
    pub traces: usize,
}

/// Timestamps the consumer publishes so callers can poll for inactivity
/// without touching the accumulator.
struct ActivityClock {
    last_fix_ms: AtomicI64,
    last_moving_ms: AtomicI64,
}

/// Handle to an in-progress recording.
///
/// One recorder exists per live trip; the sensor side submits traces and the
/// owning service decides when to stop (typically when [`Self::is_inactive`]
/// reports true for long enough).
pub struct TripRecorder {
    guid: TripGuid,
    sender: mpsc::Sender<TracePayload>,
    activity: Arc<ActivityClock>,
    inactive_threshold_ms: i64,
    consumer: JoinHandle<Result<RecordingSummary>>,
}

impl TripRecorder {
    /// Create the Live trip row and start the consumer task.
    pub async fn start(
        db: Arc<tokio::sync::Mutex<Database>>,
        config: &EngineConfig,
        owner: Option<String>,
    ) -> Result<Self> {
        let guid = TripGuid::new();
        let start_time = chrono::Utc::now().timestamp_millis();

        {
            let db = db.lock().await;
            let store = SqliteTripStore::new(db.connection());
            store.create_trip(&guid, start_time, owner.as_deref())?;
        }
        tracing::info!(%guid, "trip recording started");

        let activity = Arc::new(ActivityClock {
            last_fix_ms: AtomicI64::new(start_time),
            last_moving_ms: AtomicI64::new(start_time),
        });
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let consumer = tokio::spawn(consume(
            db,
            config.clone(),
            guid,
            start_time,
            receiver,
            Arc::clone(&activity),
        ));

        Ok(Self {
            guid,
            sender,
            activity,
            inactive_threshold_ms: config.inactive_threshold_ms,
            consumer,
        })
    }

    #[must_use]
    pub const fn guid(&self) -> TripGuid {
        self.guid
    }

    /// A clone of the trace inlet, for the producer side.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<TracePayload> {
        self.sender.clone()
    }

    /// Submit one trace, waiting for channel capacity if the writer is
    /// behind.
    pub async fn submit(&self, payload: TracePayload) -> Result<()> {
        self.sender
            .send(payload)
            .await
            .map_err(|_| Error::InvalidInput("recording already stopped".into()))
    }

    /// Inactivity signal: no fix, or no moving fix, within the configured
    /// threshold. The decision to stop stays with the caller.
    #[must_use]
    pub fn is_inactive(&self, now_ms: i64) -> bool {
        let last_fix = self.activity.last_fix_ms.load(Ordering::SeqCst);
        let last_moving = self.activity.last_moving_ms.load(Ordering::SeqCst);
        now_ms - last_moving > self.inactive_threshold_ms
            || now_ms - last_fix > self.inactive_threshold_ms
    }

    /// Stop recording: close the channel, wait for the consumer to validate
    /// and finalize the trip.
    pub async fn stop(self) -> Result<RecordingSummary> {
        drop(self.sender);
        self.consumer
            .await
            .map_err(|error| Error::InvalidInput(format!("recorder task panicked: {error}")))?
    }
}

async fn consume(
    db: Arc<tokio::sync::Mutex<Database>>,
    config: EngineConfig,
    guid: TripGuid,
    start_time: i64,
    mut receiver: mpsc::Receiver<TracePayload>,
    activity: Arc<ActivityClock>,
) -> Result<RecordingSummary> {
    let mut accumulator = TripAccumulator::new(guid, start_time);
    let mut traces = 0usize;

    while let Some(payload) = receiver.recv().await {
        accumulator.on_trace(&payload);

        if let TracePayload::Gps(fix) = &payload {
            activity.last_fix_ms.store(fix.time, Ordering::SeqCst);
            if fix.speed != 0.0 {
                activity.last_moving_ms.store(fix.time, Ordering::SeqCst);
            }
        }

        let db = db.lock().await;
        let store = SqliteTripStore::new(db.connection());
        store.append_trace(&guid, &payload, false)?;
        traces += 1;
    }

    let status = accumulator.finalize(config.min_trip_distance_m, config.min_trip_duration_ms);
    let summary = RecordingSummary {
        guid,
        status,
        distance_meters: accumulator.distance_meters(),
        duration_ms: accumulator.duration_ms(),
        traces,
    };

    let db = db.lock().await;
    let store = SqliteTripStore::new(db.connection());
    // persist the final metadata, then take the one-way transition
    store.update_trip(&accumulator.to_trip())?;
    match status {
        TripStatus::Deleted => store.delete_trip(&guid)?,
        status => store.finalize_trip(&guid, status)?,
    }
    tracing::info!(
        %guid,
        ?status,
        distance = summary.distance_meters,
        traces = summary.traces,
        "trip recording stopped"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TripFilter;
    use crate::models::GpsFix;
    use tokio::sync::Mutex;

    fn test_config() -> EngineConfig {
        EngineConfig {
            min_trip_distance_m: 500.0,
            min_trip_duration_ms: 60_000,
            inactive_threshold_ms: 5_000,
            channel_capacity: 16,
            ..EngineConfig::default()
        }
    }

    fn gps(time: i64, lat: f64, speed: f64) -> TracePayload {
        TracePayload::Gps(GpsFix {
            time,
            lat,
            lng: -89.40,
            speed,
        })
    }

    fn setup_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_records_and_finalizes_long_trip() {
        let db = setup_db();
        let t0 = chrono::Utc::now().timestamp_millis();
        let recorder = TripRecorder::start(Arc::clone(&db), &test_config(), None)
            .await
            .unwrap();
        let guid = recorder.guid();

        recorder.submit(gps(t0, 43.07, 15.0)).await.unwrap();
        recorder.submit(gps(t0 + 60_000, 43.08, 15.0)).await.unwrap();
        recorder.submit(gps(t0 + 120_000, 43.09, 15.0)).await.unwrap();

        let summary = recorder.stop().await.unwrap();
        assert_eq!(summary.status, TripStatus::Finalized);
        assert_eq!(summary.traces, 3);
        assert!(summary.distance_meters > 2_000.0);

        let db = db.lock().await;
        let store = SqliteTripStore::new(db.connection());
        let trip = store.get_trip(&guid).unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Finalized);
        assert!((trip.distance - summary.distance_meters).abs() < 1e-9);
        assert!(!trip.synced);
        assert_eq!(store.gps_points(&guid).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_short_trip_is_deleted_and_hidden_from_history() {
        let db = setup_db();
        let recorder = TripRecorder::start(Arc::clone(&db), &test_config(), None)
            .await
            .unwrap();
        let guid = recorder.guid();

        // a few meters over a few seconds
        let t0 = chrono::Utc::now().timestamp_millis();
        recorder.submit(gps(t0, 43.0700, 2.0)).await.unwrap();
        recorder.submit(gps(t0 + 3_000, 43.0701, 2.0)).await.unwrap();

        let summary = recorder.stop().await.unwrap();
        assert_eq!(summary.status, TripStatus::Deleted);

        let db = db.lock().await;
        let store = SqliteTripStore::new(db.connection());
        let trip = store.get_trip(&guid).unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Deleted);
        // the row survives for sync history but leaves the default view
        assert!(store.load_trips(None, TripFilter::History).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inactivity_signal() {
        let db = setup_db();
        let recorder = TripRecorder::start(Arc::clone(&db), &test_config(), None)
            .await
            .unwrap();

        let t0 = chrono::Utc::now().timestamp_millis();
        recorder.submit(gps(t0 + 1_000, 43.07, 10.0)).await.unwrap();
        // give the consumer a beat to fold the trace
        tokio::task::yield_now().await;

        assert!(!recorder.is_inactive(t0 + 2_000));
        assert!(recorder.is_inactive(t0 + 10_000));

        recorder.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_stop_fails() {
        let db = setup_db();
        let recorder = TripRecorder::start(Arc::clone(&db), &test_config(), None)
            .await
            .unwrap();
        let sender = recorder.sender();
        recorder.stop().await.unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        assert!(sender.send(gps(now, 43.07, 1.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_owner_is_recorded() {
        let db = setup_db();
        let recorder =
            TripRecorder::start(Arc::clone(&db), &test_config(), Some("me@x.y".to_string()))
                .await
                .unwrap();
        let guid = recorder.guid();
        recorder.stop().await.unwrap();

        let db = db.lock().await;
        let store = SqliteTripStore::new(db.connection());
        assert_eq!(store.get_trip(&guid).unwrap().unwrap().owner, "me@x.y");
    }
}
