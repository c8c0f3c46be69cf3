//! Running state of one live trip.
//!
//! Folds incoming traces into distance/duration/score without retaining the
//! trace history: only the newest GPS fix is kept, so memory stays O(1)
//! regardless of trip length.

use crate::geo::haversine_meters;
use crate::models::{GpsFix, TracePayload, Trip, TripGuid, TripStatus};

/// In-memory accumulator for exactly one live trip.
#[derive(Debug, Clone)]
pub struct TripAccumulator {
    guid: TripGuid,
    start_time: i64,
    end_time: i64,
    distance: f64,
    speed: f64,
    score: f64,
    tilt: f64,
    last_fix: Option<GpsFix>,
    last_fix_at: i64,
    last_moving_at: i64,
}

impl TripAccumulator {
    /// Start accumulating a trip that began at `start_time` (Unix ms).
    #[must_use]
    pub const fn new(guid: TripGuid, start_time: i64) -> Self {
        Self {
            guid,
            start_time,
            end_time: start_time,
            distance: 0.0,
            speed: 0.0,
            score: 10.0,
            tilt: 0.0,
            last_fix: None,
            last_fix_at: start_time,
            last_moving_at: start_time,
        }
    }

    /// Fold one trace into the running state.
    ///
    /// GPS fixes advance distance from the previously retained fix only;
    /// summary snapshots overwrite tilt/score verbatim; accelerometer
    /// samples advance the clock and nothing else.
    pub fn on_trace(&mut self, payload: &TracePayload) {
        match payload {
            TracePayload::Gps(fix) => {
                if let Some(previous) = self.last_fix {
                    self.distance += haversine_meters(&previous, fix);
                }
                self.last_fix = Some(*fix);
                self.speed = fix.speed;
                self.last_fix_at = fix.time;
                if fix.speed != 0.0 {
                    self.last_moving_at = fix.time;
                }
            }
            TracePayload::Summary(snapshot) => {
                self.tilt = snapshot.tilt;
                self.score = snapshot.score;
            }
            TracePayload::Accelerometer(_) => {}
        }
        self.end_time = self.end_time.max(payload.time());
    }

    /// True when the trip has gone quiet: no fix at all, or no moving fix,
    /// within the threshold. A signal only; stopping is the caller's call.
    #[must_use]
    pub const fn is_inactive(&self, now: i64, threshold_ms: i64) -> bool {
        now - self.last_moving_at > threshold_ms || now - self.last_fix_at > threshold_ms
    }

    /// The terminal status this trip should take: kept only when both the
    /// distance and duration minimums are met.
    #[must_use]
    pub fn finalize(&self, min_distance_m: f64, min_duration_ms: i64) -> TripStatus {
        if self.distance >= min_distance_m && self.duration_ms() >= min_duration_ms {
            TripStatus::Finalized
        } else {
            TripStatus::Deleted
        }
    }

    /// Snapshot of the running state as trip metadata (status stays Live).
    #[must_use]
    pub fn to_trip(&self) -> Trip {
        Trip {
            id: 0,
            guid: self.guid,
            start_time: self.start_time,
            end_time: self.end_time,
            distance: self.distance,
            score: self.score,
            tilt: self.tilt,
            status: TripStatus::Live,
            synced: false,
            owner: String::new(),
        }
    }

    #[must_use]
    pub const fn guid(&self) -> TripGuid {
        self.guid
    }

    #[must_use]
    pub const fn distance_meters(&self) -> f64 {
        self.distance
    }

    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    #[must_use]
    pub const fn end_time(&self) -> i64 {
        self.end_time
    }

    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SummarySnapshot;

    fn gps(time: i64, lat: f64, lng: f64, speed: f64) -> TracePayload {
        TracePayload::Gps(GpsFix {
            time,
            lat,
            lng,
            speed,
        })
    }

    fn accumulator() -> TripAccumulator {
        TripAccumulator::new(TripGuid::new(), 0)
    }

    #[test]
    fn test_three_fix_scenario() {
        // 0.01 degree latitude steps near Madison: two deltas of ~1.11 km
        let mut acc = accumulator();
        acc.on_trace(&gps(0, 43.07, -89.40, 15.0));
        acc.on_trace(&gps(60_000, 43.08, -89.40, 15.0));
        acc.on_trace(&gps(120_000, 43.09, -89.40, 15.0));

        let expected = 2_224.0;
        let distance = acc.distance_meters();
        assert!(
            (distance - expected).abs() / expected < 0.01,
            "got {distance}"
        );
        assert_eq!(acc.end_time(), 120_000);
        assert_eq!(acc.duration_ms(), 120_000);
    }

    #[test]
    fn test_distance_non_decreasing() {
        let mut acc = accumulator();
        let mut previous = 0.0;
        // out-and-back route: displacement shrinks, distance must not
        let route = [
            (43.07, -89.40),
            (43.08, -89.41),
            (43.09, -89.40),
            (43.08, -89.39),
            (43.07, -89.40),
        ];
        for (index, (lat, lng)) in route.into_iter().enumerate() {
            acc.on_trace(&gps(index as i64 * 1000, lat, lng, 10.0));
            assert!(acc.distance_meters() >= previous);
            previous = acc.distance_meters();
        }
        assert!(previous > 0.0);
    }

    #[test]
    fn test_degenerate_fixes_add_zero() {
        let mut acc = accumulator();
        acc.on_trace(&gps(0, 43.07, -89.40, 10.0));
        acc.on_trace(&gps(1000, 43.07, -89.40, 10.0));
        assert_eq!(acc.distance_meters(), 0.0);

        acc.on_trace(&gps(2000, f64::NAN, -89.40, 10.0));
        assert_eq!(acc.distance_meters(), 0.0);
    }

    #[test]
    fn test_summary_overwrites_tilt_and_score() {
        let mut acc = accumulator();
        acc.on_trace(&TracePayload::Summary(SummarySnapshot {
            time: 5000,
            tilt: 0.3,
            score: 7.5,
        }));

        let trip = acc.to_trip();
        assert_eq!(trip.tilt, 0.3);
        assert_eq!(trip.score, 7.5);
        assert_eq!(trip.end_time, 5000);
    }

    #[test]
    fn test_inactive_when_no_fixes_arrive() {
        let acc = accumulator();
        assert!(!acc.is_inactive(1000, 5000));
        assert!(acc.is_inactive(6000, 5000));
    }

    #[test]
    fn test_inactive_when_parked() {
        let mut acc = accumulator();
        acc.on_trace(&gps(1000, 43.07, -89.40, 10.0));
        // stationary fixes keep arriving but the speed stays zero
        acc.on_trace(&gps(4000, 43.07, -89.40, 0.0));
        acc.on_trace(&gps(7000, 43.07, -89.40, 0.0));

        assert!(!acc.is_inactive(5000, 5000));
        // last moving fix was at t=1000
        assert!(acc.is_inactive(7000, 5000));
    }

    #[test]
    fn test_finalize_verdicts() {
        let mut acc = accumulator();
        acc.on_trace(&gps(0, 43.07, -89.40, 15.0));
        acc.on_trace(&gps(120_000, 43.09, -89.40, 15.0));

        // ~2.2 km in 2 minutes
        assert_eq!(acc.finalize(500.0, 60_000), TripStatus::Finalized);
        assert_eq!(acc.finalize(5_000.0, 60_000), TripStatus::Deleted);
        assert_eq!(acc.finalize(500.0, 600_000), TripStatus::Deleted);
    }
}
