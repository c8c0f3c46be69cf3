use std::path::Path;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use triplog_core::db::{SqliteTripStore, TripFilter, TripStore};
use triplog_core::{Trip, TripStatus};

use crate::commands::common::{current_owner, open_database};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TripListItem {
    guid: String,
    start_time: i64,
    end_time: i64,
    distance_meters: f64,
    duration_ms: i64,
    score: f64,
    status: &'static str,
    synced: bool,
}

pub fn run_trips(all: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let owner = current_owner(&db)?;
    let store = SqliteTripStore::new(db.connection());

    let filter = if all { TripFilter::All } else { TripFilter::History };
    let trips = store.load_trips(owner.as_deref(), filter)?;

    if as_json {
        let items = trips.iter().map(trip_to_item).collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if trips.is_empty() {
        println!("No trips recorded.");
    } else {
        for line in format_trip_lines(&trips) {
            println!("{line}");
        }
    }
    Ok(())
}

const fn status_label(status: TripStatus) -> &'static str {
    match status {
        TripStatus::Live => "live",
        TripStatus::Finalized => "finalized",
        TripStatus::Deleted => "deleted",
    }
}

fn trip_to_item(trip: &Trip) -> TripListItem {
    TripListItem {
        guid: trip.guid.to_string(),
        start_time: trip.start_time,
        end_time: trip.end_time,
        distance_meters: trip.distance,
        duration_ms: trip.duration_ms(),
        score: trip.score,
        status: status_label(trip.status),
        synced: trip.synced,
    }
}

fn format_trip_lines(trips: &[Trip]) -> Vec<String> {
    trips
        .iter()
        .map(|trip| {
            let guid = trip.guid.to_string();
            let short_guid = guid.chars().take(8).collect::<String>();
            let started = format_timestamp(trip.start_time);
            let km = trip.distance / 1000.0;
            let minutes = trip.duration_ms() / 60_000;
            let synced = if trip.synced { "synced" } else { "pending" };
            format!(
                "{short_guid:<8}  {started}  {km:>7.2} km  {minutes:>4} min  {:<9}  {synced}",
                status_label(trip.status)
            )
        })
        .collect()
}

fn format_timestamp(unix_ms: i64) -> String {
    Utc.timestamp_millis_opt(unix_ms)
        .single()
        .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use triplog_core::TripGuid;

    fn trip(distance: f64, status: TripStatus, synced: bool) -> Trip {
        Trip {
            id: 1,
            guid: TripGuid::new(),
            start_time: 1_700_000_000_000,
            end_time: 1_700_000_600_000,
            distance,
            score: 9.1,
            tilt: 0.0,
            status,
            synced,
            owner: String::new(),
        }
    }

    #[test]
    fn test_format_trip_lines() {
        let lines = format_trip_lines(&[trip(2_224.0, TripStatus::Finalized, false)]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("2.22 km"));
        assert!(lines[0].contains("10 min"));
        assert!(lines[0].contains("finalized"));
        assert!(lines[0].contains("pending"));
    }

    #[test]
    fn test_trip_to_item_labels_status() {
        let item = trip_to_item(&trip(100.0, TripStatus::Deleted, true));
        assert_eq!(item.status, "deleted");
        assert!(item.synced);
        assert_eq!(item.duration_ms, 600_000);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
    }
}
