use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use triplog_core::db::{SqliteTripStore, TripStore};
use triplog_core::models::{TracePayload, TripStatus};
use triplog_core::recorder::TripRecorder;
use triplog_core::EngineConfig;

use crate::commands::common::{current_owner, open_database};
use crate::error::CliError;

/// Record one trip from a JSONL trace stream (one `TracePayload` per line).
pub async fn run_record(input: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;

    // recover trips left Live by an earlier abnormal termination
    SqliteTripStore::new(db.connection()).finalize_live_trips()?;

    let owner = current_owner(&db)?;
    let config = EngineConfig::from_env();
    let db = Arc::new(Mutex::new(db));
    let recorder = TripRecorder::start(Arc::clone(&db), &config, owner).await?;

    let content = read_trace_stream(input)?;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let payload: TracePayload =
            serde_json::from_str(line).map_err(|error| CliError::InvalidTrace {
                line: index + 1,
                message: error.to_string(),
            })?;
        recorder.submit(payload).await?;
    }

    let summary = recorder.stop().await?;
    if summary.status == TripStatus::Finalized {
        println!(
            "{} finalized: {:.0} m in {} s over {} traces",
            summary.guid,
            summary.distance_meters,
            summary.duration_ms / 1000,
            summary.traces
        );
    } else {
        println!(
            "{} too short, deleted ({:.0} m in {} s)",
            summary.guid,
            summary.distance_meters,
            summary.duration_ms / 1000
        );
    }
    Ok(())
}

fn read_trace_stream(input: Option<&Path>) -> Result<String, CliError> {
    match input {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
