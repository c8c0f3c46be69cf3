use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use triplog_core::sync::{Connectivity, HttpUploadTransport, SyncOutcome, SyncScheduler};
use triplog_core::EngineConfig;

use crate::commands::common::open_database;
use crate::error::CliError;

/// Run one upload cycle against the configured server.
pub async fn run_sync(cellular: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let config = EngineConfig::from_env();

    let transport = HttpUploadTransport::new(config.server_url.clone(), config.request_timeout)?;
    let scheduler = SyncScheduler::new(Arc::new(Mutex::new(db)), transport, config);

    let connectivity = if cellular {
        Connectivity::Cellular
    } else {
        Connectivity::Wifi
    };

    // a manual invocation counts as a fresh connectivity signal
    let outcome = scheduler.on_connectivity_restored(connectivity).await?;
    println!("{}", describe_outcome(outcome));
    Ok(())
}

fn describe_outcome(outcome: SyncOutcome) -> String {
    match outcome {
        SyncOutcome::NoUser => "Not logged in; nothing uploaded".to_string(),
        SyncOutcome::NothingToSend => "Nothing to upload".to_string(),
        SyncOutcome::Drained { uploaded } => format!("Uploaded {uploaded} batch(es)"),
        SyncOutcome::FailedOut { uploaded } => format!(
            "Upload failing; gave up after {uploaded} batch(es). Run sync again once connectivity improves."
        ),
        SyncOutcome::AlreadyRunning => "Another sync is already running".to_string(),
        SyncOutcome::Paused => "Sync is paused after repeated failures".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::test_support::{cleanup_db_files, unique_test_db_path};

    #[test]
    fn test_describe_outcome() {
        assert_eq!(
            describe_outcome(SyncOutcome::Drained { uploaded: 3 }),
            "Uploaded 3 batch(es)"
        );
        assert_eq!(describe_outcome(SyncOutcome::NothingToSend), "Nothing to upload");
    }

    #[tokio::test]
    async fn test_sync_without_user_is_a_noop() {
        let db_path = unique_test_db_path();
        // no user row: the scheduler skips without touching the network
        run_sync(false, &db_path).await.unwrap();
        cleanup_db_files(&db_path);
    }
}
