use std::env;
use std::path::{Path, PathBuf};

use triplog_core::db::{Database, SqliteUserStore, UserStore};

use crate::error::CliError;

/// Database location: `--db-path` flag, then `TRIPLOG_DB_PATH`, then the
/// platform data directory.
pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TRIPLOG_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("triplog")
        .join("triplog.db")
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

/// Email of the logged-in user, if any.
pub fn current_owner(db: &Database) -> Result<Option<String>, CliError> {
    let user = SqliteUserStore::new(db.connection()).current_user()?;
    Ok(user.map(|token| token.email))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("triplog-cli-test-{timestamp}-{sequence}.db"))
    }

    pub fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_takes_precedence() {
        let explicit = PathBuf::from("/tmp/explicit.db");
        assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn test_default_path_ends_with_db_file() {
        let path = default_db_path();
        assert!(path.ends_with(Path::new("triplog").join("triplog.db")));
    }
}
