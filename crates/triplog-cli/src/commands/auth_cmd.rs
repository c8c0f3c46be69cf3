use std::io::Read;
use std::path::Path;

use triplog_core::auth::UserToken;
use triplog_core::db::{SqliteUserStore, UserStore};

use crate::commands::common::open_database;
use crate::error::CliError;

/// Store a server-issued JWT as the current user and adopt any trips
/// recorded before login.
pub fn run_login(token_arg: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let raw = resolve_token(token_arg)?;
    let token = UserToken::from_jwt(&raw)?;

    let db = open_database(db_path)?;
    let reassigned = SqliteUserStore::new(db.connection()).login(&token)?;

    println!("Logged in as {} ({reassigned} trips adopted)", token.email);
    Ok(())
}

pub fn run_logout(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    SqliteUserStore::new(db.connection()).logout()?;
    println!("Logged out");
    Ok(())
}

pub fn run_whoami(db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    match SqliteUserStore::new(db.connection()).current_user()? {
        Some(user) => println!("{}", user.email),
        None => println!("Not logged in"),
    }
    Ok(())
}

fn resolve_token(token_arg: Option<&str>) -> Result<String, CliError> {
    if let Some(token) = token_arg {
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
        return Err(CliError::EmptyToken);
    }

    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    let token = buffer.trim();
    if token.is_empty() {
        return Err(CliError::EmptyToken);
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::test_support::{cleanup_db_files, unique_test_db_path};

    fn fake_jwt() -> String {
        // header.{"email":"me@x.y"}.signature, base64url without padding
        let payload = "eyJlbWFpbCI6Im1lQHgueSJ9";
        format!("e30.{payload}.sig")
    }

    #[test]
    fn test_resolve_token_rejects_blank_argument() {
        assert!(matches!(
            resolve_token(Some("   ")),
            Err(CliError::EmptyToken)
        ));
        assert_eq!(resolve_token(Some(" abc ")).unwrap(), "abc");
    }

    #[test]
    fn test_login_whoami_logout_roundtrip() {
        let db_path = unique_test_db_path();

        run_login(Some(&fake_jwt()), &db_path).unwrap();

        let db = open_database(&db_path).unwrap();
        let user = SqliteUserStore::new(db.connection())
            .current_user()
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "me@x.y");
        drop(db);

        run_logout(&db_path).unwrap();
        let db = open_database(&db_path).unwrap();
        assert!(SqliteUserStore::new(db.connection())
            .current_user()
            .unwrap()
            .is_none());
        drop(db);

        cleanup_db_files(&db_path);
    }

    #[test]
    fn test_login_rejects_invalid_token() {
        let db_path = unique_test_db_path();
        assert!(run_login(Some("garbage"), &db_path).is_err());
        cleanup_db_files(&db_path);
    }
}
