//! Current-user repository implementation

use crate::auth::UserToken;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for the single-row current-user table.
pub trait UserStore {
    /// The logged-in identity, or `None` when logged out.
    fn current_user(&self) -> Result<Option<UserToken>>;

    /// Replace the stored identity and, in the same transaction, reassign
    /// every anonymous trip to the new owner. Returns the number of trips
    /// reassigned.
    fn login(&self, token: &UserToken) -> Result<usize>;

    /// Remove the stored identity. Recorded trips keep their owner.
    fn logout(&self) -> Result<()>;
}

/// `SQLite` implementation of `UserStore`
pub struct SqliteUserStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteUserStore<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl UserStore for SqliteUserStore<'_> {
    fn current_user(&self) -> Result<Option<UserToken>> {
        let user = self
            .conn
            .query_row(
                "SELECT email, firstname, lastname, token FROM user LIMIT 1",
                [],
                |row| {
                    Ok(UserToken {
                        email: row.get(0)?,
                        firstname: row.get(1)?,
                        lastname: row.get(2)?,
                        jwt: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn login(&self, token: &UserToken) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM user", [])?;
        tx.execute(
            "INSERT INTO user (email, firstname, lastname, token) VALUES (?, ?, ?, ?)",
            params![token.email, token.firstname, token.lastname, token.jwt],
        )?;
        // adopt everything recorded before login
        let reassigned = tx.execute(
            "UPDATE trip SET email = ? WHERE email = ''",
            params![token.email],
        )?;

        tx.commit()?;
        tracing::info!(email = %token.email, reassigned, "user logged in");
        Ok(reassigned)
    }

    fn logout(&self) -> Result<()> {
        self.conn.execute("DELETE FROM user", [])?;
        tracing::debug!("user logged out");
        Ok(())
    }
}
