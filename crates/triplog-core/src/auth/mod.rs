//! Logged-in user identity consumed by the sync engine.
//!
//! The login flow itself lives outside the engine; callers hand over the
//! bearer token issued by the server and the engine derives the identity
//! claims from it.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

use crate::error::{Error, Result};

/// The current user's identity plus the bearer credential attached to
/// uploads.
#[derive(Clone, PartialEq, Eq)]
pub struct UserToken {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    /// Raw JWT sent as `Authorization: JWT <token>`
    pub jwt: String,
}

impl fmt::Debug for UserToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("UserToken")
            .field("email", &self.email)
            .field("firstname", &self.firstname)
            .field("lastname", &self.lastname)
            .field("jwt", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    email: String,
    #[serde(default)]
    firstname: Option<String>,
    #[serde(default)]
    lastname: Option<String>,
}

impl UserToken {
    /// Build a token by decoding the claims segment of a JWT.
    ///
    /// Only the payload segment is read; signature verification belongs to
    /// the server.
    pub fn from_jwt(jwt: &str) -> Result<Self> {
        let segment = jwt
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::InvalidInput("token is not a JWT".into()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(segment.trim_end_matches('='))
            .map_err(|error| Error::InvalidInput(format!("invalid JWT payload: {error}")))?;
        let claims: Claims = serde_json::from_slice(&bytes)?;

        if claims.email.trim().is_empty() {
            return Err(Error::InvalidInput("JWT carries no email claim".into()));
        }

        Ok(Self {
            email: claims.email,
            firstname: claims.firstname,
            lastname: claims.lastname,
            jwt: jwt.to_string(),
        })
    }
}
