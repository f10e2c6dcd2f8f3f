use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::{Database, DatabaseError, SessionData};

/// Checks sessions issued by the login flow. Issuing them is not handled here.
pub struct Auth {
    db: Arc<dyn Database>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Session does not exist")]
    InvalidSession,
    #[error("Session has expired")]
    Expired,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

impl Auth {
    pub fn new(db: &Arc<dyn Database>) -> Self {
        Self { db: db.clone() }
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        let session = self.db.session_by_token(token).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::InvalidSession,
            err => AuthError::Db(err),
        })?;

        if session.expires_at <= Utc::now() {
            return Err(AuthError::Expired);
        }

        Ok(session)
    }
}
