use thiserror::Error;

use crate::models::StreamKeyStatus;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The store could not be reached at all (pool exhausted, closed, network).
    /// This is the one class callers may reasonably retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: StreamKeyStatus,
        to: StreamKeyStatus,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Media server error: {0}")]
    MediaControl(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Map "no rows" to NotFound
            sqlx::Error::RowNotFound => Self::NotFound("Resource not found".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::StoreUnavailable(err.to_string()),
            sqlx::Error::Database(db_err) => {
                classify_database_error(&**db_err).unwrap_or_else(|| Self::Database(err))
            }
            _ => Self::Database(err),
        }
    }
}

/// Map well-known PostgreSQL SQLSTATE codes to domain errors
fn classify_database_error(db_err: &dyn sqlx::error::DatabaseError) -> Option<Error> {
    let code = db_err.code()?;
    let mapped = match &*code {
        // PostgreSQL unique_violation
        "23505" => {
            let constraint = db_err.constraint().unwrap_or_default();
            if constraint.contains("one_live") {
                Error::AlreadyExists("Stream key already has a live broadcast".to_string())
            } else if constraint.contains("key_value") {
                Error::AlreadyExists("Stream key value already issued".to_string())
            } else {
                Error::AlreadyExists("Resource already exists".to_string())
            }
        }
        // PostgreSQL foreign_key_violation
        "23503" => Error::NotFound("Referenced resource not found".to_string()),
        // PostgreSQL check_violation
        "23514" => Error::InvalidInput("Constraint check failed".to_string()),
        // PostgreSQL not_null_violation
        "23502" => Error::InvalidInput("Required field is missing".to_string()),
        // admin_shutdown, cannot_connect_now
        "57P01" | "57P03" => Error::StoreUnavailable(db_err.message().to_string()),
        _ => return None,
    };
    Some(mapped)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_pool_errors_are_store_unavailable() {
        let err: Error = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_store_unavailable());

        let err: Error = sqlx::Error::PoolClosed.into();
        assert!(err.is_store_unavailable());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: Error = sqlx::Error::Io(io).into();
        assert!(err.is_store_unavailable());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition {
            from: StreamKeyStatus::Expired,
            to: StreamKeyStatus::Revoked,
        };
        assert_eq!(err.to_string(), "Invalid status transition: expired -> revoked");
    }
}
