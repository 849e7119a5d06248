//! Error types for the store subsystem.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested alert was not found.
    #[error("alert not found: {0}")]
    AlertNotFound(String),

    /// Requested resource was not found.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Requested assignment was not found.
    #[error("assignment not found: {0}")]
    AssignmentNotFound(String),

    /// A resource could not be assigned because it is not available.
    #[error("resource {resource_id} is not available (status: {status})")]
    ResourceUnavailable {
        /// The contested resource.
        resource_id: String,
        /// Its current status string.
        status: String,
    },

    /// A stored row failed to map back to a domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// Invalid operation on the store.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn unavailable_display_names_the_resource() {
        let err = StoreError::ResourceUnavailable {
            resource_id: "res_1".into(),
            status: "in_use".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("res_1"));
        assert!(msg.contains("in_use"));
    }

    #[test]
    fn not_found_display() {
        assert!(StoreError::AlertNotFound("alert_x".into())
            .to_string()
            .contains("alert_x"));
        assert!(StoreError::ResourceNotFound("res_x".into())
            .to_string()
            .contains("res_x"));
    }

    #[test]
    fn serde_error_from_conversion() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: StoreError = serde_err.into();
        assert!(matches!(err, StoreError::Serde(_)));
    }
}
