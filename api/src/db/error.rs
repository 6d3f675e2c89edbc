use thiserror::Error;

/// Failures of the repository layer. Each query failure carries the
/// operation that was attempted; nothing here is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid {field} '{value}': {source}")]
    InvalidId {
        field: &'static str,
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("failed to {operation}: duplicate value violates {}", .constraint.as_deref().unwrap_or("a unique constraint"))]
    Conflict {
        operation: &'static str,
        constraint: Option<String>,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("stored {what} is corrupt: {message}")]
    Corrupt { what: &'static str, message: String },

    #[error("failed to {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{original} (rollback also failed: {rollback})")]
    RollbackFailed {
        original: Box<StoreError>,
        rollback: sqlx::Error,
    },
}

impl StoreError {
    /// Wrap a driver error with the operation it interrupted. Unique
    /// violations (SQLSTATE 23505) become `Conflict`.
    pub fn query(operation: &'static str, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::Conflict {
                    operation,
                    constraint: db_err.constraint().map(str::to_string),
                };
            }
        }
        StoreError::Query {
            operation,
            source: err,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::StoreError;

    #[test]
    fn non_database_errors_stay_query_errors() {
        let err = StoreError::query("list users", sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            StoreError::Query {
                operation: "list users",
                ..
            }
        ));
        assert!(err.to_string().starts_with("failed to list users: "));
    }

    #[test]
    fn rollback_failure_keeps_original_message() {
        let err = StoreError::RollbackFailed {
            original: Box::new(StoreError::not_found("meal log m1")),
            rollback: sqlx::Error::PoolClosed,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("meal log m1 not found"));
        assert!(msg.contains("rollback also failed"));
    }
}
