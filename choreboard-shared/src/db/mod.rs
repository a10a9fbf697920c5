/// Database layer for Choreboard
///
/// This module provides database connection pooling, migrations, and
/// transaction helpers.
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Database migration runner
///
/// Models are in the `models` module at crate root level.

pub mod migrations;
pub mod pool;

/// Checks whether a database error is a transient concurrency failure
///
/// Serialization failures (40001) and deadlocks (40P01) are safe to retry
/// once at the transaction boundary. Everything else is surfaced as-is.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => matches!(
            db_err.code().as_deref(),
            Some("40001") | Some("40P01")
        ),
        _ => false,
    }
}

/// Checks whether a database error is a unique-constraint violation
///
/// Used for idempotent operations (join-by-code) and invite-code retry,
/// where a duplicate key is an expected outcome rather than a failure.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_transient() {
        assert!(!is_transient(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
