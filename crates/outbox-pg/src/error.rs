use outbox_core::ports::StoreError;

/// Map an sqlx error onto the store taxonomy.
///
/// Pool and socket failures, and SQLSTATE class 08 (connection exception),
/// are `Connection`; everything else is `Query`.
pub fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
        sqlx::Error::Database(db) if db.code().is_some_and(|code| code.starts_with("08")) => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}
