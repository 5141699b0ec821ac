use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage error taxonomy. Uniqueness violations come back from the insert
/// itself (never from a read-then-write pre-check), so concurrent duplicates
/// lose at this layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write, keyed to the offending field.
    #[error("{field} already in use")]
    Conflict { field: &'static str },

    /// A referenced slug/entity does not exist.
    #[error("unknown {field}")]
    BadReference { field: &'static str },

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}

/// Column path ("table.column") of a UNIQUE violation, if that is what
/// `err` is.
pub(crate) fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            msg.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}
