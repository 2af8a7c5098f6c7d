use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// Unique, foreign-key, NOT NULL or CHECK constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// The requested conversation shape is not allowed for its kind.
    #[error("invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == ErrorCode::ConstraintViolation =>
            {
                DbError::ConstraintViolation(msg.clone().unwrap_or_else(|| code.to_string()))
            }
            other => DbError::Sqlite(other),
        }
    }
}

impl DbError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation(_))
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
