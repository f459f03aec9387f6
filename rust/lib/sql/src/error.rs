use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// UNIQUE / NOT NULL / CHECK violation.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, SQLError::Constraint(_))
    }
}

impl From<rusqlite::Error> for SQLError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                SQLError::Constraint(e.to_string())
            }
            _ => SQLError::Execution(e.to_string()),
        }
    }
}
