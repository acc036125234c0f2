/// Errors surfaced by the screening engine.
///
/// Idempotent call-end no-ops and fan-out delivery failures are not errors;
/// they are reported through [`crate::lifecycle::CallEndOutcome`] and
/// [`crate::fanout::BroadcastReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Storage unavailable during {operation}")]
    Storage {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScreenError>;

impl ScreenError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ScreenError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ScreenError::InvalidInput(message.into())
    }
}

/// Wrap a rusqlite error with the store operation that produced it.
pub(crate) fn storage(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> ScreenError {
    move |source| ScreenError::Storage { operation, source }
}
