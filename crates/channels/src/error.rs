use std::error::Error as StdError;

/// Crate-wide result type for chat client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared by every [`crate::ChatClient`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client has not finished initializing, or has been destroyed.
    #[error("chat client unavailable: {message}")]
    Unavailable { message: String },

    /// A request to the client did not answer in time.
    #[error("chat client request timed out: {operation}")]
    Timeout { operation: String },

    /// The client answered but reported a failure.
    #[error("chat client rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    /// Wrapped source error from the transport or process layer.
    #[error("chat client operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl std::fmt::Display) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
        }
    }

    #[must_use]
    pub fn rejected(operation: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
