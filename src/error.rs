//! Crate-level error type for the LED toggler

use thiserror::Error;

/// Main error type for publisher operations
#[derive(Debug, Error)]
pub enum TogglerError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    TransportError(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl TogglerError {
    /// Wrap any transport error
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError(Box::new(error))
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Result type for publisher operations
pub type TogglerResult<T> = Result<T, TogglerError>;
