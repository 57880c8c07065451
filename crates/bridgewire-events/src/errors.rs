//! Event bus error types.

use thiserror::Error;

/// Failure reported by an event handler.
///
/// Handler failures never reach the publisher; the bus logs them and moves on
/// to the next handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a handler error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Registration-time failures.
#[derive(Debug, Error)]
pub enum EventError {
    /// A handler declared a kind name that is not recognized.
    #[error("unknown event kind '{0}'")]
    UnknownKind(String),

    /// A handler was registered without a name.
    #[error("handler name must not be empty")]
    EmptyHandlerName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_display() {
        let err: HandlerError = "boom".into();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(HandlerError::new(String::from("x")).0, "x");
    }

    #[test]
    fn event_error_display() {
        assert_eq!(
            EventError::UnknownKind("Foo".into()).to_string(),
            "unknown event kind 'Foo'"
        );
    }
}
