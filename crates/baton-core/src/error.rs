//! Navigation error types with rich context

use std::path::PathBuf;
use thiserror::Error;

use crate::id::InstanceId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Navigation error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Node Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Trying to push a node that has already been destroyed: {id}")]
    NodeDestroyed { id: InstanceId },

    #[error("Unknown node: {id}")]
    UnknownNode { id: InstanceId },

    #[error("Node {id} returned its container as its own view")]
    ViewIsContainer { id: InstanceId },

    #[error("Target node already set for {id}. A node's target may only be set once.")]
    TargetAlreadySet { id: InstanceId },

    #[error("Screen type '{type_tag}' is not registered and could not be restored")]
    UnregisteredScreen { type_tag: String },

    #[error("View error: {message}")]
    View { message: String },

    // ─────────────────────────────────────────────────────────────
    // Transition Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Transition handler type '{type_tag}' is not registered and cannot be default-constructed")]
    UnregisteredHandler { type_tag: String },

    #[error("Transition handler state error: {message}")]
    HandlerState { message: String },

    // ─────────────────────────────────────────────────────────────
    // Router Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown router: {id}")]
    UnknownRouter { id: u64 },

    #[error("Trying to push a node that already exists on the backstack: {id}")]
    DuplicateNode { id: InstanceId },

    #[error("Tag '{tag}' is already used by another entry on this backstack")]
    DuplicateTag { tag: String },

    #[error("Trying to pop the current node when there are none on the backstack")]
    EmptyBackstack,

    // ─────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to restore saved state: {message}")]
    Restore { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn node_destroyed(id: &InstanceId) -> Self {
        Self::NodeDestroyed { id: id.clone() }
    }

    pub fn unknown_node(id: &InstanceId) -> Self {
        Self::UnknownNode { id: id.clone() }
    }

    pub fn unregistered_screen(type_tag: impl Into<String>) -> Self {
        Self::UnregisteredScreen {
            type_tag: type_tag.into(),
        }
    }

    pub fn unregistered_handler(type_tag: impl Into<String>) -> Self {
        Self::UnregisteredHandler {
            type_tag: type_tag.into(),
        }
    }

    pub fn handler_state(message: impl Into<String>) -> Self {
        Self::HandlerState {
            message: message.into(),
        }
    }

    pub fn view(message: impl Into<String>) -> Self {
        Self::View {
            message: message.into(),
        }
    }

    pub fn duplicate_tag(tag: impl Into<String>) -> Self {
        Self::DuplicateTag { tag: tag.into() }
    }

    pub fn restore(message: impl Into<String>) -> Self {
        Self::Restore {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DuplicateTag { .. }
                | Error::TargetAlreadySet { .. }
                | Error::EmptyBackstack
                | Error::Config { .. }
                | Error::ConfigNotFound { .. }
        )
    }

    /// Check if this error is a programming error that must not be absorbed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NodeDestroyed { .. }
                | Error::ViewIsContainer { .. }
                | Error::UnregisteredScreen { .. }
                | Error::UnregisteredHandler { .. }
                | Error::DuplicateNode { .. }
                | Error::UnknownNode { .. }
                | Error::UnknownRouter { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let id = InstanceId::from("abc");
        let err = Error::node_destroyed(&id);
        assert_eq!(
            err.to_string(),
            "Trying to push a node that has already been destroyed: abc"
        );

        let err = Error::duplicate_tag("root");
        assert!(err.to_string().contains("'root'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        let id = InstanceId::from("n1");
        assert!(Error::node_destroyed(&id).is_fatal());
        assert!(Error::ViewIsContainer { id: id.clone() }.is_fatal());
        assert!(Error::unregistered_screen("home").is_fatal());
        assert!(Error::unregistered_handler("fade").is_fatal());
        assert!(!Error::duplicate_tag("root").is_fatal());
    }

    #[test]
    fn test_error_is_recoverable() {
        let id = InstanceId::from("n1");
        assert!(Error::duplicate_tag("root").is_recoverable());
        assert!(Error::TargetAlreadySet { id }.is_recoverable());
        assert!(Error::config("bad value").is_recoverable());
        assert!(!Error::unregistered_screen("home").is_recoverable());
    }

    #[test]
    fn test_context_preserves_error() {
        let result: std::result::Result<(), Error> = Err(Error::EmptyBackstack);
        let err = result.context("popping").unwrap_err();
        assert!(matches!(err, Error::EmptyBackstack));
    }
}
