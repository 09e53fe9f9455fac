//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Privilege construction violated a structural rule
    #[error("Invalid privilege: {0}")]
    InvalidPrivilege(String),

    /// Invalid input to a registration call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Scope handle is unknown or has already ended
    #[error("Scope misuse: scope {scope} is not active")]
    ScopeMisuse {
        /// Offending scope identifier
        scope: String,
    },

    /// Attribute handler returned an error or panicked
    #[error("Attribute handler failed for {resource}/{action}: {message}")]
    AttributeHandler {
        resource: String,
        action: String,
        message: String,
    },

    /// Configuration or rule file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
