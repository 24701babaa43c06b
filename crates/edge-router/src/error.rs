//! Routing errors.

/// Errors raised while building or applying routes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Destination '{destination}' requires param '{param}'")]
    MissingParam { destination: String, param: String },
}
