//! Error Types
//!
//! Reactive operations never fail: rejected writes are logged and ignored.
//! The fallible surface is app bootstrap.

use thiserror::Error;

/// Errors returned by the renderer's bootstrap API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The mount selector matched no host node.
    #[error("no host node matches selector `{selector}`")]
    ContainerNotFound { selector: String },

    /// `mount` was called on an app that is already mounted.
    #[error("app is already mounted")]
    AlreadyMounted,
}

/// Result alias for renderer operations.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;
