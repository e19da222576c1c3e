//! Error types for the session layer.

use branch_chat_api::ApiError;
use branch_chat_core::StreamError;
use thiserror::Error;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while running a turn or creating a thread.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The conversation service failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The streamed reply could not be decoded.
    #[error("stream decode failed: {0}")]
    Stream(#[from] StreamError),
}
