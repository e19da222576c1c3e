//! Common error types for branch-chat.
//!
//! This module provides the error type shared by the core data model and the
//! route/context parsing helpers.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur outside of stream decoding.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),

    /// An agentic mode tag that the backend does not know.
    #[error("unknown agentic mode: {0}")]
    UnknownAgenticMode(String),

    /// A route string that does not name a conversation.
    #[error("invalid route: {0}")]
    InvalidRoute(String),
}
