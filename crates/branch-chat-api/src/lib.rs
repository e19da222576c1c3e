//! HTTP access to the branch-chat conversation service.
//!
//! The service exposes four `POST` endpoints:
//!
//! - `/conversations/v1/create` - create a root conversation or fork one
//! - `/conversations/v1/getAll` - list conversations
//! - `/conversations/v1/getDetails` - messages and ancestry of a conversation
//! - `/messages/v1/create` - run a turn, streaming newline-delimited records
//!
//! Callers depend on the [`ChatApi`] trait; [`HttpChatApi`] implements it
//! with `reqwest`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod error;

pub use client::{ByteStream, ChatApi, HttpChatApi};
pub use config::ApiConfig;
pub use error::{ApiError, Result};
