//! Turn lifecycle and chat view state for branch-chat.
//!
//! - [`turn`] runs one streamed request/response turn as a tokio task and
//!   reports snapshots and completion over a channel
//! - [`view`] holds the state a chat screen renders and routes user actions
//!   (submit, stop, quote, navigate) to turns and API calls

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod turn;
pub mod view;

#[cfg(test)]
mod test_support;

pub use error::{Result, SessionError};
pub use turn::{spawn_turn, TurnEvent, TurnHandle, TurnId, TurnOutcome};
pub use view::{ChatView, SubmitOutcome};
