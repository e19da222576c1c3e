//! Core types and state for branch-chat.
//!
//! This crate holds everything a branch-chat client needs that does not touch
//! the network or a terminal:
//!
//! - **Identifiers**: Integer ids for conversations and messages
//! - **Data model**: Messages, conversations and their ancestry paths
//! - **Wire bodies**: Request and response shapes of the conversation service
//! - **Stream decoding**: Newline-delimited record framing and accumulation
//! - **Quote state**: Which context the next submission attaches to
//! - **View context**: The conversation a view shows, and its route form
//!
//! # Example
//!
//! ```
//! use branch_chat_core::{StreamAccumulator, StreamDecoder};
//!
//! let mut decoder = StreamDecoder::new();
//! let mut acc = StreamAccumulator::new();
//!
//! let records = decoder
//!     .decode_chunk(b"{\"message_id\": 5, \"content\": \"Hel\", \"type\": \"real_content\"}\n")
//!     .unwrap();
//! acc.apply_all(records);
//! assert_eq!(acc.snapshot().content, "Hel|");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod ids;
pub mod quote;
pub mod stream;
pub mod types;
pub mod wire;

pub use context::{breadcrumb_label, ViewContext};
pub use error::{CoreError, Result};
pub use ids::{ConversationId, IdError, MessageId};
pub use quote::{QuoteContext, QuoteKind, Submission};
pub use stream::{StreamAccumulator, StreamDecoder, StreamError, StreamRecord, StreamSnapshot, CURSOR};
pub use types::{
    AgenticMode, ChildConversation, Conversation, ConversationDetails, ConversationPathEntry,
    Message, ModelSettings, PromptMode, Role,
};
