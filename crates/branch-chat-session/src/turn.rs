//! One request/response turn against the streaming endpoint.
//!
//! A turn runs as its own tokio task: it issues the request, decodes the body
//! chunk by chunk and reports progress to the owning view as [`TurnEvent`]s.
//!
//! Endpoint: POST /messages/v1/create

use std::fmt;
use std::sync::Arc;

use branch_chat_api::ChatApi;
use branch_chat_core::wire::CreateMessageRequest;
use branch_chat_core::{MessageId, StreamAccumulator, StreamDecoder, StreamSnapshot};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SessionError;

/// Identifies a turn within one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl TurnId {
    /// Wrap a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The id after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// Final state of a turn.
#[derive(Debug, Default)]
pub struct TurnOutcome {
    /// Answer text, without cursor.
    pub content: String,
    /// Reasoning text, without cursor.
    pub reasoning: String,
    /// Last message id reported by the server.
    pub message_id: Option<MessageId>,
    /// What ended the turn early, if anything.
    pub error: Option<SessionError>,
}

/// Progress reported by a running turn.
#[derive(Debug)]
pub enum TurnEvent {
    /// New live text, published once per chunk that completed a record.
    Snapshot {
        /// Turn the snapshot belongs to.
        turn: TurnId,
        /// Live text with cursor.
        snapshot: StreamSnapshot,
    },
    /// The turn ended. Sent exactly once unless the turn was cancelled.
    Finished {
        /// Turn that ended.
        turn: TurnId,
        /// Accumulated result.
        outcome: TurnOutcome,
    },
}

impl TurnEvent {
    /// Turn the event belongs to.
    #[must_use]
    pub const fn turn(&self) -> TurnId {
        match self {
            Self::Snapshot { turn, .. } | Self::Finished { turn, .. } => *turn,
        }
    }
}

/// Handle to a running turn. Dropping it aborts the turn.
#[derive(Debug)]
pub struct TurnHandle {
    id: TurnId,
    task: JoinHandle<()>,
}

impl TurnHandle {
    /// Id of the turn.
    #[must_use]
    pub const fn id(&self) -> TurnId {
        self.id
    }

    /// Abort the turn. No `Finished` event follows.
    pub fn cancel(self) {
        tracing::info!(turn = %self.id, "Turn cancelled");
        // Drop aborts the task.
    }
}

impl Drop for TurnHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a turn task that reports to `events`.
#[must_use]
pub fn spawn_turn(
    api: Arc<dyn ChatApi>,
    id: TurnId,
    request: CreateMessageRequest,
    events: mpsc::Sender<TurnEvent>,
) -> TurnHandle {
    tracing::debug!(
        turn = %id,
        conversation_id = %request.conversation_id,
        bootstrap = request.is_new_conversation,
        "Starting turn"
    );
    let task = tokio::spawn(run_turn(api, id, request, events));
    TurnHandle { id, task }
}

async fn run_turn(
    api: Arc<dyn ChatApi>,
    id: TurnId,
    request: CreateMessageRequest,
    events: mpsc::Sender<TurnEvent>,
) {
    let mut acc = StreamAccumulator::new();
    let error = read_stream(api.as_ref(), id, &request, &mut acc, &events)
        .await
        .err();

    match &error {
        Some(e) => tracing::error!(turn = %id, error = %e, "Turn failed"),
        None => tracing::debug!(turn = %id, message_id = ?acc.message_id(), "Turn complete"),
    }

    let (content, reasoning, message_id) = acc.into_parts();
    let outcome = TurnOutcome {
        content,
        reasoning,
        message_id,
        error,
    };
    let _ = events.send(TurnEvent::Finished { turn: id, outcome }).await;
}

async fn read_stream(
    api: &dyn ChatApi,
    id: TurnId,
    request: &CreateMessageRequest,
    acc: &mut StreamAccumulator,
    events: &mpsc::Sender<TurnEvent>,
) -> Result<(), SessionError> {
    let mut body = api.create_streamed_message(request).await?;
    let mut decoder = StreamDecoder::new();

    while let Some(chunk) = body.next().await {
        let records = decoder.decode_chunk(&chunk?)?;
        if acc.apply_all(records) {
            publish(id, acc, events).await;
        }
    }

    if let Some(record) = decoder.finish()? {
        acc.apply(record);
        publish(id, acc, events).await;
    }
    Ok(())
}

async fn publish(id: TurnId, acc: &StreamAccumulator, events: &mpsc::Sender<TurnEvent>) {
    let snapshot = acc.snapshot();
    let _ = events
        .send(TurnEvent::Snapshot { turn: id, snapshot })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line, Script, ScriptedApi};
    use branch_chat_core::ConversationId;
    use std::time::Duration;

    fn request() -> CreateMessageRequest {
        CreateMessageRequest {
            conversation_id: ConversationId::new(1),
            user_message: "hi".to_string(),
            is_new_conversation: false,
            agentic_mode: None,
            prompt_mode: None,
            extra_data: None,
        }
    }

    #[tokio::test]
    async fn snapshots_then_finished() {
        let api = ScriptedApi::new();
        api.push_stream(Script::chunks([
            line(5, "real_content", "Hel"),
            line(5, "real_content", "lo"),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn_turn(api.clone(), TurnId::new(1), request(), tx);

        let mut snapshots = Vec::new();
        let outcome = loop {
            match rx.recv().await.unwrap() {
                TurnEvent::Snapshot { snapshot, .. } => snapshots.push(snapshot.content),
                TurnEvent::Finished { turn, outcome } => {
                    assert_eq!(turn, handle.id());
                    break outcome;
                }
            }
        };

        assert_eq!(snapshots, vec!["Hel|".to_string(), "Hello|".to_string()]);
        assert_eq!(outcome.content, "Hello");
        assert_eq!(outcome.message_id, Some(MessageId::new(5)));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn chunk_without_complete_line_publishes_nothing() {
        let api = ScriptedApi::new();
        let full = line(2, "real_content", "whole");
        let (head, tail) = full.split_at(10);
        api.push_stream(Script::chunks([head.to_string(), tail.to_string()]));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = spawn_turn(api.clone(), TurnId::new(1), request(), tx);

        let first = rx.recv().await.unwrap();
        assert!(
            matches!(first, TurnEvent::Snapshot { ref snapshot, .. } if snapshot.content == "whole|")
        );
        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::Finished { .. }));
    }

    #[tokio::test]
    async fn rejected_request_finishes_empty() {
        let api = ScriptedApi::new();
        api.push_stream(Script::Reject(500));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = spawn_turn(api.clone(), TurnId::new(3), request(), tx);

        let TurnEvent::Finished { outcome, .. } = rx.recv().await.unwrap() else {
            panic!("expected finish");
        };
        assert!(outcome.content.is_empty());
        assert!(matches!(outcome.error, Some(SessionError::Api(_))));
    }

    #[tokio::test]
    async fn malformed_line_keeps_earlier_text() {
        let api = ScriptedApi::new();
        api.push_stream(Script::chunks([
            line(4, "real_content", "partial"),
            "oops\n".to_string(),
        ]));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = spawn_turn(api.clone(), TurnId::new(1), request(), tx);

        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::Snapshot { .. }));
        let TurnEvent::Finished { outcome, .. } = rx.recv().await.unwrap() else {
            panic!("expected finish");
        };
        assert_eq!(outcome.content, "partial");
        assert!(matches!(outcome.error, Some(SessionError::Stream(_))));
    }

    #[tokio::test]
    async fn unterminated_last_line_is_kept() {
        let api = ScriptedApi::new();
        let last = line(6, "real_content", "tail");
        api.push_stream(Script::chunks([last.trim_end().to_string()]));
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = spawn_turn(api.clone(), TurnId::new(1), request(), tx);

        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::Snapshot { .. }));
        let TurnEvent::Finished { outcome, .. } = rx.recv().await.unwrap() else {
            panic!("expected finish");
        };
        assert_eq!(outcome.content, "tail");
    }

    #[tokio::test]
    async fn cancel_sends_no_finish() {
        let api = ScriptedApi::new();
        api.push_stream(Script::Pending);
        let (tx, mut rx) = mpsc::channel(16);
        let handle = spawn_turn(api.clone(), TurnId::new(1), request(), tx);

        tokio::task::yield_now().await;
        handle.cancel();

        let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(matches!(waited, Ok(None)));
    }

    #[test]
    fn turn_ids_advance() {
        let id = TurnId::new(1);
        assert_eq!(id.next(), TurnId::new(2));
        assert_eq!(id.to_string(), "turn-1");
    }
}
