//! Decoding of the streamed assistant reply.
//!
//! `POST /messages/v1/create` answers with newline-delimited JSON records:
//!
//! ```text
//! {"message_id": 5, "content": "Hel", "type": "real_content"}
//! {"message_id": 5, "content": "lo", "type": "real_content"}
//! ```
//!
//! Transport chunks are not aligned with records, so [`StreamDecoder`] keeps
//! the unterminated tail of every chunk and prepends it to the next one.
//! [`StreamAccumulator`] folds decoded records into the running content and
//! reasoning text and renders the live snapshot shown while a turn streams.

use bytes::BytesMut;
use serde::Deserialize;
use thiserror::Error;

use crate::ids::MessageId;

/// Marker appended to the live text while a turn is streaming.
pub const CURSOR: char = '|';

/// Errors that end a streamed turn.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A complete line was not valid UTF-8.
    #[error("stream line is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A complete line was not a valid record.
    #[error("malformed stream record {line:?}: {source}")]
    Parse {
        /// The offending line, trimmed.
        line: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Records
// =============================================================================

/// Kind of text carried by a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Answer text.
    RealContent,
    /// Reasoning summary shown before the answer.
    ReasoningSummary,
    /// Any type this client does not render.
    #[default]
    #[serde(other)]
    Other,
}

/// One decoded line of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamRecord {
    /// Server id of the assistant message being produced.
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// What the fragment is.
    #[serde(rename = "type", default)]
    pub kind: RecordKind,
}

impl StreamRecord {
    fn parse(line: &[u8]) -> Result<Option<Self>, StreamError> {
        let text = std::str::from_utf8(line)?.trim();
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(text)
            .map(Some)
            .map_err(|source| StreamError::Parse {
                line: text.to_string(),
                source,
            })
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Splits a chunked byte stream into records.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: BytesMut,
}

impl StreamDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk and return every record it completes.
    ///
    /// Blank lines are skipped. A trailing partial line stays buffered.
    ///
    /// # Errors
    ///
    /// Returns an error if a complete line is not valid UTF-8 or not a valid
    /// record.
    pub fn decode_chunk(&mut self, chunk: &[u8]) -> Result<Vec<StreamRecord>, StreamError> {
        self.buf.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if let Some(record) = StreamRecord::parse(&line)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Decode whatever is left once the body has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the unterminated final line is not a valid record.
    pub fn finish(&mut self) -> Result<Option<StreamRecord>, StreamError> {
        let rest = self.buf.split();
        StreamRecord::parse(&rest)
    }

    /// Check if bytes of an unterminated line are buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }
}

// =============================================================================
// Accumulator
// =============================================================================

/// Live text published while a turn streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    /// Answer text so far, with the cursor once any exists.
    pub content: String,
    /// Reasoning so far, with the cursor only until the answer starts.
    pub reasoning: String,
}

impl StreamSnapshot {
    /// Check if there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.reasoning.is_empty()
    }
}

/// Running totals of one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    content: String,
    reasoning: String,
    message_id: Option<MessageId>,
}

impl StreamAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the totals.
    pub fn apply(&mut self, record: StreamRecord) {
        if let Some(id) = record.message_id {
            self.message_id = Some(id);
        }
        let Some(text) = record.content else {
            return;
        };
        match record.kind {
            RecordKind::RealContent => self.content.push_str(&text),
            RecordKind::ReasoningSummary => self.reasoning.push_str(&text),
            RecordKind::Other => {}
        }
    }

    /// Fold a batch of records; returns `true` if the batch was non-empty.
    pub fn apply_all(&mut self, records: impl IntoIterator<Item = StreamRecord>) -> bool {
        let mut applied = false;
        for record in records {
            self.apply(record);
            applied = true;
        }
        applied
    }

    /// Render the live text.
    #[must_use]
    pub fn snapshot(&self) -> StreamSnapshot {
        let content = if self.content.is_empty() {
            String::new()
        } else {
            format!("{}{CURSOR}", self.content)
        };
        let reasoning = if !self.reasoning.is_empty() && self.content.is_empty() {
            format!("{}{CURSOR}", self.reasoning)
        } else {
            self.reasoning.clone()
        };
        StreamSnapshot { content, reasoning }
    }

    /// Answer text without the cursor.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning text without the cursor.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Last message id reported by the server.
    #[must_use]
    pub const fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Consume into `(content, reasoning, message_id)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String, Option<MessageId>) {
        (self.content, self.reasoning, self.message_id)
    }
}
