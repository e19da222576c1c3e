//! Identifier types for conversations and messages.
//!
//! The backend assigns plain integer ids. Streamed records sometimes carry the
//! message id as a numeric string, so both encodings are accepted on input and
//! ids are always written back as JSON numbers.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest value a provisional id may take (2^53 - 1).
const PROVISIONAL_MASK: u128 = (1 << 53) - 1;

/// Either wire encoding of an integer id.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl RawId {
    fn into_i64(self) -> Result<i64, IdError> {
        match self {
            Self::Int(value) => Ok(value),
            Self::Str(text) => text
                .trim()
                .parse()
                .map_err(|_| IdError::InvalidNumber(text)),
        }
    }
}

fn deserialize_raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawId::deserialize(deserializer)?
        .into_i64()
        .map_err(serde::de::Error::custom)
}

/// Identifier of a single message.
///
/// Ids coming from the server are authoritative. Messages built locally
/// before the server has confirmed them get a [`MessageId::provisional`] id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(i64);

impl MessageId {
    /// Wrap a server-assigned id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Generate a random positive id that fits in 53 bits.
    ///
    /// Used for locally created messages until the server assigns a real id.
    #[must_use]
    pub fn provisional() -> Self {
        let bits = uuid::Uuid::new_v4().as_u128() & PROVISIONAL_MASK;
        // The mask keeps the value below 2^53, so the cast is lossless.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let value = bits.max(1) as i64;
        Self(value)
    }

    /// Return the raw integer.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawId::Str(s.to_string()).into_i64().map(Self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_raw(deserializer).map(Self)
    }
}

impl From<MessageId> for i64 {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

/// Identifier of a conversation (a thread in the conversation tree).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversationId(i64);

impl ConversationId {
    /// Wrap a server-assigned id.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw integer.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({})", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RawId::Str(s.to_string()).into_i64().map(Self)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_raw(deserializer).map(Self)
    }
}

impl From<ConversationId> for i64 {
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a base-10 integer.
    #[error("invalid numeric id: {0:?}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_from_number() {
        let id: MessageId = serde_json::from_str("42").unwrap();
        assert_eq!(id, MessageId::new(42));
    }

    #[test]
    fn message_id_from_numeric_string() {
        let id: MessageId = serde_json::from_str("\"17\"").unwrap();
        assert_eq!(id.get(), 17);
    }

    #[test]
    fn message_id_rejects_garbage() {
        let result: Result<MessageId, _> = serde_json::from_str("\"abc\"");
        assert!(result.is_err());
        assert!(matches!(
            "x1".parse::<MessageId>(),
            Err(IdError::InvalidNumber(_))
        ));
    }

    #[test]
    fn ids_serialize_as_numbers() {
        let json = serde_json::to_string(&ConversationId::new(9)).unwrap();
        assert_eq!(json, "9");
        let json = serde_json::to_string(&MessageId::new(5)).unwrap();
        assert_eq!(json, "5");
    }

    #[test]
    fn provisional_ids_fit_in_53_bits() {
        for _ in 0..256 {
            let id = MessageId::provisional().get();
            assert!(id > 0);
            assert!(id < (1_i64 << 53));
        }
    }

    #[test]
    fn provisional_ids_are_distinct() {
        let a = MessageId::provisional();
        let b = MessageId::provisional();
        // Random 53-bit values; a collision here is astronomically unlikely.
        assert_ne!(a, b);
    }

    #[test]
    fn conversation_id_display_and_parse() {
        let id: ConversationId = " 12 ".parse().unwrap();
        assert_eq!(id.to_string(), "12");
        assert_eq!(format!("{id:?}"), "ConversationId(12)");
    }
}
