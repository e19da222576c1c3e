//! View context: which conversation a chat view shows.
//!
//! The context is resolved from navigation and handed to the view as an
//! immutable value. It round-trips through the route form
//! `/chat/{id}?agentic_mode={mode}&focus={message_id}`.

use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::ids::{ConversationId, MessageId};
use crate::types::{AgenticMode, ConversationPathEntry};

const ROUTE_PREFIX: &str = "/chat/";

/// Longest breadcrumb label before it is shortened.
pub const BREADCRUMB_MAX_CHARS: usize = 30;

/// Conversation shown by a view plus navigation hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewContext {
    /// Conversation to display.
    pub conversation_id: ConversationId,
    /// Mode used for the bootstrap turn.
    pub agentic_mode: Option<AgenticMode>,
    /// Message to scroll to once history has loaded.
    pub focus_message_id: Option<MessageId>,
}

impl ViewContext {
    /// Context for a conversation with no mode or focus.
    #[must_use]
    pub const fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            agentic_mode: None,
            focus_message_id: None,
        }
    }

    /// Set the agentic mode.
    #[must_use]
    pub const fn with_agentic_mode(mut self, mode: Option<AgenticMode>) -> Self {
        self.agentic_mode = mode;
        self
    }

    /// Set the focused message.
    #[must_use]
    pub const fn with_focus(mut self, message_id: Option<MessageId>) -> Self {
        self.focus_message_id = message_id;
        self
    }

    /// Context for jumping to an ancestor in the breadcrumb path.
    ///
    /// The ancestor is focused on the message that the next hop forked from.
    #[must_use]
    pub fn for_ancestor(path: &[ConversationPathEntry], index: usize) -> Option<Self> {
        let entry = path.get(index)?;
        let focus = path.get(index + 1).and_then(|next| next.message_id);
        Some(Self::new(entry.id).with_focus(focus))
    }

    /// Render as a route string.
    #[must_use]
    pub fn to_route(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ViewContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ROUTE_PREFIX}{}", self.conversation_id)?;
        let mut sep = '?';
        if let Some(mode) = self.agentic_mode {
            write!(f, "{sep}agentic_mode={mode}")?;
            sep = '&';
        }
        if let Some(focus) = self.focus_message_id {
            write!(f, "{sep}focus={focus}")?;
        }
        Ok(())
    }
}

impl FromStr for ViewContext {
    type Err = CoreError;

    fn from_str(route: &str) -> Result<Self> {
        let rest = route
            .trim()
            .strip_prefix(ROUTE_PREFIX)
            .ok_or_else(|| CoreError::InvalidRoute(route.to_string()))?;
        let (id, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut context = Self::new(id.trim_end_matches('/').parse()?);

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                // An empty mode is how the route says "no mode".
                "agentic_mode" if !value.is_empty() => {
                    context.agentic_mode = Some(value.parse()?);
                }
                "focus" if !value.is_empty() => {
                    context.focus_message_id = Some(value.parse()?);
                }
                _ => {}
            }
        }
        Ok(context)
    }
}

/// Shorten a conversation name for the breadcrumb bar.
#[must_use]
pub fn breadcrumb_label(name: &str) -> String {
    if name.chars().count() <= BREADCRUMB_MAX_CHARS {
        return name.to_string();
    }
    let head: String = name.chars().take(BREADCRUMB_MAX_CHARS).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_round_trip() {
        let ctx = ViewContext::new(ConversationId::new(12))
            .with_agentic_mode(Some(AgenticMode::TreeOfThoughts))
            .with_focus(Some(MessageId::new(40)));
        let route = ctx.to_route();
        assert_eq!(route, "/chat/12?agentic_mode=tot&focus=40");
        assert_eq!(route.parse::<ViewContext>().unwrap(), ctx);
    }

    #[test]
    fn bare_route() {
        let ctx: ViewContext = "/chat/3".parse().unwrap();
        assert_eq!(ctx, ViewContext::new(ConversationId::new(3)));
        assert_eq!(ctx.to_route(), "/chat/3");
    }

    #[test]
    fn empty_mode_means_none() {
        let ctx: ViewContext = "/chat/3?agentic_mode=".parse().unwrap();
        assert_eq!(ctx.agentic_mode, None);
    }

    #[test]
    fn invalid_routes_rejected() {
        assert!(matches!(
            "/settings".parse::<ViewContext>(),
            Err(CoreError::InvalidRoute(_))
        ));
        assert!(matches!(
            "/chat/abc".parse::<ViewContext>(),
            Err(CoreError::InvalidId(_))
        ));
        assert!(matches!(
            "/chat/1?agentic_mode=fast".parse::<ViewContext>(),
            Err(CoreError::UnknownAgenticMode(_))
        ));
    }

    #[test]
    fn ancestor_focuses_forking_message() {
        let path = vec![
            ConversationPathEntry {
                id: ConversationId::new(1),
                name: "root".to_string(),
                message_id: None,
            },
            ConversationPathEntry {
                id: ConversationId::new(2),
                name: "fork".to_string(),
                message_id: Some(MessageId::new(8)),
            },
        ];
        let ctx = ViewContext::for_ancestor(&path, 0).unwrap();
        assert_eq!(ctx.conversation_id, ConversationId::new(1));
        assert_eq!(ctx.focus_message_id, Some(MessageId::new(8)));

        let last = ViewContext::for_ancestor(&path, 1).unwrap();
        assert_eq!(last.focus_message_id, None);
        assert!(ViewContext::for_ancestor(&path, 2).is_none());
    }

    #[test]
    fn long_breadcrumbs_are_shortened() {
        assert_eq!(breadcrumb_label("short"), "short");
        let long = "a".repeat(45);
        let label = breadcrumb_label(&long);
        assert_eq!(label.chars().count(), BREADCRUMB_MAX_CHARS + 3);
        assert!(label.ends_with("..."));
    }
}
