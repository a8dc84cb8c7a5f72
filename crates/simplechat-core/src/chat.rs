//! Conversation state for one chat session.
//!
//! A turn starts with `begin_turn`, which appends the user message and an
//! empty assistant placeholder. Streamed chunks replace the placeholder with
//! the running aggregate, and the turn ends with either `finish_turn` or
//! `fail_turn`. Only one turn can be in flight.

use tracing::debug;

use crate::api::AskReply;
use crate::state::{ChatMessage, ChatRole};

/// Shown in place of the assistant reply when a turn fails
pub const FALLBACK_REPLY: &str = "Sorry, please try again later or check the backend logs.";

pub const GREETING: &str =
    "Hello! 👋\nWelcome back. What would you like to talk about today? Pick up yesterday's project, or start something new?";

pub fn greeting_for(username: &str) -> String {
    format!(
        "Hello {}! 👋\nWelcome back. What would you like to talk about today? Pick up yesterday's project, or start something new?",
        username
    )
}

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    loading: bool,
    error: Option<String>,
    aggregate: String,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::with_greeting(GREETING)
    }
}

impl Conversation {
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(greeting)],
            loading: false,
            error: None,
            aggregate: String::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn can_submit(&self, input: &str) -> bool {
        !self.loading && !input.trim().is_empty()
    }

    /// Start a turn. Returns the history to send, which ends with the new
    /// user message and excludes the assistant placeholder.
    pub fn begin_turn(&mut self, input: &str) -> Option<Vec<ChatMessage>> {
        if !self.can_submit(input) {
            return None;
        }

        self.messages.push(ChatMessage::user(input.trim()));
        let history = self.messages.clone();
        self.messages.push(ChatMessage::assistant(""));

        self.loading = true;
        self.error = None;
        self.aggregate.clear();

        debug!("turn started (history={})", history.len());
        Some(history)
    }

    /// Fold a streamed chunk into the in-progress assistant message.
    pub fn apply_chunk(&mut self, chunk: &str) {
        self.aggregate.push_str(chunk);
        if let Some(last) = self.messages.last_mut() {
            if last.is_assistant() {
                last.content.clone_from(&self.aggregate);
            }
        }
    }

    pub fn finish_turn(&mut self, reply: AskReply) {
        self.replace_or_push_assistant(reply.message);

        for (idx, tool) in reply.tool_calls.iter().enumerate() {
            let result = tool
                .result_text()
                .unwrap_or_else(|| "(no output)".to_string());
            self.messages.push(ChatMessage::assistant(format!(
                "# Tool call {}\n{}",
                idx + 1,
                result
            )));
        }

        self.end_turn();
    }

    pub fn fail_turn(&mut self, error: impl Into<String>) {
        self.replace_or_push_assistant(ChatMessage::assistant(FALLBACK_REPLY));
        self.error = Some(error.into());
        self.end_turn();
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn replace_or_push_assistant(&mut self, message: ChatMessage) {
        match self.messages.last_mut() {
            Some(last) if last.role == ChatRole::Assistant => *last = message,
            _ => self.messages.push(message),
        }
    }

    fn end_turn(&mut self) {
        self.loading = false;
        self.aggregate.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ToolCall;

    #[test]
    fn test_starts_with_greeting() {
        let convo = Conversation::with_greeting(greeting_for("ada"));
        assert_eq!(convo.messages().len(), 1);
        assert!(convo.messages()[0].is_assistant());
        assert!(convo.messages()[0].content.starts_with("Hello ada!"));
    }

    #[test]
    fn test_submit_disabled_when_empty() {
        let mut convo = Conversation::default();
        assert!(!convo.can_submit(""));
        assert!(!convo.can_submit("   \n"));
        assert!(convo.begin_turn("  ").is_none());
        assert_eq!(convo.messages().len(), 1);
    }

    #[test]
    fn test_submit_disabled_while_loading() {
        let mut convo = Conversation::default();
        assert!(convo.begin_turn("first").is_some());
        assert!(convo.is_loading());
        assert!(!convo.can_submit("second"));
        assert!(convo.begin_turn("second").is_none());
    }

    #[test]
    fn test_begin_turn_appends_placeholder() {
        let mut convo = Conversation::default();
        let history = convo.begin_turn("  hello  ").unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ChatMessage::user("hello"));

        let messages = convo.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], ChatMessage::assistant(""));
    }

    #[test]
    fn test_chunks_replace_placeholder() {
        let mut convo = Conversation::default();
        convo.begin_turn("hi").unwrap();
        convo.apply_chunk("Hel");
        convo.apply_chunk("lo");
        assert_eq!(convo.messages().last().unwrap().content, "Hello");
        assert_eq!(convo.messages().len(), 3);

        convo.finish_turn(AskReply::text("Hello"));
        assert!(!convo.is_loading());
        assert_eq!(convo.messages().len(), 3);
        assert_eq!(convo.messages()[2].content, "Hello");
    }

    #[test]
    fn test_aggregate_resets_between_turns() {
        let mut convo = Conversation::default();
        convo.begin_turn("one").unwrap();
        convo.apply_chunk("first answer");
        convo.finish_turn(AskReply::text("first answer"));

        convo.begin_turn("two").unwrap();
        convo.apply_chunk("second");
        assert_eq!(convo.messages().last().unwrap().content, "second");
    }

    #[test]
    fn test_finish_with_tool_calls() {
        let mut convo = Conversation::default();
        convo.begin_turn("look it up").unwrap();
        convo.finish_turn(AskReply {
            message: ChatMessage::assistant("found it"),
            tool_calls: vec![
                ToolCall {
                    result: Some(serde_json::json!("42 rows")),
                    ..Default::default()
                },
                ToolCall::default(),
            ],
        });

        let messages = convo.messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[2].content, "found it");
        assert_eq!(messages[3].content, "# Tool call 1\n42 rows");
        assert_eq!(messages[4].content, "# Tool call 2\n(no output)");
    }

    #[test]
    fn test_fail_turn_uses_fallback() {
        let mut convo = Conversation::default();
        convo.begin_turn("hi").unwrap();
        convo.apply_chunk("partial");
        convo.fail_turn("connection reset");

        assert!(!convo.is_loading());
        assert_eq!(convo.error(), Some("connection reset"));
        assert_eq!(convo.messages().last().unwrap().content, FALLBACK_REPLY);
        assert_eq!(convo.messages().len(), 3);
    }

    #[test]
    fn test_chunk_ignored_when_last_is_user() {
        let mut convo = Conversation::default();
        convo.messages.push(ChatMessage::user("dangling"));
        convo.apply_chunk("stray");
        assert_eq!(convo.messages().last().unwrap().content, "dangling");

        convo.finish_turn(AskReply::text("reply"));
        assert_eq!(convo.messages().last().unwrap().content, "reply");
        assert_eq!(convo.messages().len(), 3);
    }

    #[test]
    fn test_new_turn_clears_error() {
        let mut convo = Conversation::default();
        convo.begin_turn("hi").unwrap();
        convo.fail_turn("boom");
        convo.begin_turn("again").unwrap();
        assert_eq!(convo.error(), None);
    }
}
