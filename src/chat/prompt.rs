use crate::history::Message;
use crate::llm::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are Chill Panda 🐼, a calm, empathetic mental health companion.
You respond warmly, supportively, and safely.
You do NOT give medical advice.
If the user expresses distress, respond with empathy and encouragement.";

/// Sent instead of a generated reply when the model cannot be reached.
pub const FALLBACK_REPLY: &str = "I'm having a little trouble finding my words right now. \
Let's take a slow, deep breath together, and please try again in a moment. 🐼";

/// Wraps the user's question with retrieved reference text.
pub fn with_context(context: &str, input_text: &str) -> String {
    format!(
        "Use the following wisdom to answer the question with warmth and care.\n\n\
         Wisdom:\n{}\n\n\
         Question: {}",
        context, input_text
    )
}

/// System instruction, the last `max_turns` of `history` (oldest first),
/// then the new user turn.
pub fn build_messages(
    history: &[Message],
    max_turns: usize,
    context: Option<&str>,
    input_text: &str,
) -> Vec<ChatMessage> {
    let skip = history.len().saturating_sub(max_turns);
    let recent = &history[skip..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.extend(
        recent
            .iter()
            .map(|m| ChatMessage::from_turn(m.role, m.content.clone())),
    );

    let user_turn = match context {
        Some(block) if !block.is_empty() => with_context(block, input_text),
        _ => input_text.to_string(),
    };
    messages.push(ChatMessage::user(user_turn));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Role;
    use chrono::{TimeZone, Utc};
    use serde_json::Map;

    fn turn(i: i64, role: Role) -> Message {
        Message {
            message_id: format!("m{}", i),
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            role,
            content: format!("turn {}", i),
            timestamp: Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn keeps_only_the_latest_turns_oldest_first() {
        let history: Vec<Message> = (0..10)
            .map(|i| turn(i, if i % 2 == 0 { Role::User } else { Role::Assistant }))
            .collect();

        let messages = build_messages(&history, 6, None, "hello");

        assert_eq!(messages.len(), 8);
        assert_eq!(messages[0].role, "system");
        let contents: Vec<&str> = messages[1..7].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["turn 4", "turn 5", "turn 6", "turn 7", "turn 8", "turn 9"]
        );
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[7].content, "hello");
    }

    #[test]
    fn context_is_folded_into_the_user_turn() {
        let messages = build_messages(&[], 6, Some("Breathe in for four."), "I feel stressed");

        assert_eq!(messages.len(), 2);
        let last = &messages[1];
        assert_eq!(last.role, "user");
        assert!(last.content.contains("Breathe in for four."));
        assert!(last.content.ends_with("Question: I feel stressed"));
    }

    #[test]
    fn empty_context_sends_raw_input() {
        let messages = build_messages(&[], 6, Some(""), "");

        assert_eq!(messages[1].content, "");
    }
}
