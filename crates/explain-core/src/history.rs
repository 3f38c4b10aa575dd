//! Chat-history sanitisation and prompt budgeting.

use explain_ai::ChatMessage;
use serde_json::Value;

/// Newest turns kept after sanitisation.
pub const MAX_HISTORY_TURNS: usize = 20;
/// Character budget across all history included in a prompt.
pub const HISTORY_CHAR_BUDGET: usize = 3000;
/// Character cap per included message.
pub const MESSAGE_CHAR_CAP: usize = 500;

/// Keep well-formed `{role, content}` turns (roles `user`/`assistant`,
/// non-empty string content), newest [`MAX_HISTORY_TURNS`] only.
pub fn sanitize_history(raw: Option<&Vec<Value>>) -> Vec<ChatMessage> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut messages: Vec<ChatMessage> = raw
        .iter()
        .filter_map(|entry| {
            let role = entry.get("role")?.as_str()?;
            if role != "user" && role != "assistant" {
                return None;
            }
            let content = entry.get("content")?.as_str()?.trim();
            if content.is_empty() {
                return None;
            }
            Some(ChatMessage {
                role: role.to_string(),
                content: content.to_string(),
            })
        })
        .collect();

    if messages.len() > MAX_HISTORY_TURNS {
        messages.drain(..messages.len() - MAX_HISTORY_TURNS);
    }
    messages
}

/// Fit history into the prompt budget: newest first, each message capped
/// with an ellipsis, older messages dropped once the budget runs out.
/// Returns the surviving turns in chronological order.
pub fn clamp_history(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut kept: Vec<ChatMessage> = Vec::new();
    let mut used = 0usize;

    for message in messages.iter().rev() {
        let content = truncate_chars(&message.content, MESSAGE_CHAR_CAP);
        let cost = content.chars().count();
        if used + cost > HISTORY_CHAR_BUDGET {
            break;
        }
        used += cost;
        kept.push(ChatMessage {
            role: message.role.clone(),
            content,
        });
    }

    kept.reverse();
    kept
}

/// Cut to at most `cap` characters, appending an ellipsis when trimmed.
fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(cap).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discards_malformed_entries() {
        let raw = vec![
            json!({"role": "user", "content": "hello"}),
            json!({"role": "system", "content": "nope"}),
            json!({"role": "assistant"}),
            json!({"role": "assistant", "content": 42}),
            json!({"role": "assistant", "content": "   "}),
            json!("not an object"),
            json!({"role": "assistant", "content": "hi"}),
        ];
        let clean = sanitize_history(Some(&raw));
        assert_eq!(clean.len(), 2);
        assert_eq!(clean[0].content, "hello");
        assert_eq!(clean[1].role, "assistant");
    }

    #[test]
    fn caps_at_twenty_newest_turns() {
        let raw: Vec<Value> = (0..30)
            .map(|i| json!({"role": "user", "content": format!("turn {i}")}))
            .collect();
        let clean = sanitize_history(Some(&raw));
        assert_eq!(clean.len(), MAX_HISTORY_TURNS);
        assert_eq!(clean[0].content, "turn 10");
        assert_eq!(clean.last().unwrap().content, "turn 29");
    }

    #[test]
    fn clamp_drops_oldest_first() {
        let messages: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage::user(format!("{i}-{}", "x".repeat(480))))
            .collect();
        let kept = clamp_history(&messages);
        // ~484 chars per message, 3000 budget → six fit
        assert_eq!(kept.len(), 6);
        assert!(kept[0].content.starts_with("4-"));
        assert!(kept.last().unwrap().content.starts_with("9-"));
    }

    #[test]
    fn long_messages_get_ellipsis() {
        let messages = vec![ChatMessage::user("y".repeat(900))];
        let kept = clamp_history(&messages);
        assert_eq!(kept[0].content.chars().count(), MESSAGE_CHAR_CAP + 1);
        assert!(kept[0].content.ends_with('…'));
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(sanitize_history(None).is_empty());
        assert!(clamp_history(&[]).is_empty());
    }
}
