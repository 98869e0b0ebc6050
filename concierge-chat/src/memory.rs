//! Conversation memory.
//!
//! A [`Session`] is the ordered log of completed exchanges for one user. Turns
//! are only ever appended, and only for exchanges that produced an answer.

use serde::{Deserialize, Serialize};

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Conversation history owned by a single caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn; turns are kept in the order they were pushed.
    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Forgets every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Renders turns as alternating `Human:` / `Assistant:` lines.
pub fn format_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_keeps_order() {
        let mut session = Session::new();
        assert!(session.is_empty());
        assert!(session.last().is_none());

        session.push(ConversationTurn::new("first?", "one"));
        session.push(ConversationTurn::new("second?", "two"));

        assert_eq!(session.len(), 2);
        assert_eq!(session.turns()[0].question, "first?");
        assert_eq!(session.last().unwrap().answer, "two");

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_format_history() {
        let turns = vec![
            ConversationTurn::new("What are your business hours?", "9am to 5pm."),
            ConversationTurn::new("Do you ship abroad?", "No."),
        ];
        assert_eq!(
            format_history(&turns),
            "Human: What are your business hours?\nAssistant: 9am to 5pm.\n\
             Human: Do you ship abroad?\nAssistant: No."
        );
        assert_eq!(format_history(&[]), "");
    }
}
