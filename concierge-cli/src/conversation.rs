use chrono::Local;
use concierge_chat::{AppContext, Session};

pub const WELCOME_MESSAGE: &str = "Welcome to AI Customer Service!\n\
I'm your intelligent assistant, ready to help you with any questions or concerns. \
I have access to our knowledge base and can provide detailed, accurate information.\n\
Feel free to ask me anything!";

pub const QUICK_QUESTIONS: [&str; 5] = [
    "What services do you provide?",
    "What are your pricing packages?",
    "What are your business hours?",
    "How can I contact support?",
    "What is your refund policy?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the on-screen transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Local wall-clock time, `HH:MM`
    pub timestamp: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatStats {
    pub total: usize,
    pub user: usize,
    pub assistant: usize,
}

/// The transcript shown to the user, plus the memory the assistant reads.
///
/// The transcript keeps every exchange, failed ones included; the session
/// only holds turns the assistant completed.
#[derive(Debug)]
pub struct ChatLog {
    messages: Vec<Message>,
    session: Session,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::new(Role::Assistant, WELCOME_MESSAGE)],
            session: Session::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Sends `input` to the assistant and records both sides.
    ///
    /// Blank input is ignored and returns `None`.
    pub async fn submit(&mut self, context: &AppContext, input: &str) -> Option<&Message> {
        let question = input.trim();
        if question.is_empty() {
            return None;
        }

        self.messages.push(Message::new(Role::User, question));
        let answer = context.ask(question, &mut self.session).await;
        self.messages.push(Message::new(Role::Assistant, answer));
        self.messages.last()
    }

    /// Back to the welcome message with an empty memory.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.messages
            .push(Message::new(Role::Assistant, WELCOME_MESSAGE));
        self.session.clear();
    }

    pub fn stats(&self) -> ChatStats {
        let user = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .count();
        ChatStats {
            total: self.messages.len(),
            user,
            assistant: self.messages.len() - user,
        }
    }
}

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Clear,
    QuickList,
    Quick(usize),
    Stats,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("clear"), None) => Command::Clear,
        (Some("quick"), None) => Command::QuickList,
        (Some("quick"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if (1..=QUICK_QUESTIONS.len()).contains(&n) => Command::Quick(n - 1),
            _ => Command::Unknown(line.to_string()),
        },
        (Some("stats"), None) => Command::Stats,
        (Some("help"), None) => Command::Help,
        (Some("quit" | "exit"), None) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_log_has_welcome() {
        let log = ChatLog::new();
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].role, Role::Assistant);
        assert_eq!(log.messages()[0].content, WELCOME_MESSAGE);
        assert_eq!(log.messages()[0].timestamp.len(), 5);
        assert!(log.session().is_empty());
    }

    #[test]
    fn test_stats_and_clear() {
        let mut log = ChatLog::new();
        log.messages.push(Message::new(Role::User, "hi"));
        log.messages.push(Message::new(Role::Assistant, "Error: offline"));
        log.session
            .push(concierge_chat::ConversationTurn::new("earlier", "answer"));

        assert_eq!(
            log.stats(),
            ChatStats {
                total: 3,
                user: 1,
                assistant: 2
            }
        );

        log.clear();
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].content, WELCOME_MESSAGE);
        assert!(log.session().is_empty());
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Command::Empty);
        assert_eq!(
            parse_input("  What are your business hours? "),
            Command::Ask("What are your business hours?".to_string())
        );
        assert_eq!(parse_input("/clear"), Command::Clear);
        assert_eq!(parse_input("/quick"), Command::QuickList);
        assert_eq!(parse_input("/quick 3"), Command::Quick(2));
        assert_eq!(
            parse_input("/quick 9"),
            Command::Unknown("/quick 9".to_string())
        );
        assert_eq!(parse_input("/stats"), Command::Stats);
        assert_eq!(parse_input("/help"), Command::Help);
        assert_eq!(parse_input("/exit"), Command::Quit);
        assert_eq!(parse_input("/dance"), Command::Unknown("/dance".to_string()));
    }

    #[test]
    fn test_quick_question_three_is_business_hours() {
        match parse_input("/quick 3") {
            Command::Quick(i) => assert_eq!(QUICK_QUESTIONS[i], "What are your business hours?"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
