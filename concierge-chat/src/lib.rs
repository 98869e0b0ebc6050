//! # concierge-chat
//!
//! Conversational question answering over a single corpus file.
//!
//! A question runs through [`ConversationalRetrievalChain`]: follow-ups are
//! first condensed into a standalone question using the session history, the
//! top-k corpus chunks are retrieved for it, and one generation call answers
//! from those chunks. Successful exchanges are appended to the caller's
//! [`Session`]; failures come back as `Error: ...` text.
//!
//! ```no_run
//! use concierge_chat::{AppContext, ChatConfig, Session};
//!
//! # async fn example() -> concierge_chat::Result<()> {
//! let context = AppContext::initialize(ChatConfig::load(None)?).await?;
//! let mut session = Session::new();
//!
//! let answer = context.ask("What are your business hours?", &mut session).await;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompt;

pub use chain::ConversationalRetrievalChain;
pub use config::{API_KEY_ENV, ChatConfig};
pub use context::AppContext;
pub use error::{ChatError, LlmError, Result};
pub use llm::{ChatModel, GeminiChatModel};
pub use memory::{ConversationTurn, Session, format_history};
