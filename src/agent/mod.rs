//! Agent module - tutor conversation, model access and exchange orchestration

pub mod conversation;
pub mod llm;
pub mod failover;
pub mod reply;
pub mod scenario;
pub mod exchange;
pub mod interactive;

pub use conversation::Conversation;
pub use exchange::{Exchange, ExchangeReport, ExchangeState, Session};
pub use failover::{FailoverClient, FallbackExhausted};
pub use llm::{ChatModel, GeminiClient, ModelError, ModelRequest};
pub use reply::{ReplyParser, StructuredReply};
pub use scenario::Scenario;
