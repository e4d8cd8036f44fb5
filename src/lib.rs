//! BeConfident - Conversational English Tutor Library
//!
//! Roleplay practice against a hosted language model:
//! - Scenario instructions (job interview, ordering food, tech meeting, ...)
//! - Ordered model candidates with sequential failover
//! - Tolerant parsing of structured tutor replies
//! - Spoken replies with a native voice and a fallback engine
//!
//! # Example
//!
//! ```ignore
//! use beconfident::agent::{Exchange, Session, Scenario};
//! use beconfident::config::Config;
//! use beconfident::types::Payload;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let key = beconfident::security::resolve_default(false)?;
//!     let exchange = Exchange::from_config(&config, &key, true);
//!     let mut session = Session::new(Scenario::JobInterview);
//!     exchange.run_turn(&mut session, Payload::text("I go to school yesterday")).await;
//!     println!("{:?}", session.conversation.last());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod types;
pub mod agent;
pub mod config;
pub mod security;
pub mod voice;
pub mod cli;

// Re-export commonly used types for convenience
pub use agent::{
    conversation::Conversation,
    exchange::{Exchange, ExchangeReport, ExchangeState, Session},
    llm::GeminiClient,
    reply::{ReplyParser, StructuredReply},
    scenario::Scenario,
};

pub use config::Config;

pub use security::{
    set_api_key,
    get_api_key,
    delete_api_key,
    ApiKey,
    CredentialError,
};

pub use types::{AudioClip, AudioFormat, AudioInput, Payload, RenderedAudio, Role, Turn};

pub use voice::SpeechSynthesizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Conversational English Tutor", NAME, VERSION)
}

/// Cut a string to at most `max_bytes` bytes without splitting a character
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_safe() {
        assert_eq!(truncate_safe("hello", 10), "hello");
        assert_eq!(truncate_safe("hello", 3), "hel");
        assert_eq!(truncate_safe("héllo", 2), "h");
        assert_eq!(truncate_safe("", 0), "");
    }

    #[test]
    fn test_info() {
        assert!(info().starts_with("beconfident v"));
    }
}
