//! Voice Module
//!
//! Speech output for tutor replies and audio input helpers:
//! - Gemini native TTS (primary, selectable voice, WAV)
//! - Translate endpoint TTS (fallback, default accent, MP3)
//! - Recording loading, WAV wrapping, playback and saving
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use beconfident::agent::llm::GeminiClient;
//! use beconfident::config::Config;
//! use beconfident::voice::build_synthesizer;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let synth = build_synthesizer(&config, GeminiClient::new("key"));
//! if let Some(audio) = synth.speak("Hello! Nice to meet you.").await {
//!     println!("{} bytes from {}", audio.len(), audio.engine());
//! }
//! # Ok(())
//! # }
//! ```

pub mod tts;
pub mod gemini_tts;
pub mod translate_tts;
pub mod audio;

pub use tts::{SpeechEngine, SpeechOutput, SpeechSynthesizer};
pub use gemini_tts::GeminiTts;
pub use translate_tts::TranslateTts;

use crate::agent::llm::GeminiClient;
use crate::config::Config;

/// Build the primary/fallback synthesizer described by the config.
///
/// Returns a disabled synthesizer when speech is turned off.
pub fn build_synthesizer(config: &Config, client: GeminiClient) -> SpeechSynthesizer {
    if !config.speech.enabled {
        return SpeechSynthesizer::disabled();
    }

    SpeechSynthesizer::new(
        Box::new(GeminiTts::from_config(client, &config.speech)),
        Box::new(TranslateTts::from_config(&config.speech)),
    )
    .with_voice(&config.speech.voice)
}
