//! Text-to-Speech (TTS) Module
//!
//! Turns reply text into playable audio with two engines tried in order.
//!
//! # Architecture
//!
//! ```text
//! Reply text → primary (native voice) ──ok──→ RenderedAudio
//!                   │ error / empty
//!                   ↓
//!              fallback (default accent) ──ok──→ RenderedAudio
//!                   │ error / empty
//!                   ↓
//!                 None (text-only turn)
//! ```
//!
//! Each engine is tried at most once per reply. Synthesis problems never
//! reach the caller as errors.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::types::{AudioFormat, RenderedAudio};

/// Audio produced by one engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOutput {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// A speech synthesis backend
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Short engine name recorded on the rendered audio
    fn name(&self) -> &str;

    /// Synthesize text, optionally in a specific voice
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<SpeechOutput>;
}

/// Primary/fallback speech synthesizer
pub struct SpeechSynthesizer {
    primary: Option<Box<dyn SpeechEngine>>,
    fallback: Option<Box<dyn SpeechEngine>>,
    voice: Option<String>,
}

impl SpeechSynthesizer {
    pub fn new(primary: Box<dyn SpeechEngine>, fallback: Box<dyn SpeechEngine>) -> Self {
        Self {
            primary: Some(primary),
            fallback: Some(fallback),
            voice: None,
        }
    }

    /// A synthesizer that never produces audio
    pub fn disabled() -> Self {
        Self {
            primary: None,
            fallback: None,
            voice: None,
        }
    }

    /// Voice identity passed to the primary engine
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        let voice = voice.into();
        self.voice = (!voice.trim().is_empty()).then_some(voice);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    /// Render text to audio, or `None` if neither engine managed to
    pub async fn speak(&self, text: &str) -> Option<RenderedAudio> {
        if text.trim().is_empty() {
            debug!("Nothing to synthesize");
            return None;
        }

        if let Some(primary) = &self.primary {
            match attempt(primary.as_ref(), text, self.voice.as_deref()).await {
                Ok(audio) => return Some(audio),
                Err(e) => warn!("Primary TTS ({}) failed: {}", primary.name(), e),
            }
        }

        if let Some(fallback) = &self.fallback {
            match attempt(fallback.as_ref(), text, None).await {
                Ok(audio) => {
                    info!("Used fallback TTS ({})", fallback.name());
                    return Some(audio);
                }
                Err(e) => warn!("Fallback TTS ({}) failed: {}", fallback.name(), e),
            }
        }

        None
    }
}

async fn attempt(engine: &dyn SpeechEngine, text: &str, voice: Option<&str>) -> Result<RenderedAudio> {
    let output = engine.synthesize(text, voice).await?;
    if output.bytes.is_empty() {
        anyhow::bail!("engine returned no audio");
    }
    debug!("{} produced {} bytes of {:?}", engine.name(), output.bytes.len(), output.format);
    Ok(RenderedAudio::new(output.bytes, output.format, engine.name()))
}
