//! Shared types used across modules
//!
//! Turns, input payloads and rendered audio live here so the agent and voice
//! modules can share them without depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display label for a user turn whose input was a recording
pub const VOICE_MESSAGE_LABEL: &str = "(voice message)";

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role string used by the Gemini `contents` array
    pub fn to_gemini_string(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

/// A recorded audio clip supplied by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    /// MIME type sent alongside the data, e.g. "audio/wav"
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// WAV clip, the format the recorder produces
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self::new("audio/wav", bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What the conversation keeps of a recording once it has been sent.
///
/// The clip itself goes to the model request and is dropped with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInput {
    pub mime_type: String,
    pub size_bytes: usize,
}

impl From<&AudioClip> for AudioInput {
    fn from(clip: &AudioClip) -> Self {
        Self {
            mime_type: clip.mime_type.clone(),
            size_bytes: clip.bytes.len(),
        }
    }
}

/// One user submission: either a typed line or a recording, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Audio(AudioClip),
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Payload::Audio(_))
    }
}

/// Container format of synthesized audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }
}

/// Synthesized speech for one assistant turn
///
/// Built once by the synthesizer and never modified afterwards; the bytes are
/// only reachable through a shared borrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedAudio {
    #[serde(skip)]
    bytes: Vec<u8>,
    format: AudioFormat,
    /// Name of the engine that produced the audio
    engine: String,
}

impl RenderedAudio {
    pub fn new(bytes: Vec<u8>, format: AudioFormat, engine: impl Into<String>) -> Self {
        Self {
            bytes,
            format,
            engine: engine.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_input: Option<AudioInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered_audio: Option<RenderedAudio>,
    /// Set on the assistant turn that reports an exhausted exchange
    #[serde(default)]
    pub failed: bool,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// User turn from a typed line
    pub fn user_text(content: impl Into<String>) -> Self {
        Self::blank(Role::User, content.into())
    }

    /// User turn for a recording; the content is a fixed label, not typed text
    pub fn user_audio(clip: &AudioClip) -> Self {
        let mut turn = Self::blank(Role::User, VOICE_MESSAGE_LABEL.to_string());
        turn.audio_input = Some(AudioInput::from(clip));
        turn
    }

    /// User turn for whichever modality the payload carries
    pub fn from_payload(payload: &Payload) -> Self {
        match payload {
            Payload::Text(text) => Self::user_text(text.as_str()),
            Payload::Audio(clip) => Self::user_audio(clip),
        }
    }

    /// Assistant turn carrying a parsed reply and whatever audio was produced
    pub fn assistant(
        content: impl Into<String>,
        feedback: impl Into<String>,
        suggestions: Vec<String>,
        pronunciation_score: u8,
        rendered_audio: Option<RenderedAudio>,
    ) -> Self {
        let mut turn = Self::blank(Role::Assistant, content.into());
        turn.feedback = Some(feedback.into());
        turn.suggestions = suggestions;
        turn.pronunciation_score = Some(pronunciation_score.min(100));
        turn.rendered_audio = rendered_audio;
        turn
    }

    /// Assistant turn reporting that no model could answer
    pub fn assistant_failure(content: impl Into<String>) -> Self {
        let mut turn = Self::assistant(content, "", Vec::new(), 0, None);
        turn.failed = true;
        turn
    }

    fn blank(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            audio_input: None,
            feedback: None,
            suggestions: Vec::new(),
            pronunciation_score: None,
            rendered_audio: None,
            failed: false,
            timestamp: Utc::now(),
        }
    }

    pub fn rendered_audio(&self) -> Option<&RenderedAudio> {
        self.rendered_audio.as_ref()
    }

    pub fn has_audio_input(&self) -> bool {
        self.audio_input.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_audio_turn_has_single_modality() {
        let turn = Turn::user_audio(&AudioClip::wav(vec![1, 2, 3]));
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, VOICE_MESSAGE_LABEL);
        assert!(turn.has_audio_input());
    }

    #[test]
    fn test_audio_turn_keeps_only_clip_metadata() {
        let clip = AudioClip::wav(vec![7; 2048]);
        let turn = Turn::from_payload(&Payload::Audio(clip));

        assert_eq!(
            turn.audio_input,
            Some(AudioInput { mime_type: "audio/wav".into(), size_bytes: 2048 })
        );
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["audio_input"], serde_json::json!({"mime_type": "audio/wav", "size_bytes": 2048}));
    }

    #[test]
    fn test_from_payload_text() {
        let turn = Turn::from_payload(&Payload::text("Hello"));
        assert_eq!(turn.content, "Hello");
        assert!(!turn.has_audio_input());
    }

    #[test]
    fn test_failure_turn_defaults() {
        let turn = Turn::assistant_failure("Sorry");
        assert!(turn.failed);
        assert_eq!(turn.feedback.as_deref(), Some(""));
        assert!(turn.suggestions.is_empty());
        assert_eq!(turn.pronunciation_score, Some(0));
        assert!(turn.rendered_audio().is_none());
    }

    #[test]
    fn test_assistant_score_clamped() {
        let turn = Turn::assistant("Hi", "", vec![], 250, None);
        assert_eq!(turn.pronunciation_score, Some(100));
    }

    #[test]
    fn test_role_gemini_strings() {
        assert_eq!(Role::User.to_gemini_string(), "user");
        assert_eq!(Role::Assistant.to_gemini_string(), "model");
    }

    #[test]
    fn test_turn_serialization_skips_audio_bytes() {
        let audio = RenderedAudio::new(vec![0u8; 16], AudioFormat::Mp3, "translate");
        let turn = Turn::assistant("Hi", "Good", vec!["Hello".into()], 80, Some(audio));
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["rendered_audio"]["format"], "mp3");
        assert!(json["rendered_audio"].get("bytes").is_none());
    }
}
