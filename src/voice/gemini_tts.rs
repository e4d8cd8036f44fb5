//! Native TTS through the Gemini speech models
//!
//! Sends the reply text to a TTS-capable model with `responseModalities:
//! ["AUDIO"]` and a prebuilt voice. The model answers with base64 16-bit PCM
//! (24 kHz mono) which is wrapped in a WAV container.

use anyhow::{Result, Context, anyhow};
use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::agent::llm::{GeminiClient, GenerateResponse};
use crate::types::AudioFormat;
use crate::voice::audio::{pcm16_to_wav, sample_rate_from_mime, NATIVE_TTS_SAMPLE_RATE};
use crate::voice::tts::{SpeechEngine, SpeechOutput};

/// Voices the speech models ship with
pub const PREBUILT_VOICES: &[&str] = &[
    "Kore", "Puck", "Charon", "Fenrir", "Aoede", "Leda", "Orus", "Zephyr",
];

/// Primary speech engine
pub struct GeminiTts {
    client: GeminiClient,
    model: String,
    default_voice: String,
}

impl GeminiTts {
    pub fn new(client: GeminiClient, model: impl Into<String>, default_voice: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            default_voice: default_voice.into(),
        }
    }

    /// Create from SpeechConfig
    pub fn from_config(client: GeminiClient, config: &crate::config::SpeechConfig) -> Self {
        Self::new(client, &config.model, &config.voice)
    }
}

/// Check a voice name against the prebuilt list (case-insensitive)
pub fn resolve_voice(voice: &str) -> Option<&'static str> {
    PREBUILT_VOICES
        .iter()
        .copied()
        .find(|v| v.eq_ignore_ascii_case(voice.trim()))
}

/// Build the speech request body
pub fn build_speech_body(text: &str, voice: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": text }]
        }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": {
                        "voiceName": voice
                    }
                }
            }
        }
    })
}

/// Decode the inline audio of a speech response into WAV bytes
pub fn decode_speech_response(body: &str) -> Result<Vec<u8>> {
    let response: GenerateResponse = serde_json::from_str(body)
        .context("Failed to parse speech response")?;

    let inline = response
        .first_parts()
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .ok_or_else(|| anyhow!("Speech response contained no audio"))?;

    let pcm = base64::engine::general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .context("Speech audio is not valid base64")?;

    if pcm.is_empty() {
        return Ok(Vec::new());
    }

    let rate = sample_rate_from_mime(&inline.mime_type).unwrap_or(NATIVE_TTS_SAMPLE_RATE);
    pcm16_to_wav(&pcm, rate)
}

#[async_trait]
impl SpeechEngine for GeminiTts {
    fn name(&self) -> &str {
        "gemini-tts"
    }

    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<SpeechOutput> {
        let requested = voice.unwrap_or(&self.default_voice);
        let voice = resolve_voice(requested)
            .ok_or_else(|| anyhow!("Unsupported voice '{}'", requested))?;

        debug!("Native TTS with voice {}: \"{}\"", voice, crate::truncate_safe(text, 80));

        let body = build_speech_body(text, voice);
        let raw = self
            .client
            .post_generate(&self.model, &body)
            .await
            .map_err(|e| anyhow!("Native TTS request failed: {}", e))?;

        Ok(SpeechOutput {
            bytes: decode_speech_response(&raw)?,
            format: AudioFormat::Wav,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_voice() {
        assert_eq!(resolve_voice("kore"), Some("Kore"));
        assert_eq!(resolve_voice(" Puck "), Some("Puck"));
        assert_eq!(resolve_voice("Darth"), None);
    }

    #[test]
    fn test_speech_body_shape() {
        let body = build_speech_body("Hello", "Kore");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_decode_speech_response() {
        let pcm: Vec<u8> = vec![0, 0, 0x10, 0x00];
        let data = base64::engine::general_purpose::STANDARD.encode(&pcm);
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{ "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": data } }]
                }
            }]
        })
        .to_string();

        let wav = decode_speech_response(&body).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + pcm.len());
    }

    #[test]
    fn test_decode_without_audio_fails() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"I can't speak"}]}}]}"#;
        assert!(decode_speech_response(body).is_err());
    }

    #[tokio::test]
    async fn test_unsupported_voice_fails_before_request() {
        let client = GeminiClient::with_base_url("k", "http://127.0.0.1:9", None);
        let tts = GeminiTts::new(client, "tts-model", "Kore");
        let err = tts.synthesize("Hello", Some("Darth")).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported voice"));
    }
}
