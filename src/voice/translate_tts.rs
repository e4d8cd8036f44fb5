//! Fallback TTS using the public translate speech endpoint
//!
//! Fixed default-accent voice, MP3 output. The endpoint only accepts short
//! inputs, so long replies are split into chunks and the MP3 segments are
//! concatenated (MP3 frames stream back to back without re-encoding).

use anyhow::{Result, Context};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::types::AudioFormat;
use crate::voice::tts::{SpeechEngine, SpeechOutput};

/// Longest chunk the endpoint accepts
pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Translate-endpoint TTS client
pub struct TranslateTts {
    client: Client,
    lang: String,
    tld: String,
}

impl TranslateTts {
    pub fn new(lang: &str, tld: &str) -> Self {
        Self {
            client: Client::new(),
            lang: lang.to_string(),
            tld: tld.trim_matches('.').to_string(),
        }
    }

    /// Create from SpeechConfig
    pub fn from_config(config: &crate::config::SpeechConfig) -> Self {
        Self::new(&config.fallback_language, &config.fallback_tld)
    }

    /// Request URL for one chunk
    pub fn chunk_url(&self, chunk: &str, index: usize, total: usize) -> Result<Url> {
        let base = format!("https://translate.google.{}/translate_tts", self.tld);
        let idx = index.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        Url::parse_with_params(
            &base,
            &[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", self.lang.as_str()),
                ("client", "tw-ob"),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
                ("textlen", textlen.as_str()),
            ],
        )
        .with_context(|| format!("Invalid TTS domain 'translate.google.{}'", self.tld))
    }

    async fn fetch_chunk(&self, url: Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .context("Failed to connect to translate TTS")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Translate TTS error ({}): {}",
                status,
                crate::truncate_safe(&body, 200)
            ));
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read translate TTS response")?;
        Ok(bytes.to_vec())
    }
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Prefers breaking after sentence punctuation, then at whitespace; a single
/// word longer than the limit is hard-split.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= max_chars {
            chunks.push(rest.to_string());
            break;
        }

        // Byte offset just past the max_chars-th character
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..limit];

        let split = window
            .rfind(|c: char| matches!(c, '.' | '!' | '?' | ',' | ';' | ':'))
            .map(|i| i + 1)
            .filter(|&i| !window[..i].trim().is_empty())
            .or_else(|| window.rfind(char::is_whitespace).filter(|&i| i > 0))
            .unwrap_or(limit);

        let (head, tail) = rest.split_at(split);
        let head = head.trim();
        if !head.is_empty() {
            chunks.push(head.to_string());
        }
        rest = tail.trim_start();
    }

    chunks
}

#[async_trait]
impl SpeechEngine for TranslateTts {
    fn name(&self) -> &str {
        "translate"
    }

    async fn synthesize(&self, text: &str, _voice: Option<&str>) -> Result<SpeechOutput> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        debug!("Translate TTS: {} chunk(s) for \"{}\"", chunks.len(), crate::truncate_safe(text, 80));

        let mut bytes = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, i, chunks.len())?;
            bytes.extend(self.fetch_chunk(url).await?);
        }

        Ok(SpeechOutput {
            bytes,
            format: AudioFormat::Mp3,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        assert_eq!(chunk_text("  Hello there!  ", 100), vec!["Hello there!"]);
        assert!(chunk_text("   ", 100).is_empty());
    }

    #[test]
    fn test_chunks_respect_limit_and_keep_words() {
        let text = "Great job on your answer. Next time try saying I went to school yesterday, because the action is finished. What did you study there?";
        let chunks = chunk_text(text, 40);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "chunk too long: {chunk}");
        }
        let rejoined = chunks.join(" ");
        assert_eq!(
            rejoined.split_whitespace().collect::<Vec<_>>(),
            text.split_whitespace().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let chunks = chunk_text("Hi there. How are you doing today my friend", 20);
        assert_eq!(chunks[0], "Hi there.");
    }

    #[test]
    fn test_long_word_hard_split() {
        let word = "a".repeat(25);
        let chunks = chunk_text(&word, 10);
        assert_eq!(chunks, vec!["a".repeat(10), "a".repeat(10), "a".repeat(5)]);
    }

    #[test]
    fn test_multibyte_text_is_not_split_mid_char() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, 7);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_chunk_url() {
        let tts = TranslateTts::new("en", "com");
        let url = tts.chunk_url("Hello world", 0, 1).unwrap();
        assert_eq!(url.host_str(), Some("translate.google.com"));
        assert_eq!(url.path(), "/translate_tts");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "Hello world".into())));
        assert!(pairs.contains(&("tl".into(), "en".into())));
        assert!(pairs.contains(&("client".into(), "tw-ob".into())));
    }
}
