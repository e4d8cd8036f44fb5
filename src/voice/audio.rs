//! Audio helpers: WAV containers, loading recordings, playback and saving

use anyhow::{Result, Context, bail};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{AudioClip, RenderedAudio};

/// Sample rate of the native TTS PCM stream
pub const NATIVE_TTS_SAMPLE_RATE: u32 = 24_000;

/// Wrap raw 16-bit little-endian mono PCM in a WAV container
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    use hound::{SampleFormat, WavSpec, WavWriter};

    if pcm.len() % 2 != 0 {
        bail!("PCM data has an odd number of bytes ({})", pcm.len());
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for chunk in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

/// Pull the sample rate out of a mime type such as `audio/L16;codec=pcm;rate=24000`
pub fn sample_rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("rate="))
        .and_then(|rate| rate.parse().ok())
}

/// Load a recording from disk as an audio payload.
///
/// WAV files are checked with `hound` before being sent; other extensions are
/// passed through with a mime type guessed from the extension.
pub fn load_recording(path: &Path) -> Result<AudioClip> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read audio file {}", path.display()))?;

    if bytes.is_empty() {
        bail!("Audio file {} is empty", path.display());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mime_type = match extension.as_str() {
        "wav" | "wave" => {
            let reader = hound::WavReader::new(Cursor::new(&bytes))
                .with_context(|| format!("{} is not a valid WAV file", path.display()))?;
            let spec = reader.spec();
            debug!(
                "Loaded recording: {} Hz, {} channel(s), {} samples",
                spec.sample_rate,
                spec.channels,
                reader.len()
            );
            "audio/wav"
        }
        "mp3" => "audio/mp3",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/aac",
        other => bail!("Unsupported audio format '{}' (use wav, mp3, ogg, flac or aac)", other),
    };

    Ok(AudioClip::new(mime_type, bytes))
}

/// Write rendered audio into a directory; returns the file path
pub fn save_rendered(audio: &RenderedAudio, dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.{}", stem, audio.format().extension()));
    std::fs::write(&path, audio.bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Saved reply audio to: {}", path.display());
    Ok(path)
}

/// Play rendered audio through the default output device and wait for it
#[cfg(feature = "playback")]
pub fn play(audio: &RenderedAudio) -> Result<()> {
    let (_stream, handle) = rodio::OutputStream::try_default()
        .context("No audio output device")?;
    let sink = rodio::Sink::try_new(&handle).context("Failed to open audio sink")?;
    let source = rodio::Decoder::new(Cursor::new(audio.bytes().to_vec()))
        .context("Failed to decode reply audio")?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

#[cfg(not(feature = "playback"))]
pub fn play(_audio: &RenderedAudio) -> Result<()> {
    bail!("Audio playback not enabled. Build with --features playback")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;

    #[test]
    fn test_pcm16_to_wav_header() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, 32767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = pcm16_to_wav(&pcm, NATIVE_TTS_SAMPLE_RATE).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 1000, -1000, 32767]);
    }

    #[test]
    fn test_pcm16_odd_length_rejected() {
        assert!(pcm16_to_wav(&[1, 2, 3], 24_000).is_err());
    }

    #[test]
    fn test_sample_rate_from_mime() {
        assert_eq!(sample_rate_from_mime("audio/L16;codec=pcm;rate=24000"), Some(24_000));
        assert_eq!(sample_rate_from_mime("audio/L16; rate=16000"), Some(16_000));
        assert_eq!(sample_rate_from_mime("audio/wav"), None);
    }

    #[test]
    fn test_load_recording_wav_and_unknown() {
        let dir = tempfile::tempdir().unwrap();

        let wav_path = dir.path().join("hello.wav");
        std::fs::write(&wav_path, pcm16_to_wav(&[0, 0, 1, 0], 16_000).unwrap()).unwrap();
        let clip = load_recording(&wav_path).unwrap();
        assert_eq!(clip.mime_type, "audio/wav");
        assert!(!clip.is_empty());

        let bad_wav = dir.path().join("bad.wav");
        std::fs::write(&bad_wav, b"not a wav").unwrap();
        assert!(load_recording(&bad_wav).is_err());

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();
        assert!(load_recording(&txt).is_err());
    }

    #[test]
    fn test_save_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let audio = RenderedAudio::new(vec![1, 2, 3], AudioFormat::Mp3, "translate");
        let path = save_rendered(&audio, &dir.path().join("out"), "turn-1").unwrap();
        assert!(path.ends_with("turn-1.mp3"));
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
