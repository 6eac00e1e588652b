use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Microphone sample rate expected by the remote service
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of audio payloads coming back from the remote service
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// An encoded microphone frame ready for uplink
///
/// Carries base64 16-bit little-endian PCM plus the mime descriptor the
/// remote service uses to identify the encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedFrame {
    /// Base64-encoded PCM bytes
    pub data: String,
    /// Encoding descriptor, e.g. "audio/pcm;rate=16000"
    pub mime_type: String,
}

impl EncodedFrame {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A decoded audio buffer owned by the playback scheduler until played or flushed
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    /// Samples in [-1.0, 1.0], interleaved when multi-channel
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PlaybackChunk {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Encode captured samples for uplink
///
/// Scales each sample from [-1.0, 1.0] to the 16-bit signed range
/// (saturating at the type bounds), packs little-endian and
/// base64-encodes. An empty input yields an empty frame; callers skip
/// sending those.
pub fn encode_frame(samples: &[f32], sample_rate: u32) -> EncodedFrame {
    let mut pcm_bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample * 32768.0) as i16;
        pcm_bytes.extend_from_slice(&value.to_le_bytes());
    }

    let data = if pcm_bytes.is_empty() {
        String::new()
    } else {
        base64::engine::general_purpose::STANDARD.encode(&pcm_bytes)
    };

    EncodedFrame {
        data,
        mime_type: format!("audio/pcm;rate={}", sample_rate),
    }
}

/// Decode a base64 PCM payload into a playable buffer
///
/// Fails on invalid base64 or odd-length byte input; the caller recovers
/// by skipping the chunk.
pub fn decode_frame(data: &str, sample_rate: u32, channels: u16) -> Result<PlaybackChunk> {
    let pcm_bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("invalid base64 in audio payload")?;

    if pcm_bytes.len() % 2 != 0 {
        anyhow::bail!(
            "truncated PCM payload: {} bytes is not a whole number of 16-bit samples",
            pcm_bytes.len()
        );
    }

    let samples: Vec<f32> = pcm_bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();

    Ok(PlaybackChunk {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_empty_buffer_yields_empty_frame() {
        let frame = encode_frame(&[], INPUT_SAMPLE_RATE);
        assert!(frame.is_empty());
        assert_eq!(frame.mime_type, "audio/pcm;rate=16000");
    }

    #[test]
    fn test_encode_mime_descriptor_tracks_rate() {
        let frame = encode_frame(&[0.0], 24000);
        assert_eq!(frame.mime_type, "audio/pcm;rate=24000");
    }

    #[test]
    fn test_encode_packs_little_endian() {
        // 0.5 * 32768 = 16384 = 0x4000
        let frame = encode_frame(&[0.5], INPUT_SAMPLE_RATE);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.data)
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0x40]);
    }

    #[test]
    fn test_encode_saturates_at_full_scale() {
        let frame = encode_frame(&[1.0, -1.0], INPUT_SAMPLE_RATE);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&frame.data)
            .unwrap();
        let high = i16::from_le_bytes([bytes[0], bytes[1]]);
        let low = i16::from_le_bytes([bytes[2], bytes[3]]);
        assert_eq!(high, i16::MAX);
        assert_eq!(low, i16::MIN);
    }

    #[test]
    fn test_roundtrip_within_quantization_error() {
        let samples: Vec<f32> = (0..512)
            .map(|i| ((i as f32) / 512.0 * std::f32::consts::TAU).sin() * 0.8)
            .collect();

        let frame = encode_frame(&samples, INPUT_SAMPLE_RATE);
        let chunk = decode_frame(&frame.data, INPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(chunk.samples.len(), samples.len());
        for (original, decoded) in samples.iter().zip(chunk.samples.iter()) {
            assert!(
                (original - decoded).abs() <= 1.0 / 32768.0,
                "sample {} decoded as {}",
                original,
                decoded
            );
        }
    }

    #[test]
    fn test_roundtrip_silent_frame() {
        let samples = vec![0.0f32; 4096];
        let frame = encode_frame(&samples, INPUT_SAMPLE_RATE);
        let chunk = decode_frame(&frame.data, INPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(chunk.samples.len(), 4096);
        assert!(chunk.samples.iter().all(|s| s.abs() < 1.0 / 32768.0));
    }

    #[test]
    fn test_decode_rejects_odd_length_payload() {
        let odd = base64::engine::general_purpose::STANDARD.encode([0u8, 1, 2]);
        assert!(decode_frame(&odd, OUTPUT_SAMPLE_RATE, 1).is_err());
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode_frame("not base64!!", OUTPUT_SAMPLE_RATE, 1).is_err());
    }

    #[test]
    fn test_chunk_duration() {
        let chunk = PlaybackChunk {
            samples: vec![0.0; 24000],
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: 1,
        };
        assert_eq!(chunk.frame_count(), 24000);
        assert!((chunk.duration() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chunk_duration_stereo() {
        let chunk = PlaybackChunk {
            samples: vec![0.0; 48000],
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: 2,
        };
        assert_eq!(chunk.frame_count(), 24000);
        assert!((chunk.duration() - 1.0).abs() < f64::EPSILON);
    }
}
