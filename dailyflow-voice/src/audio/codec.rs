use crate::audio::error::DecodeError;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Sample rate of microphone audio sent to the service
pub const INPUT_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of speech received from the service
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// MIME type tag attached to every outbound chunk
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Convert one normalized float sample to signed 16-bit PCM
///
/// The sample is clamped to [-1.0, 1.0]. Negative values scale by 32768 and
/// non-negative values by 32767, so both ends of the range map exactly onto
/// `i16::MIN` and `i16::MAX`. The scaled value truncates toward zero. NaN
/// encodes as silence.
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }

    let clamped = sample.clamp(-1.0, 1.0);
    let scaled = if clamped < 0.0 {
        clamped * 32768.0
    } else {
        clamped * 32767.0
    };

    scaled as i16
}

/// Convert one signed 16-bit PCM sample back to a float in [-1.0, 1.0)
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Serialize PCM samples as little-endian bytes
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Parse little-endian bytes into PCM samples
///
/// A trailing odd byte is ignored; callers validate alignment first.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode mono float samples into the base64 PCM16 payload the service expects
///
/// An empty input yields an empty string.
pub fn encode_outbound(samples: &[f32]) -> String {
    let pcm: Vec<i16> = samples.iter().map(|&s| f32_to_i16(s)).collect();
    STANDARD.encode(i16_to_le_bytes(&pcm))
}

/// Decode a base64 PCM16 payload into per-channel float samples
///
/// Interleaved input is split into `channels` planes; sample `i` of
/// channel `c` is taken from interleaved index `i * channels + c`.
///
/// # Errors
/// * `DecodeError::Base64` if the text is not valid base64
/// * `DecodeError::Misaligned` if the byte count is not a whole number of frames
/// * `DecodeError::NoChannels` if `channels` is zero
pub fn decode_inbound(payload: &str, channels: u16) -> Result<Vec<Vec<f32>>, DecodeError> {
    if channels == 0 {
        return Err(DecodeError::NoChannels);
    }

    let bytes = STANDARD.decode(payload.trim())?;
    let frame_bytes = channels as usize * 2;
    if bytes.len() % frame_bytes != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            channels,
            frame_bytes,
        });
    }

    let samples = le_bytes_to_i16(&bytes);
    let frames = samples.len() / channels as usize;
    let mut planes: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();

    for frame in samples.chunks_exact(channels as usize) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(i16_to_f32(sample));
        }
    }

    Ok(planes)
}

/// A chunk of captured microphone audio, ready to be sent
///
/// Frames are immutable once produced; ownership moves to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the frame in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Encode the frame into the outbound wire payload
    pub fn to_base64(&self) -> String {
        encode_outbound(&self.samples)
    }
}

/// Decoded speech, stored as one sample plane per channel
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedAudio {
    /// Decode a base64 PCM16 payload at the given rate and channel count
    pub fn from_base64(payload: &str, sample_rate: u32, channels: u16) -> Result<Self, DecodeError> {
        Ok(Self {
            channels: decode_inbound(payload, channels)?,
            sample_rate,
        })
    }

    pub fn from_planes(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Playback duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Average all channels into a single plane
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => (0..self.frame_count())
                .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_extremes() {
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-0.5), -16384);
        assert_eq!(f32_to_i16(0.5), 16383);
    }

    #[test]
    fn test_f32_to_i16_truncates_toward_zero() {
        assert_eq!(f32_to_i16(0.9999 / 32767.0), 0);
        assert_eq!(f32_to_i16(-0.9999 / 32768.0), 0);
        assert_eq!(f32_to_i16(1.7 / 32767.0), 1);
        assert_eq!(f32_to_i16(-1.7 / 32768.0), -1);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(-2.0), i16::MIN);
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(f32::INFINITY), i16::MAX);
        assert_eq!(f32_to_i16(f32::NEG_INFINITY), i16::MIN);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_i16_to_f32_range() {
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(0), 0.0);
        assert!(i16_to_f32(i16::MAX) < 1.0);
    }

    #[test]
    fn test_le_byte_order() {
        let bytes = i16_to_le_bytes(&[0x1234, -1]);
        assert_eq!(bytes, vec![0x34, 0x12, 0xFF, 0xFF]);
        assert_eq!(le_bytes_to_i16(&bytes), vec![0x1234, -1]);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_outbound(&[]), "");
        let planes = decode_inbound("", 1).unwrap();
        assert_eq!(planes.len(), 1);
        assert!(planes[0].is_empty());
    }

    #[test]
    fn test_encode_full_scale() {
        let encoded = encode_outbound(&[-1.0, 1.0]);
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(bytes, vec![0x00, 0x80, 0xFF, 0x7F]);
    }

    #[test]
    fn test_decode_interleaved_stereo() {
        // L0=0, R0=-32768, L1=16384, R1=32767
        let pcm = i16_to_le_bytes(&[0, i16::MIN, 16384, i16::MAX]);
        let payload = STANDARD.encode(pcm);

        let planes = decode_inbound(&payload, 2).unwrap();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0], vec![0.0, 0.5]);
        assert_eq!(planes[1][0], -1.0);
        assert!((planes[1][1] - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        let payload = STANDARD.encode([0u8, 1, 2]);
        let err = decode_inbound(&payload, 1).unwrap_err();
        assert!(matches!(err, DecodeError::Misaligned { len: 3, .. }));
    }

    #[test]
    fn test_decode_rejects_partial_stereo_frame() {
        let payload = STANDARD.encode([0u8; 6]);
        assert!(matches!(
            decode_inbound(&payload, 2),
            Err(DecodeError::Misaligned { len: 6, channels: 2, frame_bytes: 4 })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_inbound("not base64!!", 1),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_zero_channels() {
        assert_eq!(decode_inbound("AAAA", 0), Err(DecodeError::NoChannels));
    }

    #[test]
    fn test_round_trip_within_quantization() {
        let input: Vec<f32> = (0..2000)
            .map(|i| ((i as f32) * 0.013).sin() * 0.9)
            .collect();

        let planes = decode_inbound(&encode_outbound(&input), 1).unwrap();
        assert_eq!(planes[0].len(), input.len());

        for (original, decoded) in input.iter().zip(&planes[0]) {
            assert!(
                (original - decoded).abs() <= 2.0 / 32768.0,
                "{} decoded as {}",
                original,
                decoded
            );
        }
    }

    #[test]
    fn test_audio_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 4096], INPUT_SAMPLE_RATE);
        assert_eq!(frame.len(), 4096);
        assert!((frame.duration_secs() - 0.256).abs() < 1e-9);
        // 8192 bytes -> 2731 base64 quanta
        assert_eq!(frame.to_base64().len(), 10_924);
    }

    #[test]
    fn test_decoded_audio_metrics() {
        let pcm = i16_to_le_bytes(&vec![0i16; 12_000]);
        let audio = DecodedAudio::from_base64(&STANDARD.encode(pcm), OUTPUT_SAMPLE_RATE, 1).unwrap();

        assert_eq!(audio.frame_count(), 12_000);
        assert!((audio.duration_secs() - 0.5).abs() < 1e-12);
        assert_eq!(audio.channel_count(), 1);
    }

    #[test]
    fn test_decoded_audio_to_mono() {
        let audio = DecodedAudio::from_planes(vec![vec![1.0, 0.0], vec![0.0, -1.0]], 24_000);
        assert_eq!(audio.to_mono(), vec![0.5, -0.5]);
    }
}
