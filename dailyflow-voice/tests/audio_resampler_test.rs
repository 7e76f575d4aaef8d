//! Integration tests for the audio resampler
//!
//! Covers the streaming microphone path (device rate to 16kHz) and the
//! whole-buffer speech path (24kHz to the speaker rate).

use dailyflow_voice::audio::{AudioError, AudioResampler};

fn sine(frequency: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
    let total = (secs * sample_rate as f32) as usize;
    (0..total)
        .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
        .collect()
}

fn stream_through(resampler: &mut AudioResampler, input: &[f32], piece: usize) -> Vec<f32> {
    let mut output = Vec::new();
    for chunk in input.chunks(piece) {
        output.extend(resampler.process(chunk).unwrap());
    }
    output
}

#[test]
fn test_resampler_48khz_to_16khz_streaming() {
    println!("\n=== Resampler Streaming Test: 48kHz -> 16kHz ===");

    let mut resampler = AudioResampler::new(48000, 16000).unwrap();
    println!("  Chunk size: {} samples", resampler.chunk_size());

    // cpal callbacks rarely line up with the internal chunk size
    let input = sine(440.0, 48000, 1.0);
    let output = stream_through(&mut resampler, &input, 441);

    println!("  Output samples: {}", output.len());
    println!("  Held back: {}", resampler.pending_len());

    assert!(resampler.pending_len() < resampler.chunk_size());
    assert!(
        (output.len() as i32 - 16000).abs() < 1000,
        "Expected ~16000 output samples, got {}",
        output.len()
    );

    let peak = output.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
    println!("  Max amplitude: {:.4}", peak);
    assert!(peak > 0.5 && peak <= 1.01, "Signal amplitude should be preserved");
}

#[test]
fn test_resampler_44khz_to_16khz_streaming() {
    let mut resampler = AudioResampler::new(44100, 16000).unwrap();
    assert!((resampler.ratio() - 16000.0 / 44100.0).abs() < 1e-9);

    let input = sine(1000.0, 44100, 0.5);
    let output = stream_through(&mut resampler, &input, 512);

    assert!(
        (output.len() as i32 - 8000).abs() < 800,
        "Expected ~8000 output samples, got {}",
        output.len()
    );
}

#[test]
fn test_resampler_reset_drops_pending_input() {
    let mut resampler = AudioResampler::new(48000, 16000).unwrap();

    let output = resampler.process(&[0.1; 10]).unwrap();
    assert!(output.is_empty());
    assert_eq!(resampler.pending_len(), 10);

    resampler.reset();
    assert_eq!(resampler.pending_len(), 0);
}

#[test]
fn test_resample_all_exact_length() {
    println!("\n=== Whole-buffer Resample Test: 24kHz -> 48kHz ===");

    let mut resampler = AudioResampler::new(24000, 48000).unwrap();

    for len in [1, 240, 2400, 4801] {
        let input = vec![0.2; len];
        let output = resampler.resample_all(&input).unwrap();
        println!("  {} -> {} samples", len, output.len());
        assert_eq!(output.len(), len * 2);
    }

    assert!(resampler.resample_all(&[]).unwrap().is_empty());
}

#[test]
fn test_resample_all_preserves_timing() {
    let mut resampler = AudioResampler::new(24000, 48000).unwrap();

    let input = sine(440.0, 24000, 0.1);
    let output = resampler.resample_all(&input).unwrap();
    let expected = sine(440.0, 48000, 0.1);
    assert_eq!(output.len(), expected.len());

    // Away from the edges the output should follow the ideal waveform
    let worst = output[500..4300]
        .iter()
        .zip(&expected[500..4300])
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    println!("  Worst deviation: {:.4}", worst);
    assert!(worst < 0.1, "Resampled speech should not be delayed");
}

#[test]
fn test_resample_all_calls_are_independent() {
    let mut resampler = AudioResampler::new(24000, 44100).unwrap();
    let input = sine(300.0, 24000, 0.05);

    let first = resampler.resample_all(&input).unwrap();
    let second = resampler.resample_all(&input).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_passthrough_same_rate() {
    let mut resampler = AudioResampler::new(16000, 16000).unwrap();
    assert!(resampler.is_passthrough());
    assert_eq!(resampler.chunk_size(), 0);

    let input = vec![0.1, -0.2, 0.3];
    assert_eq!(resampler.process(&input).unwrap(), input);
    assert_eq!(resampler.resample_all(&input).unwrap(), input);
}

#[test]
fn test_zero_rate_rejected() {
    assert!(matches!(
        AudioResampler::new(0, 16000),
        Err(AudioError::ResampleFailed(_))
    ));
    assert!(matches!(
        AudioResampler::new(48000, 0),
        Err(AudioError::ResampleFailed(_))
    ));
}
