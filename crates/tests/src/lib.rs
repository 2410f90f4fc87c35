//! Signal helpers shared by the integration tests

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f64::consts::PI;

pub const SAMPLE_RATE: f64 = 48_000.0;

/// Sine of `amplitude` at `frequency`, starting at phase 0
pub fn generate_sine_wave(frequency: f64, amplitude: f64, samples: usize) -> Vec<f64> {
    (0..samples)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / SAMPLE_RATE).sin())
        .collect()
}

pub fn generate_silence(samples: usize) -> Vec<f64> {
    vec![0.0; samples]
}

/// Unit impulse followed by zeros
pub fn generate_impulse(samples: usize) -> Vec<f64> {
    let mut signal = generate_silence(samples);
    if let Some(first) = signal.first_mut() {
        *first = 1.0;
    }
    signal
}

/// Repeat every mono sample across `channels` interleaved channels
pub fn interleave(mono: &[f64], channels: usize) -> Vec<f32> {
    mono.iter()
        .flat_map(|&x| std::iter::repeat(x as f32).take(channels))
        .collect()
}

/// Pull one channel out of an interleaved buffer
pub fn deinterleave(interleaved: &[f32], channels: usize, channel: usize) -> Vec<f64> {
    interleaved
        .chunks_exact(channels)
        .map(|frame| f64::from(frame[channel]))
        .collect()
}

pub fn peak(signal: &[f64]) -> f64 {
    signal.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

pub fn rms(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
}

/// Amplitude and phase of the `frequency` component, by quadrature projection
///
/// `signal` should span a whole number of periods.
pub fn tone_response(signal: &[f64], frequency: f64, start_index: usize) -> (f64, f64) {
    let n = signal.len() as f64;
    let (mut in_phase, mut quadrature) = (0.0, 0.0);
    for (i, &y) in signal.iter().enumerate() {
        let phase = 2.0 * PI * frequency * (start_index + i) as f64 / SAMPLE_RATE;
        in_phase += y * phase.sin();
        quadrature += y * phase.cos();
    }
    let (a, b) = (2.0 * in_phase / n, 2.0 * quadrature / n);
    ((a * a + b * b).sqrt(), b.atan2(a))
}

/// Magnitude spectrum (no window), bins 0..=N/2
pub fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer[..=signal.len() / 2].iter().map(|c| c.norm()).collect()
}

/// FFT bin holding `frequency` for an `n`-point transform
pub fn bin_for(frequency: f64, n: usize) -> usize {
    (frequency * n as f64 / SAMPLE_RATE).round() as usize
}

/// Level of `bin` relative to `reference`, in dB
pub fn relative_db(spectrum: &[f64], bin: usize, reference: usize) -> f64 {
    20.0 * (spectrum[bin].max(1e-300) / spectrum[reference]).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_finds_tone() {
        let signal = generate_sine_wave(1_000.0, 1.0, 4_800);
        let spectrum = magnitude_spectrum(&signal);
        let bin = bin_for(1_000.0, 4_800);
        assert_eq!(bin, 100);
        let loudest = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(bin));
    }

    #[test]
    fn test_tone_response_of_pure_sine() {
        let signal = generate_sine_wave(1_000.0, 0.5, 4_800);
        let (amplitude, phase) = tone_response(&signal, 1_000.0, 0);
        assert!((amplitude - 0.5).abs() < 1e-9);
        assert!(phase.abs() < 1e-9);
    }

    #[test]
    fn test_interleave_round_trip() {
        let mono = vec![0.25, -0.5, 1.0];
        let stereo = interleave(&mono, 2);
        assert_eq!(stereo.len(), 6);
        assert_eq!(deinterleave(&stereo, 2, 1), mono);
    }
}
