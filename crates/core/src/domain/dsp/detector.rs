//! Envelope detector with asymmetric attack/release smoothing

use super::math::{
    flush_denormal, is_float_equal, sanitize_sample_rate, time_constant_coeff,
    DEFAULT_SAMPLE_RATE, SILENCE_DB,
};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// What the detector measures before smoothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectMode {
    Peak,
    MeanSquare,
    Rms,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioDetectorParameters {
    pub attack_time_ms: f64,
    pub release_time_ms: f64,
    pub detect_mode: DetectMode,
    /// Report the envelope in dB instead of linear units
    pub detect_db: bool,
    /// Never let the envelope exceed 1.0
    pub clamp_to_unity_max: bool,
}

impl Default for AudioDetectorParameters {
    fn default() -> Self {
        Self {
            attack_time_ms: 20.0,
            release_time_ms: 500.0,
            detect_mode: DetectMode::Peak,
            detect_db: false,
            clamp_to_unity_max: true,
        }
    }
}

/// Peak/MS/RMS envelope follower
#[derive(Debug, Clone)]
pub struct AudioDetector {
    parameters: AudioDetectorParameters,
    sample_rate: f64,
    attack_coeff: f64,
    release_coeff: f64,
    last_envelope: f64,
    coefficient_updates: u64,
}

impl AudioDetector {
    pub fn new() -> Self {
        let mut detector = Self {
            parameters: AudioDetectorParameters::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            last_envelope: 0.0,
            coefficient_updates: 0,
        };
        detector.update_coefficients();
        detector
    }

    pub fn with_parameters(parameters: AudioDetectorParameters) -> Self {
        let mut detector = Self::new();
        detector.set_parameters(parameters);
        detector
    }

    pub fn parameters(&self) -> AudioDetectorParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: AudioDetectorParameters) {
        let times_changed = !is_float_equal(parameters.attack_time_ms, self.parameters.attack_time_ms)
            || !is_float_equal(parameters.release_time_ms, self.parameters.release_time_ms);

        self.parameters = parameters;
        if times_changed {
            self.update_coefficients();
        }
    }

    /// Current smoothed envelope in linear (or squared, for MS) units
    pub fn envelope(&self) -> f64 {
        self.last_envelope
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_constant_coeff(self.parameters.attack_time_ms, self.sample_rate);
        self.release_coeff = time_constant_coeff(self.parameters.release_time_ms, self.sample_rate);
        self.coefficient_updates += 1;
        trace!(
            "Detector updated: attack={:.1}ms release={:.1}ms",
            self.parameters.attack_time_ms,
            self.parameters.release_time_ms
        );
    }
}

impl Default for AudioDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for AudioDetector {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("AudioDetector reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.sample_rate = sample_rate;
        self.last_envelope = 0.0;
        self.update_coefficients();
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let mut input = xn.abs();
        if self.parameters.detect_mode != DetectMode::Peak {
            input *= input;
        }

        let coeff = if input > self.last_envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        let mut envelope = flush_denormal(coeff * (self.last_envelope - input) + input);

        if self.parameters.clamp_to_unity_max {
            envelope = envelope.min(1.0);
        }
        envelope = envelope.max(0.0);
        self.last_envelope = envelope;

        if self.parameters.detect_mode == DetectMode::Rms {
            envelope = envelope.sqrt();
        }

        if !self.parameters.detect_db {
            return envelope;
        }
        if envelope <= 0.0 {
            return SILENCE_DB;
        }
        20.0 * envelope.log10()
    }

    fn name(&self) -> &'static str {
        "AudioDetector"
    }
}
