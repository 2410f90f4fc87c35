//! Auto-Q envelope follower: a detector sweeping a ZVA filter's cutoff

use super::detector::{AudioDetector, AudioDetectorParameters, DetectMode};
use super::math::{
    db_to_linear, do_unipolar_modulation_from_min, is_float_equal, MAX_FILTER_FREQUENCY,
};
use super::zva_filter::{VaFilterAlgorithm, ZvaFilter, ZvaFilterParameters};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoQParameters {
    // Filter parameters
    pub filter_algorithm: VaFilterAlgorithm,
    pub fc: f64,
    pub q: f64,
    pub filter_output_gain_db: f64,
    pub enable_gain_comp: bool,
    pub match_analog_nyquist_lpf: bool,
    pub self_oscillate: bool,
    pub enable_nlp: bool,

    // Detector parameters
    pub attack_time_ms: f64,
    pub release_time_ms: f64,
    pub threshold_db: f64,
    pub sensitivity: f64,
}

impl Default for AutoQParameters {
    fn default() -> Self {
        Self {
            filter_algorithm: VaFilterAlgorithm::SvfLp,
            fc: 1000.0,
            q: 0.707,
            filter_output_gain_db: 0.0,
            enable_gain_comp: false,
            match_analog_nyquist_lpf: true,
            self_oscillate: false,
            enable_nlp: true,
            attack_time_ms: 20.0,
            release_time_ms: 500.0,
            threshold_db: -6.0,
            sensitivity: 1.0,
        }
    }
}

impl AutoQParameters {
    fn filter_parameters(&self) -> ZvaFilterParameters {
        ZvaFilterParameters {
            algorithm: self.filter_algorithm,
            fc: self.fc,
            q: self.q,
            output_gain_db: self.filter_output_gain_db,
            enable_gain_comp: self.enable_gain_comp,
            match_analog_nyquist_lpf: self.match_analog_nyquist_lpf,
            self_oscillate: self.self_oscillate,
            enable_nlp: self.enable_nlp,
        }
    }
}

/// Envelope follower modulating a filter cutoff upward from its base value
///
/// The detector always runs in RMS mode and reports dB; only the level above
/// `threshold_db` moves the cutoff.
#[derive(Debug, Clone)]
pub struct AutoQEnvelopeFollower {
    parameters: AutoQParameters,
    filter: ZvaFilter,
    detector: AudioDetector,
    threshold_value: f64,
}

impl AutoQEnvelopeFollower {
    pub fn new() -> Self {
        let parameters = AutoQParameters::default();
        let detector = AudioDetector::with_parameters(AudioDetectorParameters {
            attack_time_ms: parameters.attack_time_ms,
            release_time_ms: parameters.release_time_ms,
            detect_mode: DetectMode::Rms,
            detect_db: true,
            clamp_to_unity_max: false,
        });

        Self {
            parameters,
            filter: ZvaFilter::with_parameters(parameters.filter_parameters()),
            detector,
            threshold_value: db_to_linear(parameters.threshold_db),
        }
    }

    pub fn with_parameters(parameters: AutoQParameters) -> Self {
        let mut follower = Self::new();
        follower.set_parameters(parameters);
        follower
    }

    pub fn parameters(&self) -> AutoQParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: AutoQParameters) {
        let filter_params = parameters.filter_parameters();
        if filter_params != self.filter.parameters() {
            self.filter.set_parameters(filter_params);
        }

        let detector_params = self.detector.parameters();
        if !is_float_equal(detector_params.attack_time_ms, parameters.attack_time_ms)
            || !is_float_equal(detector_params.release_time_ms, parameters.release_time_ms)
        {
            self.detector.set_parameters(AudioDetectorParameters {
                attack_time_ms: parameters.attack_time_ms,
                release_time_ms: parameters.release_time_ms,
                ..detector_params
            });
        }

        if !is_float_equal(parameters.threshold_db, self.parameters.threshold_db) {
            self.threshold_value = db_to_linear(parameters.threshold_db);
        }
        self.parameters = parameters;
    }

    /// Cutoff the filter is currently running at
    pub fn current_fc(&self) -> f64 {
        self.filter.parameters().fc
    }

    pub fn filter_coefficient_updates(&self) -> u64 {
        self.filter.coefficient_updates()
    }

    /// Cutoff for a detected linear level; the base `fc` at or below threshold
    pub fn modulated_fc(&self, detect_value: f64) -> f64 {
        let delta = detect_value - self.threshold_value;
        if delta > 0.0 {
            let modulator = delta * self.parameters.sensitivity;
            do_unipolar_modulation_from_min(modulator, self.parameters.fc, MAX_FILTER_FREQUENCY)
        } else {
            self.parameters.fc
        }
    }
}

impl Default for AutoQEnvelopeFollower {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for AutoQEnvelopeFollower {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let filter_ok = self.filter.reset(sample_rate);
        let detector_ok = self.detector.reset(sample_rate);
        filter_ok && detector_ok
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let detect_db = self.detector.process_audio_sample(xn);
        let detect_value = db_to_linear(detect_db);

        let mut filter_params = self.filter.parameters();
        filter_params.fc = self.modulated_fc(detect_value);
        self.filter.set_parameters(filter_params);

        self.filter.process_audio_sample(xn)
    }

    fn name(&self) -> &'static str {
        "AutoQEnvelopeFollower"
    }
}
