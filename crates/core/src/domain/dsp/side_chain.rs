//! Side-chain strategies for the wet path of `DigitalDelay`
//!
//! A strategy turns the dry input into a gain for the delayed signal. The
//! delay owns exactly one, boxed, and forwards `SideChainParameters` to it on
//! every parameter update.

use super::detector::{AudioDetector, AudioDetectorParameters, DetectMode};
use super::math::{db_to_linear, is_float_equal};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingParameters {
    pub attack_time_ms: f64,
    pub release_time_ms: f64,
    pub threshold_db: f64,
    pub sensitivity: f64,
    pub wet_gain_min_db: f64,
    pub wet_gain_max_db: f64,
}

impl Default for DuckingParameters {
    fn default() -> Self {
        Self {
            attack_time_ms: 5.0,
            release_time_ms: 250.0,
            threshold_db: -12.0,
            sensitivity: 1.0,
            wet_gain_min_db: -20.0,
            wet_gain_max_db: 0.0,
        }
    }
}

/// Parameters for whichever strategy the delay is carrying
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum SideChainParameters {
    #[default]
    Unity,
    Ducking(DuckingParameters),
}

/// Produces a per-sample gain for the delay's wet signal
pub trait SideChainProcessor: Send + Sync {
    fn reset(&mut self, sample_rate: f64) -> bool;

    /// Gain for the wet path given the current dry input
    fn process_audio_sample(&mut self, xn: f64) -> f64;

    /// Apply parameters; variants meant for another strategy are ignored
    fn set_parameters(&mut self, parameters: &SideChainParameters);

    fn parameters(&self) -> SideChainParameters;

    fn name(&self) -> &'static str;
}

/// Always returns 1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitySideChain;

impl SideChainProcessor for UnitySideChain {
    fn reset(&mut self, _sample_rate: f64) -> bool {
        true
    }

    fn process_audio_sample(&mut self, _xn: f64) -> f64 {
        1.0
    }

    fn set_parameters(&mut self, _parameters: &SideChainParameters) {}

    fn parameters(&self) -> SideChainParameters {
        SideChainParameters::Unity
    }

    fn name(&self) -> &'static str {
        "UnitySideChain"
    }
}

/// Envelope-driven wet gain
///
/// Above the threshold the gain follows `(envelope - threshold) * sensitivity`
/// bounded to the wet gain window; at or below it the wet path is untouched.
#[derive(Debug, Clone)]
pub struct EnvelopeDuckingSideChain {
    parameters: DuckingParameters,
    detector: AudioDetector,
    threshold_value: f64,
    wet_gain_min: f64,
    wet_gain_max: f64,
}

impl EnvelopeDuckingSideChain {
    pub fn new(parameters: DuckingParameters) -> Self {
        let detector = AudioDetector::with_parameters(AudioDetectorParameters {
            attack_time_ms: parameters.attack_time_ms,
            release_time_ms: parameters.release_time_ms,
            detect_mode: DetectMode::Peak,
            detect_db: false,
            clamp_to_unity_max: false,
        });

        let mut side_chain = Self {
            parameters,
            detector,
            threshold_value: 0.0,
            wet_gain_min: 0.0,
            wet_gain_max: 1.0,
        };
        side_chain.update_thresholds(parameters);
        side_chain
    }

    /// Wet gain for an already-detected linear level
    pub fn gain_for_level(&self, level: f64) -> f64 {
        let delta = level - self.threshold_value;
        if delta > 0.0 {
            (delta * self.parameters.sensitivity).clamp(self.wet_gain_min, self.wet_gain_max)
        } else {
            1.0
        }
    }

    fn apply(&mut self, parameters: DuckingParameters) {
        let old = self.parameters;
        if !is_float_equal(old.attack_time_ms, parameters.attack_time_ms)
            || !is_float_equal(old.release_time_ms, parameters.release_time_ms)
        {
            let mut detector_params = self.detector.parameters();
            detector_params.attack_time_ms = parameters.attack_time_ms;
            detector_params.release_time_ms = parameters.release_time_ms;
            self.detector.set_parameters(detector_params);
        }

        self.update_thresholds(parameters);
        self.parameters = parameters;
    }

    fn update_thresholds(&mut self, parameters: DuckingParameters) {
        self.threshold_value = db_to_linear(parameters.threshold_db);
        // an inverted window would make clamp() panic
        let min = db_to_linear(parameters.wet_gain_min_db);
        let max = db_to_linear(parameters.wet_gain_max_db);
        self.wet_gain_min = min.min(max);
        self.wet_gain_max = max.max(min);
    }
}

impl Default for EnvelopeDuckingSideChain {
    fn default() -> Self {
        Self::new(DuckingParameters::default())
    }
}

impl SideChainProcessor for EnvelopeDuckingSideChain {
    fn reset(&mut self, sample_rate: f64) -> bool {
        self.detector.reset(sample_rate)
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let level = self.detector.process_audio_sample(xn);
        self.gain_for_level(level)
    }

    fn set_parameters(&mut self, parameters: &SideChainParameters) {
        if let SideChainParameters::Ducking(ducking) = parameters {
            self.apply(*ducking);
        }
    }

    fn parameters(&self) -> SideChainParameters {
        SideChainParameters::Ducking(self.parameters)
    }

    fn name(&self) -> &'static str {
        "EnvelopeDuckingSideChain"
    }
}

/// Build the strategy matching a parameter variant
pub fn side_chain_for(parameters: &SideChainParameters) -> Box<dyn SideChainProcessor> {
    match parameters {
        SideChainParameters::Unity => Box::new(UnitySideChain),
        SideChainParameters::Ducking(ducking) => Box::new(EnvelopeDuckingSideChain::new(*ducking)),
    }
}
