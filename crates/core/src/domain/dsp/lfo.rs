//! Low-frequency oscillator driving the phaser sweep

use super::math::{is_float_equal, parabolic_sine, sanitize_sample_rate, DEFAULT_SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LfoWaveform {
    Triangle,
    Sin,
    Saw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LfoParameters {
    pub waveform: LfoWaveform,
    pub frequency_hz: f64,
}

impl Default for LfoParameters {
    fn default() -> Self {
        Self {
            waveform: LfoWaveform::Triangle,
            frequency_hz: 0.0,
        }
    }
}

/// One rendered LFO sample, in four phases
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalGenData {
    pub normal_output: f64,
    pub inverted_output: f64,
    pub quad_phase_output_pos: f64,
    pub quad_phase_output_neg: f64,
}

#[derive(Debug, Clone)]
pub struct Lfo {
    parameters: LfoParameters,
    sample_rate: f64,
    mod_counter: f64,
    mod_counter_qp: f64,
    phase_inc: f64,
}

impl Lfo {
    pub fn new() -> Self {
        Self {
            parameters: LfoParameters::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            mod_counter: 0.0,
            mod_counter_qp: 0.25,
            phase_inc: 0.0,
        }
    }

    pub fn parameters(&self) -> LfoParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: LfoParameters) {
        let rate_changed = !is_float_equal(parameters.frequency_hz, self.parameters.frequency_hz);
        self.parameters = parameters;
        if rate_changed {
            self.phase_inc = self.parameters.frequency_hz / self.sample_rate;
            trace!("LFO rate updated: {:.3}Hz", self.parameters.frequency_hz);
        }
    }

    pub fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("Lfo reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.sample_rate = sample_rate;
        self.phase_inc = self.parameters.frequency_hz / self.sample_rate;
        self.mod_counter = 0.0;
        self.mod_counter_qp = 0.25;
        valid
    }

    /// Render the current sample, then advance the phase
    pub fn render_audio_output(&mut self) -> SignalGenData {
        self.mod_counter = wrap_modulo(self.mod_counter, self.phase_inc);
        self.mod_counter_qp = wrap_modulo(self.mod_counter + 0.25, self.phase_inc.max(0.0));

        let waveform = self.parameters.waveform;
        let normal_output = shape(waveform, self.mod_counter);
        let quad_phase_output_pos = shape(waveform, self.mod_counter_qp);

        self.mod_counter += self.phase_inc;

        SignalGenData {
            normal_output,
            inverted_output: -normal_output,
            quad_phase_output_pos,
            quad_phase_output_neg: -quad_phase_output_pos,
        }
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn wrap_modulo(counter: f64, inc: f64) -> f64 {
    if inc >= 0.0 && counter >= 1.0 {
        counter - 1.0
    } else if inc < 0.0 && counter <= 0.0 {
        counter + 1.0
    } else {
        counter
    }
}

#[inline]
fn shape(waveform: LfoWaveform, counter: f64) -> f64 {
    match waveform {
        LfoWaveform::Triangle => 2.0 * (2.0 * counter - 1.0).abs() - 1.0,
        LfoWaveform::Saw => 2.0 * counter - 1.0,
        LfoWaveform::Sin => parabolic_sine(-(counter * 2.0 * PI - PI)),
    }
}
