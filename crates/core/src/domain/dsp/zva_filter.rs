//! Zero-delay-feedback virtual analog filter
//!
//! First-order LP/HP/AP and a 2nd-order state-variable core with LP, HP, BP
//! and BS outputs. Cutoffs are pre-warped through the bilinear transform.

use super::math::{
    db_to_linear, flush_denormal, is_float_equal, peak_gain_db_for_q, sanitize_sample_rate,
    soft_clip_waveshaper, DEFAULT_SAMPLE_RATE,
};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{trace, warn};

/// Filter topologies available to `ZvaFilter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaFilterAlgorithm {
    Lpf1,
    Hpf1,
    Apf1,
    SvfLp,
    SvfHp,
    SvfBp,
    SvfBs,
}

impl VaFilterAlgorithm {
    pub fn is_first_order(&self) -> bool {
        matches!(
            self,
            VaFilterAlgorithm::Lpf1 | VaFilterAlgorithm::Hpf1 | VaFilterAlgorithm::Apf1
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZvaFilterParameters {
    pub algorithm: VaFilterAlgorithm,
    pub fc: f64,
    pub q: f64,
    pub output_gain_db: f64,
    /// Pull the input down by half the resonant peak
    pub enable_gain_comp: bool,
    /// Restore the analog magnitude near Nyquist for the low-pass outputs
    pub match_analog_nyquist_lpf: bool,
    /// Remove all damping from the SVF
    pub self_oscillate: bool,
    /// Saturate the band-pass state
    pub enable_nlp: bool,
}

impl Default for ZvaFilterParameters {
    fn default() -> Self {
        Self {
            algorithm: VaFilterAlgorithm::SvfLp,
            fc: 1000.0,
            q: 0.707,
            output_gain_db: 0.0,
            enable_gain_comp: false,
            match_analog_nyquist_lpf: false,
            self_oscillate: false,
            enable_nlp: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZvaFilter {
    parameters: ZvaFilterParameters,
    sample_rate: f64,
    // integrator states
    z0: f64,
    z1: f64,
    // coefficients
    alpha: f64,
    alpha0: f64,
    rho: f64,
    analog_match_sigma: f64,
    // cached gains
    output_gain: f64,
    gain_comp: f64,
    coefficient_updates: u64,
}

impl ZvaFilter {
    pub fn new() -> Self {
        let mut filter = Self {
            parameters: ZvaFilterParameters::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            z0: 0.0,
            z1: 0.0,
            alpha: 0.0,
            alpha0: 0.0,
            rho: 0.0,
            analog_match_sigma: 0.0,
            output_gain: 1.0,
            gain_comp: 1.0,
            coefficient_updates: 0,
        };
        filter.calculate_filter_coeffs();
        filter.update_gains();
        filter
    }

    pub fn with_parameters(parameters: ZvaFilterParameters) -> Self {
        let mut filter = Self::new();
        filter.set_parameters(parameters);
        filter
    }

    pub fn parameters(&self) -> ZvaFilterParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: ZvaFilterParameters) {
        let old = self.parameters;
        let coeffs_changed = parameters.algorithm != old.algorithm
            || !is_float_equal(parameters.fc, old.fc)
            || !is_float_equal(parameters.q, old.q)
            || parameters.self_oscillate != old.self_oscillate
            || parameters.match_analog_nyquist_lpf != old.match_analog_nyquist_lpf;
        let gains_changed = !is_float_equal(parameters.output_gain_db, old.output_gain_db)
            || !is_float_equal(parameters.q, old.q);

        self.parameters = parameters;

        if coeffs_changed {
            self.calculate_filter_coeffs();
        }
        if gains_changed {
            self.update_gains();
        }
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn calculate_filter_coeffs(&mut self) {
        let fc = self.parameters.fc;
        let q = self.parameters.q;

        // bilinear pre-warp
        let wd = 2.0 * PI * fc;
        let t = 1.0 / self.sample_rate;
        let wa = (2.0 / t) * (wd * t / 2.0).tan();
        let g = wa * t / 2.0;

        if self.parameters.algorithm.is_first_order() {
            self.alpha = g / (1.0 + g);
        } else {
            // R is the analog damping factor
            let r = if self.parameters.self_oscillate {
                0.0
            } else {
                1.0 / (2.0 * q)
            };
            self.alpha0 = 1.0 / (1.0 + 2.0 * r * g + g * g);
            self.alpha = g;
            self.rho = 2.0 * r + g;

            let f_o = (self.sample_rate / 2.0) / fc;
            self.analog_match_sigma = 1.0 / (self.alpha * f_o * f_o);
        }

        self.coefficient_updates += 1;
        trace!(
            "ZVA filter updated: {:?} fc={:.1}Hz q={:.3}",
            self.parameters.algorithm,
            fc,
            q
        );
    }

    fn update_gains(&mut self) {
        self.output_gain = db_to_linear(self.parameters.output_gain_db);
        let peak_db = peak_gain_db_for_q(self.parameters.q);
        self.gain_comp = if peak_db > 0.0 {
            db_to_linear(-peak_db / 2.0)
        } else {
            1.0
        };
    }

    #[inline]
    fn process_first_order(&mut self, xn: f64) -> f64 {
        let vn = (xn - self.z0) * self.alpha;
        let lpf = vn + self.z0;
        let hpf = xn - lpf;
        let apf = lpf - hpf;
        self.z0 = flush_denormal(vn + lpf);

        match self.parameters.algorithm {
            VaFilterAlgorithm::Lpf1 if self.parameters.match_analog_nyquist_lpf => {
                lpf + self.alpha * hpf
            }
            VaFilterAlgorithm::Lpf1 => lpf,
            VaFilterAlgorithm::Hpf1 => hpf,
            _ => apf,
        }
    }

    #[inline]
    fn process_svf(&mut self, xn: f64) -> f64 {
        let hpf = self.alpha0 * (xn - self.rho * self.z0 - self.z1);
        let mut bpf = self.alpha * hpf + self.z0;
        if self.parameters.enable_nlp {
            bpf = soft_clip_waveshaper(bpf);
        }
        let lpf = self.alpha * bpf + self.z1;
        let bsf = hpf + lpf;

        let sn = self.z0;
        self.z0 = flush_denormal(self.alpha * hpf + bpf);
        self.z1 = flush_denormal(self.alpha * bpf + lpf);

        match self.parameters.algorithm {
            VaFilterAlgorithm::SvfLp if self.parameters.match_analog_nyquist_lpf => {
                lpf + self.analog_match_sigma * sn
            }
            VaFilterAlgorithm::SvfLp => lpf,
            VaFilterAlgorithm::SvfHp => hpf,
            VaFilterAlgorithm::SvfBp => bpf,
            _ => bsf,
        }
    }
}

impl Default for ZvaFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for ZvaFilter {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("ZvaFilter reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.sample_rate = sample_rate;
        self.z0 = 0.0;
        self.z1 = 0.0;
        self.calculate_filter_coeffs();
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let xn = if self.parameters.enable_gain_comp {
            xn * self.gain_comp
        } else {
            xn
        };

        // output gain only applies to the SVF outputs
        if self.parameters.algorithm.is_first_order() {
            self.process_first_order(xn)
        } else {
            self.process_svf(xn) * self.output_gain
        }
    }

    fn name(&self) -> &'static str {
        "ZvaFilter"
    }
}
