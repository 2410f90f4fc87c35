//! Six-stage phaser
//!
//! An LFO sweeps six first-order all-pass stages across their ranges. The
//! cascade output is fed back into its input through a zero-delay loop solved
//! from the stages' G and S values.

use super::biquad::{AudioFilter, AudioFilterParameters, FilterAlgorithm};
use super::lfo::{Lfo, LfoParameters, LfoWaveform};
use super::math::{do_bipolar_modulation, is_float_equal};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};

/// Number of all-pass stages in the cascade
pub const PHASER_STAGES: usize = 6;

/// Per-stage sweep ranges (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaserRangeSet {
    /// Decade-wide ranges
    Ideal,
    /// Ranges from the National Semiconductor application note
    NationalSemiconductor,
}

impl PhaserRangeSet {
    pub fn ranges(&self) -> [(f64, f64); PHASER_STAGES] {
        match self {
            PhaserRangeSet::Ideal => [
                (16.0, 1600.0),
                (33.0, 3300.0),
                (48.0, 4800.0),
                (98.0, 9800.0),
                (160.0, 16000.0),
                (260.0, 20480.0),
            ],
            PhaserRangeSet::NationalSemiconductor => [
                (32.0, 1500.0),
                (68.0, 3400.0),
                (96.0, 4800.0),
                (212.0, 10000.0),
                (320.0, 16000.0),
                (636.0, 20480.0),
            ],
        }
    }
}

/// Dry/wet coefficient pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaserMixDesign {
    MinusThreeDb,
    NationalSemiconductor,
    Ideal,
    Other,
}

impl PhaserMixDesign {
    /// (dry, wet)
    pub fn coefficients(&self) -> (f64, f64) {
        match self {
            PhaserMixDesign::MinusThreeDb => (0.707, 0.707),
            PhaserMixDesign::NationalSemiconductor => (0.5, 5.0),
            PhaserMixDesign::Ideal => (0.125, 1.25),
            PhaserMixDesign::Other => (0.25, 2.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaserParameters {
    pub lfo_rate_hz: f64,
    pub lfo_depth_pct: f64,
    pub lfo_waveform: LfoWaveform,
    pub intensity_pct: f64,
    pub quad_phase_lfo: bool,
    pub apf_ranges: PhaserRangeSet,
    pub mix_design: PhaserMixDesign,
}

impl Default for PhaserParameters {
    fn default() -> Self {
        Self {
            lfo_rate_hz: 0.5,
            lfo_depth_pct: 50.0,
            lfo_waveform: LfoWaveform::Triangle,
            intensity_pct: 0.0,
            quad_phase_lfo: false,
            apf_ranges: PhaserRangeSet::NationalSemiconductor,
            mix_design: PhaserMixDesign::Ideal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Phaser {
    parameters: PhaserParameters,
    apfs: [AudioFilter; PHASER_STAGES],
    lfo: Lfo,
    ranges: [(f64, f64); PHASER_STAGES],
    dry: f64,
    wet: f64,
    alpha0: f64,
}

impl Phaser {
    pub fn new() -> Self {
        let parameters = PhaserParameters::default();
        let stage = AudioFilterParameters {
            algorithm: FilterAlgorithm::Apf1,
            fc: 100.0,
            q: 0.707,
            boost_cut_db: 0.0,
        };
        let mut lfo = Lfo::new();
        lfo.set_parameters(LfoParameters {
            waveform: parameters.lfo_waveform,
            frequency_hz: parameters.lfo_rate_hz,
        });
        let (dry, wet) = parameters.mix_design.coefficients();

        Self {
            parameters,
            apfs: std::array::from_fn(|_| AudioFilter::with_parameters(stage)),
            lfo,
            ranges: parameters.apf_ranges.ranges(),
            dry,
            wet,
            alpha0: 1.0,
        }
    }

    pub fn with_parameters(parameters: PhaserParameters) -> Self {
        let mut phaser = Self::new();
        phaser.set_parameters(parameters);
        phaser
    }

    pub fn parameters(&self) -> PhaserParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: PhaserParameters) {
        if parameters.lfo_waveform != self.parameters.lfo_waveform
            || !is_float_equal(parameters.lfo_rate_hz, self.parameters.lfo_rate_hz)
        {
            self.lfo.set_parameters(LfoParameters {
                waveform: parameters.lfo_waveform,
                frequency_hz: parameters.lfo_rate_hz,
            });
        }
        self.ranges = parameters.apf_ranges.ranges();
        (self.dry, self.wet) = parameters.mix_design.coefficients();
        self.parameters = parameters;
    }

    /// `alpha0` of the most recent sample; 1.0 when intensity is zero
    pub fn feedback_normalizer(&self) -> f64 {
        self.alpha0
    }

    /// Cutoffs the stages ran at on the most recent sample
    pub fn stage_frequencies(&self) -> [f64; PHASER_STAGES] {
        std::array::from_fn(|i| self.apfs[i].parameters().fc)
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.apfs.iter().map(AudioFilter::coefficient_updates).sum()
    }
}

impl Default for Phaser {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for Phaser {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let mut valid = self.lfo.reset(sample_rate);
        for apf in &mut self.apfs {
            valid &= apf.reset(sample_rate);
        }
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let lfo_data = self.lfo.render_audio_output();
        let lfo_value = if self.parameters.quad_phase_lfo {
            lfo_data.quad_phase_output_pos
        } else {
            lfo_data.normal_output
        };
        let depth = self.parameters.lfo_depth_pct / 100.0;
        let modulator = lfo_value * depth;

        // sweep the stages, G values are the per-stage feed-forward gains
        let mut gammas = [0.0; PHASER_STAGES];
        let mut gamma = 1.0;
        for (i, apf) in self.apfs.iter_mut().enumerate() {
            let (min, max) = self.ranges[i];
            let mut params = apf.parameters();
            params.fc = do_bipolar_modulation(modulator, min, max);
            apf.set_parameters(params);
        }
        // every stage is retuned before any G is read, so gamma uses this sample's cutoffs
        for i in 0..PHASER_STAGES {
            gamma *= self.apfs[PHASER_STAGES - 1 - i].g_value();
            gammas[i] = gamma;
        }

        let k = self.parameters.intensity_pct / 100.0;
        self.alpha0 = 1.0 / (1.0 + k * gamma);

        // storage terms propagated through the downstream G products
        let mut sn = self.apfs[PHASER_STAGES - 1].s_value();
        for i in 0..PHASER_STAGES - 1 {
            sn += gammas[PHASER_STAGES - 2 - i] * self.apfs[i].s_value();
        }

        let mut u = self.alpha0 * (xn + k * sn);
        for apf in &mut self.apfs {
            u = apf.process_audio_sample(u);
        }

        self.dry * xn + self.wet * u
    }

    fn name(&self) -> &'static str {
        "Phaser"
    }
}
