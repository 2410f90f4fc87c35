//! Circuit models discretized with trapezoidal companion resistances
//!
//! Each capacitor is replaced by a resistor `Ts / 2C` in parallel with a
//! current source carrying its state, which turns the circuits into small
//! resistive networks solved once per sample.

use super::math::{flush_denormal, is_float_equal, sanitize_sample_rate, DEFAULT_SAMPLE_RATE};
use super::AudioSignalProcessor;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

// ============================================================================
// Tone stack
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogToneParameters {
    /// Treble/bass balance in [0, 1]; higher is brighter
    pub tone: f64,
    /// Output volume in [0, 1]
    pub level: f64,
}

impl Default for AnalogToneParameters {
    fn default() -> Self {
        Self { tone: 0.5, level: 0.5 }
    }
}

mod tone_circuit {
    pub const C1: f64 = 0.22e-6;
    pub const C2: f64 = 0.22e-6;
    pub const C3: f64 = 0.22e-6;
    pub const C4: f64 = 1e-6;
    pub const R5: f64 = 220.0;
    pub const R6: f64 = 1000.0;
    pub const R7: f64 = 1000.0;
    pub const R8: f64 = 220.0;
    pub const R9: f64 = 1000.0;
    pub const LEVEL_POT: f64 = 100e3;
    pub const TONE_POT: f64 = 20e3;
}

/// Network values derived from the sample rate and the pot positions
#[derive(Debug, Clone, Copy, Default)]
struct ToneNetwork {
    r1: f64,
    r2: f64,
    r3: f64,
    r11: f64,
    p1: f64,
    p2: f64,
    g2: f64,
    gz: f64,
    gr: f64,
    gs: f64,
    b: [f64; 5],
}

impl ToneNetwork {
    fn solve(sample_rate: f64, tone: f64, level: f64) -> Self {
        use tone_circuit::*;

        let ts = 1.0 / sample_rate;
        let r1 = ts / (2.0 * C1);
        let r2 = ts / (2.0 * C2);
        let r3 = ts / (2.0 * C3);
        let r4 = ts / (2.0 * C4);

        let r10 = LEVEL_POT * (1.0 - level);
        let r11 = LEVEL_POT * level;
        let p1 = TONE_POT * tone;
        let p2 = TONE_POT * (1.0 - tone);

        let g2 = 1.0 + r2 / p1 + R5 / p1;
        let g3 = 1.0 + r3 / p2 + R8 / p2;
        let gx = 1.0 + R7 / (g3 * p2);
        let gz = 1.0 / r1 + 1.0 / R6 + 1.0 / (g2 * p1);
        let go = 1.0 + r10 / r11 + R9 / r11 + r4 / r11;
        let gr = 1.0 + p1 / r2 + R5 / r2;
        let gs = 1.0 + p2 / r3 + R8 / r3;

        let b = [
            gx / (go * R6 * gz),
            gx / (go * gz),
            gx * r2 / (g2 * gz * go * p1),
            -r3 * R7 / (go * g3 * p2),
            -r4 / go,
        ];

        Self { r1, r2, r3, r11, p1, p2, g2, gz, gr, gs, b }
    }
}

/// Passive tone stack with an output level pot
///
/// `tone` and `level` are mapped slightly inside [0, 1] so neither pot leg
/// ever reaches zero resistance.
#[derive(Debug, Clone)]
pub struct AnalogTone {
    parameters: AnalogToneParameters,
    sample_rate: f64,
    network: ToneNetwork,
    state: [f64; 4],
    coefficient_updates: u64,
}

impl AnalogTone {
    pub fn new() -> Self {
        let mut tone = Self {
            parameters: AnalogToneParameters::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            network: ToneNetwork::default(),
            state: [0.0; 4],
            coefficient_updates: 0,
        };
        tone.update_coefficients();
        tone
    }

    pub fn with_parameters(parameters: AnalogToneParameters) -> Self {
        let mut tone = Self::new();
        tone.set_parameters(parameters);
        tone
    }

    pub fn parameters(&self) -> AnalogToneParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: AnalogToneParameters) {
        let changed = !is_float_equal(parameters.tone, self.parameters.tone)
            || !is_float_equal(parameters.level, self.parameters.level);
        self.parameters = parameters;
        if changed {
            self.update_coefficients();
        }
    }

    /// Feed-forward coefficients b0..b4
    pub fn coefficients(&self) -> [f64; 5] {
        self.network.b
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    fn update_coefficients(&mut self) {
        let tone = 1e-7 + 0.999998 * self.parameters.tone.clamp(0.0, 1.0);
        let level = 1e-6 + 0.999999 * self.parameters.level.clamp(0.0, 1.0);
        self.network = ToneNetwork::solve(self.sample_rate, tone, level);
        self.coefficient_updates += 1;
        trace!(
            "Analog tone updated: tone={:.3} level={:.3} @ {}Hz",
            tone,
            level,
            self.sample_rate
        );
    }
}

impl Default for AnalogTone {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for AnalogTone {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("AnalogTone reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.state = [0.0; 4];
        if !is_float_equal(self.sample_rate, sample_rate) {
            self.sample_rate = sample_rate;
            self.update_coefficients();
        }
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let n = &self.network;
        let [x1, x2, x3, x4] = self.state;
        let b = n.b;

        let vo = b[0] * xn + b[1] * x1 + b[2] * x2 + b[3] * x3 + b[4] * x4;
        let vx = xn / (tone_circuit::R6 * n.gz) + x1 / n.gz + x2 * n.r2 / (n.g2 * n.gz * n.p1);

        self.state = [
            flush_denormal((2.0 / n.r1) * vx - x1),
            flush_denormal(
                (2.0 / n.r2) * (vx / n.gr + x2 * (n.p1 + tone_circuit::R5) / n.gr) - x2,
            ),
            flush_denormal(
                (2.0 / n.r3) * (vx / n.gs + x3 * (n.p2 + tone_circuit::R8) / n.gs) - x3,
            ),
            flush_denormal(2.0 * vo / n.r11 + x4),
        ];

        vo
    }

    fn name(&self) -> &'static str {
        "AnalogTone"
    }
}

// ============================================================================
// Diode clipper
// ============================================================================

/// Newton iteration cap, counting the initial residual evaluation
pub const MAX_NEWTON_ITERATIONS: u32 = 50;
/// Residual below which the diode solve is considered converged
pub const NEWTON_THRESHOLD: f64 = 1e-11;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalogClipperParameters {
    /// Gain pot position in [0, 1]
    pub drive: f64,
}

impl Default for AnalogClipperParameters {
    fn default() -> Self {
        Self { drive: 0.5 }
    }
}

/// Outcome of the most recent diode solve
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NewtonReport {
    /// Newton steps taken, always below `MAX_NEWTON_ITERATIONS`
    pub iterations: u32,
    /// |f(Vd)| when the loop stopped
    pub residual: f64,
}

mod clipper_circuit {
    pub const ETA: f64 = 1.0;
    pub const IS: f64 = 1e-15;
    pub const VT: f64 = 26e-3;
    pub const C1: f64 = 47e-9;
    pub const C2: f64 = 51e-12;
    pub const R3_FIXED: f64 = 51_000.0;
    pub const R4: f64 = 4_700.0;
    pub const DRIVE_POT: f64 = 500e3;
}

/// Op-amp stage with anti-parallel diodes in the feedback path
///
/// The diode voltage is found each sample with a damped Newton-Raphson
/// iteration seeded from the previous sample's solution. A step that does
/// not shrink the residual is rejected and the step size halved.
#[derive(Debug, Clone)]
pub struct AnalogClipper {
    parameters: AnalogClipperParameters,
    sample_rate: f64,
    r1: f64,
    r2: f64,
    r3: f64,
    g1: f64,
    g4: f64,
    x1: f64,
    x2: f64,
    vd: f64,
    last_solve: NewtonReport,
    coefficient_updates: u64,
}

impl AnalogClipper {
    pub fn new() -> Self {
        let mut clipper = Self {
            parameters: AnalogClipperParameters::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            r1: 0.0,
            r2: 0.0,
            r3: 0.0,
            g1: 0.0,
            g4: 0.0,
            x1: 0.0,
            x2: 0.0,
            vd: 0.0,
            last_solve: NewtonReport::default(),
            coefficient_updates: 0,
        };
        clipper.update_coefficients();
        clipper
    }

    pub fn with_parameters(parameters: AnalogClipperParameters) -> Self {
        let mut clipper = Self::new();
        clipper.set_parameters(parameters);
        clipper
    }

    pub fn parameters(&self) -> AnalogClipperParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: AnalogClipperParameters) {
        let changed = !is_float_equal(parameters.drive, self.parameters.drive);
        self.parameters = parameters;
        if changed {
            self.update_coefficients();
        }
    }

    pub fn last_solve(&self) -> NewtonReport {
        self.last_solve
    }

    /// Current diode voltage
    pub fn diode_voltage(&self) -> f64 {
        self.vd
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    fn update_coefficients(&mut self) {
        use clipper_circuit::*;

        let ts = 1.0 / self.sample_rate;
        let drive = self.parameters.drive.clamp(0.0, 1.0);
        self.r1 = ts / (2.0 * C1);
        self.r2 = ts / (2.0 * C2);
        self.r3 = R3_FIXED + drive * DRIVE_POT;
        self.g1 = 1.0 + R4 / self.r1;
        self.g4 = 1.0 + self.r1 / R4;
        self.coefficient_updates += 1;
        trace!("Analog clipper updated: drive={:.3} @ {}Hz", drive, self.sample_rate);
    }

    /// KCL residual at the diode node
    #[inline]
    fn residual(&self, p: f64, vd: f64) -> f64 {
        use clipper_circuit::*;
        p + vd / self.r2 + vd / self.r3 + 2.0 * IS * (vd / (ETA * VT)).sinh()
    }

    #[inline]
    fn residual_slope(&self, vd: f64) -> f64 {
        use clipper_circuit::*;
        2.0 * IS / (ETA * VT) * (vd / (ETA * VT)).cosh() + 1.0 / self.r2 + 1.0 / self.r3
    }
}

impl Default for AnalogClipper {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for AnalogClipper {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("AnalogClipper reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.vd = 0.0;
        self.last_solve = NewtonReport::default();
        self.sample_rate = sample_rate;
        self.update_coefficients();
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let r4 = clipper_circuit::R4;
        let p = -xn / (self.g4 * r4) + self.r1 / (self.g4 * r4) * self.x1 - self.x2;

        let mut vd = self.vd;
        let mut iteration = 1;
        let mut step = 1.0;
        let mut fd = self.residual(p, vd);
        while iteration < MAX_NEWTON_ITERATIONS && fd.abs() > NEWTON_THRESHOLD {
            let candidate = vd - step * fd / self.residual_slope(vd);
            if self.residual(p, candidate).abs() < fd.abs() {
                vd = candidate;
                step = 1.0;
            } else {
                step *= 0.5;
            }
            fd = self.residual(p, vd);
            iteration += 1;
        }

        self.vd = vd;
        self.last_solve = NewtonReport {
            iterations: iteration - 1,
            residual: fd.abs(),
        };

        let vo = vd + xn;
        self.x1 = flush_denormal((2.0 / self.r1) * (xn / self.g1 + self.x1 * r4 / self.g1) - self.x1);
        self.x2 = flush_denormal((2.0 / self.r2) * vd - self.x2);
        vo
    }

    fn name(&self) -> &'static str {
        "AnalogClipper"
    }
}
