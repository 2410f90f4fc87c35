//! Biquad filters
//!
//! `BiquadCoeffs` holds a normalized 2nd-order transfer function,
//! `BiquadFilter` runs it in Direct Form I, and `AudioFilter` ties the two to a
//! parameter set with change-gated coefficient updates.

use super::math::{flush_denormal, is_float_equal, sanitize_sample_rate, DEFAULT_SAMPLE_RATE};
use super::AudioSignalProcessor;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{trace, warn};

// ============================================================================
// COEFFICIENTS
// ============================================================================

/// Biquad filter coefficients
///
/// Transfer function `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// First-order low-pass
    #[must_use]
    pub fn lpf1(sample_rate: f64, fc: f64) -> Self {
        let theta_c = 2.0 * PI * fc / sample_rate;
        let gamma = theta_c.cos() / (1.0 + theta_c.sin());

        Self {
            b0: (1.0 - gamma) / 2.0,
            b1: (1.0 - gamma) / 2.0,
            b2: 0.0,
            a1: -gamma,
            a2: 0.0,
        }
    }

    /// First-order high-pass
    #[must_use]
    pub fn hpf1(sample_rate: f64, fc: f64) -> Self {
        let theta_c = 2.0 * PI * fc / sample_rate;
        let gamma = theta_c.cos() / (1.0 + theta_c.sin());

        Self {
            b0: (1.0 + gamma) / 2.0,
            b1: -(1.0 + gamma) / 2.0,
            b2: 0.0,
            a1: -gamma,
            a2: 0.0,
        }
    }

    /// Second-order low-pass
    #[must_use]
    pub fn lpf2(sample_rate: f64, fc: f64, q: f64) -> Self {
        let (beta, gamma) = Self::beta_gamma(sample_rate, fc, q);
        let alpha = (0.5 + beta - gamma) / 2.0;

        Self {
            b0: alpha,
            b1: 2.0 * alpha,
            b2: alpha,
            a1: -2.0 * gamma,
            a2: 2.0 * beta,
        }
    }

    /// Second-order high-pass
    #[must_use]
    pub fn hpf2(sample_rate: f64, fc: f64, q: f64) -> Self {
        let (beta, gamma) = Self::beta_gamma(sample_rate, fc, q);
        let alpha = (0.5 + beta + gamma) / 2.0;

        Self {
            b0: alpha,
            b1: -2.0 * alpha,
            b2: alpha,
            a1: -2.0 * gamma,
            a2: 2.0 * beta,
        }
    }

    /// Second-order band-pass
    #[must_use]
    pub fn bpf2(sample_rate: f64, fc: f64, q: f64) -> Self {
        let k = (PI * fc / sample_rate).tan();
        let delta = k * k * q + k + q;

        Self {
            b0: k / delta,
            b1: 0.0,
            b2: -k / delta,
            a1: 2.0 * q * (k * k - 1.0) / delta,
            a2: (k * k * q - k + q) / delta,
        }
    }

    /// Second-order band-stop
    #[must_use]
    pub fn bsf2(sample_rate: f64, fc: f64, q: f64) -> Self {
        let k = (PI * fc / sample_rate).tan();
        let delta = k * k * q + k + q;

        Self {
            b0: q * (k * k + 1.0) / delta,
            b1: 2.0 * q * (k * k - 1.0) / delta,
            b2: q * (k * k + 1.0) / delta,
            a1: 2.0 * q * (k * k - 1.0) / delta,
            a2: (k * k * q - k + q) / delta,
        }
    }

    /// First-order all-pass, 90 degrees of phase shift at `fc`
    #[must_use]
    pub fn apf1(sample_rate: f64, fc: f64) -> Self {
        let tan = (PI * fc / sample_rate).tan();
        let alpha = (tan - 1.0) / (tan + 1.0);

        Self {
            b0: alpha,
            b1: 1.0,
            b2: 0.0,
            a1: alpha,
            a2: 0.0,
        }
    }

    /// Second-order all-pass, 180 degrees of phase shift at `fc`
    #[must_use]
    pub fn apf2(sample_rate: f64, fc: f64, q: f64) -> Self {
        let bandwidth = fc / q;
        // tan() blows up at pi/2
        let arg_tan = (PI * bandwidth / sample_rate).min(0.95 * PI / 2.0);
        let tan = arg_tan.tan();
        let alpha = (tan - 1.0) / (tan + 1.0);
        let beta = -(2.0 * PI * fc / sample_rate).cos();

        Self {
            b0: -alpha,
            b1: beta * (1.0 - alpha),
            b2: 1.0,
            a1: beta * (1.0 - alpha),
            a2: -alpha,
        }
    }

    /// Low shelf (RBJ cookbook)
    #[must_use]
    pub fn low_shelf(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// High shelf (RBJ cookbook)
    #[must_use]
    pub fn high_shelf(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
        let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Peaking EQ (RBJ cookbook)
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// Evaluate H(e^jw) at `freq`
    pub fn frequency_response(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 + z1 * self.b1 + z2 * self.b2;
        let denominator = 1.0 + z1 * self.a1 + z2 * self.a2;
        numerator / denominator
    }

    fn beta_gamma(sample_rate: f64, fc: f64, q: f64) -> (f64, f64) {
        let theta_c = 2.0 * PI * fc / sample_rate;
        let d = 1.0 / q;
        let half_d_sin = (d / 2.0) * theta_c.sin();
        let beta = 0.5 * (1.0 - half_d_sin) / (1.0 + half_d_sin);
        let gamma = (0.5 + beta) * theta_c.cos();
        (beta, gamma)
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

// ============================================================================
// DIRECT FORM I STATE
// ============================================================================

/// Stateful biquad filter using Direct Form I
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f64,
    x2: f64,
    // Previous output samples (y[n-1], y[n-2])
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a bypass filter (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::default())
    }

    /// Update filter coefficients; state is kept
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f64) -> f64 {
        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;
        let y = flush_denormal(y);

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Instantaneous gain applied to the current input (`b0`)
    #[inline]
    pub fn g_value(&self) -> f64 {
        self.coeffs.b0
    }

    /// Contribution of stored state to the next output
    ///
    /// The next output is `g_value() * x + s_value()`.
    #[inline]
    pub fn s_value(&self) -> f64 {
        self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::bypass()
    }
}

// ============================================================================
// PARAMETERIZED FILTER
// ============================================================================

/// Filter designs available to `AudioFilter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterAlgorithm {
    Lpf1,
    Hpf1,
    Lpf2,
    Hpf2,
    Bpf2,
    Bsf2,
    Apf1,
    Apf2,
    LowShelf,
    HighShelf,
    PeakingEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFilterParameters {
    pub algorithm: FilterAlgorithm,
    pub fc: f64,
    pub q: f64,
    /// Only used by the shelving and peaking designs
    pub boost_cut_db: f64,
}

impl Default for AudioFilterParameters {
    fn default() -> Self {
        Self {
            algorithm: FilterAlgorithm::Lpf1,
            fc: 100.0,
            q: 0.707,
            boost_cut_db: 0.0,
        }
    }
}

/// Biquad with a parameter set and change-gated coefficient updates
#[derive(Debug, Clone)]
pub struct AudioFilter {
    parameters: AudioFilterParameters,
    biquad: BiquadFilter,
    sample_rate: f64,
    coefficient_updates: u64,
}

impl AudioFilter {
    pub fn new() -> Self {
        let mut filter = Self {
            parameters: AudioFilterParameters::default(),
            biquad: BiquadFilter::bypass(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            coefficient_updates: 0,
        };
        filter.calculate_filter_coeffs();
        filter
    }

    pub fn with_parameters(parameters: AudioFilterParameters) -> Self {
        let mut filter = Self::new();
        filter.set_parameters(parameters);
        filter
    }

    pub fn parameters(&self) -> AudioFilterParameters {
        self.parameters
    }

    /// Store new parameters, recomputing coefficients only if they moved
    pub fn set_parameters(&mut self, parameters: AudioFilterParameters) {
        let changed = parameters.algorithm != self.parameters.algorithm
            || !is_float_equal(parameters.fc, self.parameters.fc)
            || !is_float_equal(parameters.q, self.parameters.q)
            || !is_float_equal(parameters.boost_cut_db, self.parameters.boost_cut_db);

        self.parameters = parameters;
        // q <= 0 has no meaningful design
        if self.parameters.q <= 0.0 {
            self.parameters.q = 0.707;
        }

        if changed {
            self.calculate_filter_coeffs();
        }
    }

    pub fn g_value(&self) -> f64 {
        self.biquad.g_value()
    }

    pub fn s_value(&self) -> f64 {
        self.biquad.s_value()
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.biquad.coeffs()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    fn calculate_filter_coeffs(&mut self) {
        let sr = self.sample_rate;
        let p = self.parameters;
        // keep fc below Nyquist so the tan() designs stay finite
        let fc = p.fc.clamp(1.0, 0.49 * sr);

        let coeffs = match p.algorithm {
            FilterAlgorithm::Lpf1 => BiquadCoeffs::lpf1(sr, fc),
            FilterAlgorithm::Hpf1 => BiquadCoeffs::hpf1(sr, fc),
            FilterAlgorithm::Lpf2 => BiquadCoeffs::lpf2(sr, fc, p.q),
            FilterAlgorithm::Hpf2 => BiquadCoeffs::hpf2(sr, fc, p.q),
            FilterAlgorithm::Bpf2 => BiquadCoeffs::bpf2(sr, fc, p.q),
            FilterAlgorithm::Bsf2 => BiquadCoeffs::bsf2(sr, fc, p.q),
            FilterAlgorithm::Apf1 => BiquadCoeffs::apf1(sr, fc),
            FilterAlgorithm::Apf2 => BiquadCoeffs::apf2(sr, fc, p.q),
            FilterAlgorithm::LowShelf => BiquadCoeffs::low_shelf(sr, fc, p.boost_cut_db, p.q),
            FilterAlgorithm::HighShelf => BiquadCoeffs::high_shelf(sr, fc, p.boost_cut_db, p.q),
            FilterAlgorithm::PeakingEq => BiquadCoeffs::peaking(sr, fc, p.boost_cut_db, p.q),
        };

        self.biquad.set_coeffs(coeffs);
        self.coefficient_updates += 1;
        trace!(
            "Biquad updated: {:?} fc={:.1}Hz q={:.3}",
            p.algorithm,
            fc,
            p.q
        );
    }
}

impl Default for AudioFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for AudioFilter {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (sample_rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("AudioFilter reset with unusable sample rate, using {sample_rate} Hz");
        }
        self.biquad.reset();
        self.sample_rate = sample_rate;
        self.calculate_filter_coeffs();
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        self.biquad.process_sample(xn)
    }

    fn name(&self) -> &'static str {
        "AudioFilter"
    }
}
