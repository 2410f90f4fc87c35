//! Scalar helpers shared by the processors
//!
//! Everything here is a pure function of its inputs and safe to call from
//! the audio thread.

use std::f64::consts::PI;

/// Nominal sample rate used until `reset` supplies a real one
pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

/// Upper bound for modulated filter cutoffs (Hz)
pub const MAX_FILTER_FREQUENCY: f64 = 20_480.0;

/// Lower bound for filter cutoffs (Hz)
pub const MIN_FILTER_FREQUENCY: f64 = 20.0;

/// Tolerance for parameter change detection
pub const FLOAT_EPSILON: f64 = f32::EPSILON as f64;

/// Floor reported by dB conversions for silent input
pub const SILENCE_DB: f64 = -96.0;

/// Parameter comparison used to gate coefficient recomputation
#[inline]
pub fn is_float_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < FLOAT_EPSILON
}

#[inline]
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert linear amplitude to dB, floored at `SILENCE_DB`
#[inline]
pub fn linear_to_db(linear: f64) -> f64 {
    if linear <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * linear.log10()).max(SILENCE_DB)
    }
}

/// Map a unipolar modulator in [0, 1] onto [min, max], starting at `min`
#[inline]
pub fn do_unipolar_modulation_from_min(unipolar: f64, min: f64, max: f64) -> f64 {
    let unipolar = unipolar.clamp(0.0, 1.0);
    unipolar * (max - min) + min
}

/// Map a bipolar modulator in [-1, 1] onto [min, max] around the midpoint
#[inline]
pub fn do_bipolar_modulation(bipolar: f64, min: f64, max: f64) -> f64 {
    let bipolar = bipolar.clamp(-1.0, 1.0);
    let half_range = (max - min) / 2.0;
    bipolar * half_range + min + half_range
}

#[inline]
pub fn unipolar_to_bipolar(value: f64) -> f64 {
    2.0 * value - 1.0
}

#[inline]
pub fn bipolar_to_unipolar(value: f64) -> f64 {
    0.5 * value + 0.5
}

/// Exponential saturator, bounded to (-1, 1)
#[inline]
pub fn soft_clip_waveshaper(xn: f64) -> f64 {
    xn.signum() * (1.0 - (-xn.abs()).exp())
}

/// Parabolic approximation of `sin(angle)` for angle in [-pi, pi]
#[inline]
pub fn parabolic_sine(angle: f64) -> f64 {
    const B: f64 = 4.0 / PI;
    const C: f64 = -4.0 / (PI * PI);
    const P: f64 = 0.225;

    let y = B * angle + C * angle * angle.abs();
    P * (y * y.abs() - y) + y
}

/// Interpolate between `y1` and `y2`; `fraction` in [0, 1)
#[inline]
pub fn linear_interpolation(y1: f64, y2: f64, fraction: f64) -> f64 {
    if fraction >= 1.0 {
        return y2;
    }
    fraction * y2 + (1.0 - fraction) * y1
}

/// Resonant peak of a 2nd-order low-pass for a given Q, in dB
pub fn peak_gain_db_for_q(q: f64) -> f64 {
    if q <= 0.707 {
        return 0.0;
    }
    20.0 * (q * q / (q * q - 0.25).sqrt()).log10()
}

/// Zero out values too small to survive as normal `f32` samples
#[inline]
pub fn flush_denormal(value: f64) -> f64 {
    if value.abs() < f32::MIN_POSITIVE as f64 {
        0.0
    } else {
        value
    }
}

/// Returns the rate to use and whether the requested one was usable
pub fn sanitize_sample_rate(sample_rate: f64) -> (f64, bool) {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        (sample_rate, true)
    } else {
        (DEFAULT_SAMPLE_RATE, false)
    }
}

/// One-pole smoothing coefficient for a time constant in milliseconds
///
/// A non-positive time yields 0.0, meaning the smoother jumps straight to
/// its target.
#[inline]
pub fn time_constant_coeff(time_ms: f64, sample_rate: f64) -> f64 {
    if time_ms <= 0.0 {
        return 0.0;
    }
    (-1.0 / (sample_rate * time_ms * 0.001)).exp()
}
