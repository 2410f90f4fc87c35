//! Signal processors for guitar-pedal style effects
//!
//! This module provides:
//! - Biquad and zero-delay (ZVA) state-variable filters
//! - Envelope detection and an Auto-Q envelope follower
//! - A six-stage phaser and a stereo digital delay
//! - Circuit models of a tone stack and a diode clipper
//!
//! Every processor is a single-threaded state machine. `reset` is the only
//! place that allocates (delay lines), and must run before audio flows.

pub mod analog;
pub mod auto_q;
pub mod biquad;
pub mod circular_buffer;
pub mod delay;
pub mod detector;
pub mod lfo;
pub mod math;
pub mod phaser;
pub mod side_chain;
pub mod zva_filter;

use crate::domain::audio::{DspError, Result};

pub use analog::{
    AnalogClipper, AnalogClipperParameters, AnalogTone, AnalogToneParameters, NewtonReport,
};
pub use auto_q::{AutoQEnvelopeFollower, AutoQParameters};
pub use biquad::{AudioFilter, AudioFilterParameters, BiquadCoeffs, BiquadFilter, FilterAlgorithm};
pub use circular_buffer::CircularBuffer;
pub use delay::{DelayAlgorithm, DelayUpdateType, DigitalDelay, DigitalDelayParameters};
pub use detector::{AudioDetector, AudioDetectorParameters, DetectMode};
pub use lfo::{Lfo, LfoParameters, LfoWaveform, SignalGenData};
pub use phaser::{Phaser, PhaserMixDesign, PhaserParameters, PhaserRangeSet};
pub use side_chain::{
    DuckingParameters, EnvelopeDuckingSideChain, SideChainParameters, SideChainProcessor,
    UnitySideChain,
};
pub use zva_filter::{VaFilterAlgorithm, ZvaFilter, ZvaFilterParameters};

/// Core trait for all signal processors
///
/// Samples are `f64`; frames are interleaved `f32` slices, one entry per
/// channel.
pub trait AudioSignalProcessor: Send + Sync {
    /// Prepare for a sample rate and clear running state
    ///
    /// Returns `false` when the rate was unusable and the processor fell back
    /// to 48 kHz.
    fn reset(&mut self, sample_rate: f64) -> bool;

    /// Process one sample
    fn process_audio_sample(&mut self, xn: f64) -> f64;

    /// Whether `process_audio_frame` handles multichannel frames natively
    fn can_process_audio_frame(&self) -> bool {
        false
    }

    /// Process one frame of `input.len()` channels into `output`
    fn process_audio_frame(&mut self, _input: &[f32], _output: &mut [f32]) -> Result<()> {
        Err(DspError::FrameUnsupported(self.name()))
    }

    /// Process a mono buffer in place, one sample at a time
    fn process_block(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_audio_sample(*sample);
        }
    }

    /// Processor name for debugging/display
    fn name(&self) -> &'static str;
}

/// Parameter limits shared by presets and config validation
pub mod params {
    /// Wet/dry mix range
    pub const MIX_MIN: f64 = 0.0;
    pub const MIX_MAX: f64 = 1.0;

    /// Percent-style controls (depth, intensity, feedback)
    pub const PCT_MIN: f64 = 0.0;
    pub const PCT_MAX: f64 = 100.0;

    /// Pot positions of the circuit models
    pub const POT_MIN: f64 = 0.0;
    pub const POT_MAX: f64 = 1.0;
}
