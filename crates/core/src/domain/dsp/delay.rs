//! Stereo digital delay with feedback, ping-pong routing and a side chain

use super::circular_buffer::CircularBuffer;
use super::math::{db_to_linear, is_float_equal, sanitize_sample_rate, DEFAULT_SAMPLE_RATE};
use super::side_chain::{side_chain_for, SideChainParameters, SideChainProcessor};
use super::zva_filter::{VaFilterAlgorithm, ZvaFilter, ZvaFilterParameters};
use super::AudioSignalProcessor;
use crate::domain::audio::{DspError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default delay line length (ms)
pub const DEFAULT_BUFFER_LENGTH_MS: f64 = 2000.0;

/// Cutoff of the feedback low-pass used when emulating analog delays (Hz)
pub const ANALOG_FEEDBACK_FC: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayAlgorithm {
    /// Each channel feeds back into itself
    Normal,
    /// Each channel feeds back into the other
    PingPong,
}

/// How the right channel's delay time is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayUpdateType {
    LeftAndRight,
    /// Right delay = left delay * `delay_ratio_pct / 100`
    LeftPlusRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitalDelayParameters {
    pub algorithm: DelayAlgorithm,
    /// Wet amount in [0, 1]
    pub mix: f64,
    pub level_db: f64,
    pub feedback_pct: f64,
    pub update_type: DelayUpdateType,
    pub left_delay_ms: f64,
    pub right_delay_ms: f64,
    pub delay_ratio_pct: f64,
    /// Low-pass the feedback path
    pub emulate_analog: bool,
    pub side_chain: SideChainParameters,
}

impl Default for DigitalDelayParameters {
    fn default() -> Self {
        Self {
            algorithm: DelayAlgorithm::Normal,
            mix: 0.5,
            level_db: -3.0,
            feedback_pct: 0.0,
            update_type: DelayUpdateType::LeftAndRight,
            left_delay_ms: 0.0,
            right_delay_ms: 0.0,
            delay_ratio_pct: 0.0,
            emulate_analog: false,
            side_chain: SideChainParameters::Unity,
        }
    }
}

pub struct DigitalDelay {
    parameters: DigitalDelayParameters,
    sample_rate: f64,
    buffer_length_ms: f64,
    samples_per_ms: f64,
    delay_in_samples_l: f64,
    delay_in_samples_r: f64,
    level: f64,
    buffer_l: CircularBuffer,
    buffer_r: CircularBuffer,
    /// Feedback low-pass per channel (left, right)
    lpf: [ZvaFilter; 2],
    side_chain: Box<dyn SideChainProcessor>,
}

impl std::fmt::Debug for DigitalDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalDelay")
            .field("parameters", &self.parameters)
            .field("sample_rate", &self.sample_rate)
            .field("buffer_length_ms", &self.buffer_length_ms)
            .field("delay_in_samples_l", &self.delay_in_samples_l)
            .field("delay_in_samples_r", &self.delay_in_samples_r)
            .field("side_chain", &self.side_chain.name())
            .finish()
    }
}

impl DigitalDelay {
    /// Delay with the unity side chain; buffers are allocated by `reset`
    pub fn new() -> Self {
        Self::with_side_chain(side_chain_for(&SideChainParameters::Unity))
    }

    pub fn with_side_chain(side_chain: Box<dyn SideChainProcessor>) -> Self {
        let lpf = ZvaFilter::with_parameters(ZvaFilterParameters {
            algorithm: VaFilterAlgorithm::Lpf1,
            fc: ANALOG_FEEDBACK_FC,
            q: 0.707,
            ..Default::default()
        });
        let parameters = DigitalDelayParameters {
            side_chain: side_chain.parameters(),
            ..Default::default()
        };

        Self {
            level: db_to_linear(parameters.level_db),
            parameters,
            sample_rate: 0.0,
            buffer_length_ms: DEFAULT_BUFFER_LENGTH_MS,
            samples_per_ms: DEFAULT_SAMPLE_RATE / 1000.0,
            delay_in_samples_l: 0.0,
            delay_in_samples_r: 0.0,
            buffer_l: CircularBuffer::new(),
            buffer_r: CircularBuffer::new(),
            lpf: [lpf.clone(), lpf],
            side_chain,
        }
    }

    /// Set the line length used by the next buffer allocation
    pub fn with_buffer_length(mut self, buffer_length_ms: f64) -> Self {
        self.buffer_length_ms = buffer_length_ms.max(1.0);
        self
    }

    /// Swap the side-chain strategy; it is reset to the current rate
    pub fn set_side_chain(&mut self, mut side_chain: Box<dyn SideChainProcessor>) {
        side_chain.reset(self.effective_sample_rate());
        self.parameters.side_chain = side_chain.parameters();
        self.side_chain = side_chain;
    }

    pub fn side_chain_name(&self) -> &'static str {
        self.side_chain.name()
    }

    /// (Re)allocate both delay lines
    ///
    /// This is the only allocation point and belongs outside the audio path.
    pub fn create_delay_buffers(&mut self, sample_rate: f64, buffer_length_ms: f64) {
        let (sample_rate, _) = sanitize_sample_rate(sample_rate);
        self.buffer_length_ms = buffer_length_ms.max(1.0);
        self.sample_rate = sample_rate;
        self.samples_per_ms = sample_rate / 1000.0;

        let buffer_length = (self.buffer_length_ms * self.samples_per_ms) as usize + 1;
        self.buffer_l.create_buffer(buffer_length);
        self.buffer_r.create_buffer(buffer_length);
        debug!(
            buffer_length,
            capacity = self.buffer_l.capacity(),
            "Delay buffers created"
        );

        // delay times are stored in samples
        self.update_delay_times();
    }

    pub fn parameters(&self) -> DigitalDelayParameters {
        self.parameters
    }

    pub fn set_parameters(&mut self, parameters: DigitalDelayParameters) {
        if !is_float_equal(parameters.level_db, self.parameters.level_db) {
            self.level = db_to_linear(parameters.level_db);
        }
        // a mode change swaps the boxed strategy
        let current = self.side_chain.parameters();
        if std::mem::discriminant(&current) != std::mem::discriminant(&parameters.side_chain) {
            self.set_side_chain(side_chain_for(&parameters.side_chain));
        } else {
            self.side_chain.set_parameters(&parameters.side_chain);
        }

        self.parameters = DigitalDelayParameters {
            mix: parameters.mix.clamp(0.0, 1.0),
            ..parameters
        };
        self.update_delay_times();
    }

    /// Current delay times in samples (left, right)
    pub fn delay_in_samples(&self) -> (f64, f64) {
        (self.delay_in_samples_l, self.delay_in_samples_r)
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer_l.capacity()
    }

    fn effective_sample_rate(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.sample_rate
        } else {
            DEFAULT_SAMPLE_RATE
        }
    }

    fn update_delay_times(&mut self) {
        let p = self.parameters;
        let left = p.left_delay_ms * self.samples_per_ms;
        let right = match p.update_type {
            DelayUpdateType::LeftAndRight => p.right_delay_ms * self.samples_per_ms,
            DelayUpdateType::LeftPlusRatio => {
                let ratio = (p.delay_ratio_pct / 100.0).clamp(0.0, 1.0);
                left * ratio
            }
        };

        self.delay_in_samples_l = self.clamp_delay(left);
        self.delay_in_samples_r = self.clamp_delay(right);
    }

    fn clamp_delay(&self, delay: f64) -> f64 {
        let max = self.buffer_l.capacity().saturating_sub(1) as f64;
        if !self.buffer_l.is_allocated() {
            return delay.max(0.0);
        }
        if delay > max {
            warn!(delay, max, "Delay time exceeds buffer, clamping");
            return max;
        }
        delay.max(0.0)
    }

    #[inline]
    fn feedback_input(&mut self, channel: usize, xn: f64, yn: f64) -> f64 {
        let feedback = self.parameters.feedback_pct / 100.0 * yn;
        if self.parameters.emulate_analog {
            xn + self.lpf[channel].process_audio_sample(feedback)
        } else {
            xn + feedback
        }
    }

    #[inline]
    fn mix_output(&mut self, xn: f64, yn: f64) -> f64 {
        let mix = self.parameters.mix;
        let wet = self.side_chain.process_audio_sample(xn) * mix;
        ((1.0 - mix) * xn + wet * yn) * self.level
    }
}

impl Default for DigitalDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSignalProcessor for DigitalDelay {
    fn reset(&mut self, sample_rate: f64) -> bool {
        let (rate, valid) = sanitize_sample_rate(sample_rate);
        if !valid {
            warn!("DigitalDelay reset with unusable sample rate, using {rate} Hz");
        }

        if is_float_equal(self.sample_rate, rate) && self.buffer_l.is_allocated() {
            self.buffer_l.flush_buffer();
            self.buffer_r.flush_buffer();
        } else {
            self.create_delay_buffers(rate, self.buffer_length_ms);
        }

        for lpf in &mut self.lpf {
            lpf.reset(rate);
        }
        self.side_chain.reset(rate);
        valid
    }

    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        let yn = self.buffer_l.read_buffer_fractional(self.delay_in_samples_l);
        let dn = self.feedback_input(0, xn, yn);
        self.buffer_l.write_buffer(dn);
        self.mix_output(xn, yn)
    }

    fn can_process_audio_frame(&self) -> bool {
        true
    }

    fn process_audio_frame(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        if input.is_empty() || output.is_empty() {
            return Err(DspError::EmptyFrame {
                inputs: input.len(),
                outputs: output.len(),
            });
        }

        let xn_l = f64::from(input[0]);
        if output.len() == 1 {
            output[0] = self.process_audio_sample(xn_l) as f32;
            return Ok(());
        }

        let xn_r = input.get(1).map_or(xn_l, |&x| f64::from(x));

        let yn_l = self.buffer_l.read_buffer_fractional(self.delay_in_samples_l);
        let yn_r = self.buffer_r.read_buffer_fractional(self.delay_in_samples_r);

        let dn_l = self.feedback_input(0, xn_l, yn_l);
        let dn_r = self.feedback_input(1, xn_r, yn_r);

        match self.parameters.algorithm {
            DelayAlgorithm::Normal => {
                self.buffer_l.write_buffer(dn_l);
                self.buffer_r.write_buffer(dn_r);
            }
            DelayAlgorithm::PingPong => {
                self.buffer_l.write_buffer(dn_r);
                self.buffer_r.write_buffer(dn_l);
            }
        }

        output[0] = self.mix_output(xn_l, yn_l) as f32;
        output[1] = self.mix_output(xn_r, yn_r) as f32;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DigitalDelay"
    }
}
