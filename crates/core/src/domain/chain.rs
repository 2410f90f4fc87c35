//! Serial processor chains
//!
//! `ProcessorChain` is the serializable description of a rack; a
//! `RackProcessor` built from it holds the live processors with their state.

use crate::domain::audio::{ChannelCount, DspError, Result};
use crate::domain::control::{ControlMessage, ParameterReceiver};
use crate::domain::dsp::math::sanitize_sample_rate;
use crate::domain::dsp::side_chain::side_chain_for;
use crate::domain::dsp::{
    AnalogClipper, AnalogClipperParameters, AnalogTone, AnalogToneParameters, AudioDetector,
    AudioDetectorParameters, AudioFilter, AudioFilterParameters, AudioSignalProcessor,
    AutoQEnvelopeFollower, AutoQParameters, DigitalDelay, DigitalDelayParameters, Phaser,
    PhaserParameters, ZvaFilter, ZvaFilterParameters,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Widest frame handed to a frame-capable processor
const MAX_FRAME_CHANNELS: usize = 2;

// ============================================================================
// PROCESSOR KINDS
// ============================================================================

/// Serializable processor description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum ProcessorKind {
    Filter(ZvaFilterParameters),
    Biquad(AudioFilterParameters),
    Detector(AudioDetectorParameters),
    AutoQ(AutoQParameters),
    Phaser(PhaserParameters),
    DigitalDelay(DigitalDelayParameters),
    AnalogTone(AnalogToneParameters),
    AnalogClipper(AnalogClipperParameters),
}

impl ProcessorKind {
    /// Name of the processor this kind builds
    pub fn name(&self) -> &'static str {
        match self {
            ProcessorKind::Filter(_) => "ZvaFilter",
            ProcessorKind::Biquad(_) => "AudioFilter",
            ProcessorKind::Detector(_) => "AudioDetector",
            ProcessorKind::AutoQ(_) => "AutoQEnvelopeFollower",
            ProcessorKind::Phaser(_) => "Phaser",
            ProcessorKind::DigitalDelay(_) => "DigitalDelay",
            ProcessorKind::AnalogTone(_) => "AnalogTone",
            ProcessorKind::AnalogClipper(_) => "AnalogClipper",
        }
    }
}

/// A live processor of any kind
#[derive(Debug)]
pub enum Processor {
    Filter(ZvaFilter),
    Biquad(AudioFilter),
    Detector(AudioDetector),
    AutoQ(AutoQEnvelopeFollower),
    Phaser(Phaser),
    DigitalDelay(DigitalDelay),
    AnalogTone(AnalogTone),
    AnalogClipper(AnalogClipper),
}

impl Processor {
    /// Build, configure and reset a processor
    pub fn from_kind(kind: &ProcessorKind, sample_rate: f64, max_delay_ms: f64) -> Self {
        let mut processor = match kind {
            ProcessorKind::Filter(params) => Processor::Filter(ZvaFilter::with_parameters(*params)),
            ProcessorKind::Biquad(params) => Processor::Biquad(AudioFilter::with_parameters(*params)),
            ProcessorKind::Detector(params) => {
                Processor::Detector(AudioDetector::with_parameters(*params))
            }
            ProcessorKind::AutoQ(params) => {
                Processor::AutoQ(AutoQEnvelopeFollower::with_parameters(*params))
            }
            ProcessorKind::Phaser(params) => Processor::Phaser(Phaser::with_parameters(*params)),
            ProcessorKind::DigitalDelay(params) => Processor::DigitalDelay(
                DigitalDelay::with_side_chain(side_chain_for(&params.side_chain))
                    .with_buffer_length(max_delay_ms),
            ),
            ProcessorKind::AnalogTone(params) => {
                Processor::AnalogTone(AnalogTone::with_parameters(*params))
            }
            ProcessorKind::AnalogClipper(params) => {
                Processor::AnalogClipper(AnalogClipper::with_parameters(*params))
            }
        };

        processor.reset(sample_rate);
        // delay times are in samples, so the delay is configured after its buffers exist
        if let (Processor::DigitalDelay(delay), ProcessorKind::DigitalDelay(params)) =
            (&mut processor, kind)
        {
            delay.set_parameters(*params);
        }
        processor
    }

    /// Apply new parameters of the same kind
    pub fn apply(&mut self, kind: &ProcessorKind) -> Result<()> {
        match (self, kind) {
            (Processor::Filter(p), ProcessorKind::Filter(params)) => p.set_parameters(*params),
            (Processor::Biquad(p), ProcessorKind::Biquad(params)) => p.set_parameters(*params),
            (Processor::Detector(p), ProcessorKind::Detector(params)) => p.set_parameters(*params),
            (Processor::AutoQ(p), ProcessorKind::AutoQ(params)) => p.set_parameters(*params),
            (Processor::Phaser(p), ProcessorKind::Phaser(params)) => p.set_parameters(*params),
            (Processor::DigitalDelay(p), ProcessorKind::DigitalDelay(params)) => {
                p.set_parameters(*params)
            }
            (Processor::AnalogTone(p), ProcessorKind::AnalogTone(params)) => {
                p.set_parameters(*params)
            }
            (Processor::AnalogClipper(p), ProcessorKind::AnalogClipper(params)) => {
                p.set_parameters(*params)
            }
            (processor, kind) => {
                return Err(DspError::ParameterMismatch {
                    expected: processor.name(),
                    found: kind.name(),
                })
            }
        }
        Ok(())
    }

    /// Current parameters as a serializable kind
    pub fn kind(&self) -> ProcessorKind {
        match self {
            Processor::Filter(p) => ProcessorKind::Filter(p.parameters()),
            Processor::Biquad(p) => ProcessorKind::Biquad(p.parameters()),
            Processor::Detector(p) => ProcessorKind::Detector(p.parameters()),
            Processor::AutoQ(p) => ProcessorKind::AutoQ(p.parameters()),
            Processor::Phaser(p) => ProcessorKind::Phaser(p.parameters()),
            Processor::DigitalDelay(p) => ProcessorKind::DigitalDelay(p.parameters()),
            Processor::AnalogTone(p) => ProcessorKind::AnalogTone(p.parameters()),
            Processor::AnalogClipper(p) => ProcessorKind::AnalogClipper(p.parameters()),
        }
    }

    fn as_dyn(&self) -> &dyn AudioSignalProcessor {
        match self {
            Processor::Filter(p) => p,
            Processor::Biquad(p) => p,
            Processor::Detector(p) => p,
            Processor::AutoQ(p) => p,
            Processor::Phaser(p) => p,
            Processor::DigitalDelay(p) => p,
            Processor::AnalogTone(p) => p,
            Processor::AnalogClipper(p) => p,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn AudioSignalProcessor {
        match self {
            Processor::Filter(p) => p,
            Processor::Biquad(p) => p,
            Processor::Detector(p) => p,
            Processor::AutoQ(p) => p,
            Processor::Phaser(p) => p,
            Processor::DigitalDelay(p) => p,
            Processor::AnalogTone(p) => p,
            Processor::AnalogClipper(p) => p,
        }
    }
}

impl AudioSignalProcessor for Processor {
    fn reset(&mut self, sample_rate: f64) -> bool {
        self.as_dyn_mut().reset(sample_rate)
    }

    #[inline]
    fn process_audio_sample(&mut self, xn: f64) -> f64 {
        self.as_dyn_mut().process_audio_sample(xn)
    }

    fn can_process_audio_frame(&self) -> bool {
        self.as_dyn().can_process_audio_frame()
    }

    fn process_audio_frame(&mut self, input: &[f32], output: &mut [f32]) -> Result<()> {
        self.as_dyn_mut().process_audio_frame(input, output)
    }

    fn name(&self) -> &'static str {
        self.as_dyn().name()
    }
}

// ============================================================================
// PROCESSOR CHAIN
// ============================================================================

/// Serial processor chain
///
/// Processors run in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorChain {
    processors: Vec<ProcessorKind>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Add a processor to the end of the chain
    pub fn add(&mut self, processor: ProcessorKind) {
        self.processors.push(processor);
    }

    /// Remove a processor by index
    pub fn remove(&mut self, index: usize) -> Result<()> {
        if index < self.processors.len() {
            self.processors.remove(index);
            Ok(())
        } else {
            Err(DspError::InvalidConfiguration(format!(
                "Processor index {index} out of bounds"
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn kinds(&self) -> &[ProcessorKind] {
        &self.processors
    }

    pub fn clear(&mut self) {
        self.processors.clear();
    }

    /// Create a runtime rack from this chain
    ///
    /// This allocates every processor and delay line up front.
    pub fn create_processor(&self, sample_rate: u32, channels: u16, max_delay_ms: f64) -> RackProcessor {
        let layout = ChannelCount::from_count(channels.max(1));
        let (sample_rate, _) = sanitize_sample_rate(f64::from(sample_rate));

        let slots = self
            .processors
            .iter()
            .map(|kind| RackSlot::new(kind, layout, sample_rate, max_delay_ms))
            .collect();

        info!(
            "Rack created: {} processor(s), {} channel(s) @ {}Hz",
            self.processors.len(),
            layout.count(),
            sample_rate
        );

        RackProcessor {
            slots,
            layout,
            sample_rate,
            control: None,
        }
    }
}

// ============================================================================
// RACK PROCESSOR
// ============================================================================

/// One chain position: a frame processor, or one processor per channel
#[derive(Debug)]
struct RackSlot {
    voices: Vec<Processor>,
    frame_mode: bool,
    bypass: bool,
}

impl RackSlot {
    fn new(kind: &ProcessorKind, layout: ChannelCount, sample_rate: f64, max_delay_ms: f64) -> Self {
        let first = Processor::from_kind(kind, sample_rate, max_delay_ms);
        let frame_mode = first.can_process_audio_frame() && layout.supports_frames();

        let mut voices = vec![first];
        if !frame_mode {
            for _ in 1..layout.count() {
                voices.push(Processor::from_kind(kind, sample_rate, max_delay_ms));
            }
        }

        Self {
            voices,
            frame_mode,
            bypass: false,
        }
    }

    fn process(&mut self, buffer: &mut [f32], channels: usize) -> Result<()> {
        if self.frame_mode {
            let processor = &mut self.voices[0];
            let mut input = [0.0_f32; MAX_FRAME_CHANNELS];
            for frame in buffer.chunks_exact_mut(channels) {
                input[..channels].copy_from_slice(frame);
                processor.process_audio_frame(&input[..channels], frame)?;
            }
        } else {
            for frame in buffer.chunks_exact_mut(channels) {
                for (sample, voice) in frame.iter_mut().zip(self.voices.iter_mut()) {
                    *sample = voice.process_audio_sample(f64::from(*sample)) as f32;
                }
            }
        }
        Ok(())
    }
}

/// Runtime rack holding live processors
///
/// Create from a `ProcessorChain`. Buffers are interleaved `f32`.
#[derive(Debug)]
pub struct RackProcessor {
    slots: Vec<RackSlot>,
    layout: ChannelCount,
    sample_rate: f64,
    control: Option<ParameterReceiver>,
}

impl RackProcessor {
    /// Receive parameter changes from a control thread
    pub fn attach_control(&mut self, receiver: ParameterReceiver) {
        self.control = Some(receiver);
    }

    /// Process an interleaved buffer in place through every active slot
    ///
    /// Pending control messages are applied first.
    pub fn process_block(&mut self, buffer: &mut [f32]) -> Result<()> {
        self.apply_pending_control();

        let channels = usize::from(self.layout.count());
        if buffer.len() % channels != 0 {
            return Err(DspError::InvalidConfiguration(format!(
                "Buffer of {} samples is not a whole number of {channels}-channel frames",
                buffer.len()
            )));
        }

        for slot in &mut self.slots {
            if !slot.bypass {
                slot.process(buffer, channels)?;
            }
        }
        Ok(())
    }

    /// Replace the parameters of the processor in `slot`
    pub fn update(&mut self, slot: usize, kind: &ProcessorKind) -> Result<()> {
        let rack_slot = self.slots.get_mut(slot).ok_or_else(|| {
            DspError::InvalidConfiguration(format!("Processor index {slot} out of bounds"))
        })?;
        for voice in &mut rack_slot.voices {
            voice.apply(kind)?;
        }
        Ok(())
    }

    /// Set bypass state for a processor by index
    pub fn set_bypass(&mut self, slot: usize, bypass: bool) -> bool {
        if let Some(rack_slot) = self.slots.get_mut(slot) {
            rack_slot.bypass = bypass;
            true
        } else {
            false
        }
    }

    pub fn is_bypassed(&self, slot: usize) -> Option<bool> {
        self.slots.get(slot).map(|s| s.bypass)
    }

    /// Reset every processor, reallocating delay lines if the rate changed
    ///
    /// An unusable rate falls back to the same default the processors use.
    pub fn reset(&mut self, sample_rate: f64) {
        let (rate, _) = sanitize_sample_rate(sample_rate);
        debug!("Resetting rack for {rate} Hz");
        for slot in &mut self.slots {
            for voice in &mut slot.voices {
                voice.reset(rate);
            }
        }
        self.sample_rate = rate;
    }

    /// First processor instance in `slot`
    pub fn processor(&self, slot: usize) -> Option<&Processor> {
        self.slots.get(slot).and_then(|s| s.voices.first())
    }

    /// Current chain, as it would be saved
    pub fn snapshot(&self) -> ProcessorChain {
        let mut chain = ProcessorChain::new();
        for slot in &self.slots {
            if let Some(voice) = slot.voices.first() {
                chain.add(voice.kind());
            }
        }
        chain
    }

    pub fn channels(&self) -> ChannelCount {
        self.layout
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn apply_pending_control(&mut self) {
        let Some(receiver) = self.control.take() else {
            return;
        };
        for message in receiver.drain() {
            self.handle_message(message);
        }
        self.control = Some(receiver);
    }

    fn handle_message(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Update { slot, params } => {
                if let Err(err) = self.update(slot, &params) {
                    warn!("Dropped parameter update for slot {slot}: {err}");
                }
            }
            ControlMessage::Bypass { slot, bypass } => {
                if !self.set_bypass(slot, bypass) {
                    warn!("Dropped bypass change for missing slot {slot}");
                }
            }
            ControlMessage::Reset { sample_rate } => self.reset(sample_rate),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
