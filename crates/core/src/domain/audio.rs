//! Error type and channel layout shared by every processor
//!
//! Sample processing itself is total over its numeric domain. Errors only
//! surface at structural edges: frame processing with unusable channel
//! counts, chain edits that point at the wrong slot, and similar.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the DSP core
#[derive(Debug, Error, PartialEq)]
pub enum DspError {
    /// The processor only handles single samples
    #[error("{0} does not process audio frames")]
    FrameUnsupported(&'static str),

    /// Frame processing was requested with no channels on one side
    #[error("Empty audio frame: {inputs} input channel(s), {outputs} output channel(s)")]
    EmptyFrame { inputs: usize, outputs: usize },

    /// Invalid configuration for a processor or chain
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A parameter update targeted a processor of a different kind
    #[error("Parameter mismatch: slot holds {expected}, update is for {found}")]
    ParameterMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, DspError>;

/// Channel layout of an interleaved stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
    Surround(u16),
}

impl ChannelCount {
    pub fn count(&self) -> u16 {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
            ChannelCount::Surround(n) => *n,
        }
    }

    pub fn from_count(count: u16) -> Self {
        match count {
            1 => ChannelCount::Mono,
            2 => ChannelCount::Stereo,
            n => ChannelCount::Surround(n),
        }
    }

    /// Whether a stereo frame processor can take the whole frame at once
    pub fn supports_frames(&self) -> bool {
        matches!(self, ChannelCount::Mono | ChannelCount::Stereo)
    }
}
