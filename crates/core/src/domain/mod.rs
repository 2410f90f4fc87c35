//! Domain entities and processing rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod control;
pub mod dsp;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{ChannelCount, DspError};
pub use chain::{Processor, ProcessorChain, ProcessorKind, RackProcessor};
pub use config::{ConfigError, EngineConfig, RackConfig};
pub use control::{parameter_channel, ControlMessage, ParameterReceiver, ParameterSender};
pub use dsp::*;
