//! Pedalboard DSP core
//!
//! Guitar-pedal style signal processors, a serializable processor chain and
//! the runtime rack that runs it over interleaved audio.

pub mod domain;

pub use domain::*;
