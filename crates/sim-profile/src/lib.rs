//! Persona synthesis and simulation-parameter generation.

pub mod config_synth;
pub mod error;
pub mod json_repair;
pub mod synthesizer;

pub use config_synth::ConfigSynthesizer;
pub use error::{Error, Result};
pub use synthesizer::{EntityClass, GenerateAllOptions, Platform, ProfileSynthesizer};
