#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod config;
mod error;
mod grain;
mod player;
mod playfield;
mod source;

// public, flat re-exports
pub use config::EngineConfig;
pub use error::Error;

pub use grain::{
    cloud::{CloudId, CloudParameters, GrainCloud, GRAIN_MARKER_SIZE},
    Grain,
};
pub use player::{AudioSource, PlayfieldMessage, PlayfieldSource, Player};
pub use playfield::{PanelId, PanelRef, Playfield};
pub use source::{SourceBuffer, SourceId};

// public mods
pub mod output;
pub mod utils;

pub mod outputs {
    //! Set of available output devices.

    #[cfg(feature = "cpal-output")]
    pub use super::output::cpal::CpalOutput;
    pub use super::output::stream::PcmStreamOutput;
    #[cfg(feature = "wav-output")]
    pub use super::output::wav::WavOutput;

    pub use super::output::OutputDevice;
}
