//! Frame-driven spectral analysis: band activation and scrolling spectrograms
//! from a stream of byte-scaled FFT frames.

pub mod audio;
pub mod engine;
pub mod error;
pub mod output;
pub mod render;

pub use engine::bands::{Band, BandSet, BandState};
pub use engine::control::{ControlEvent, ControlState, ControlSurface, ScriptedControls};
pub use engine::mapping::{FrequencyMapper, MappingPolicy};
pub use engine::source::{SpectralFrame, SpectralSource};
pub use engine::{Engine, EngineSettings, TickReport, ViewMode};
pub use error::{EngineError, Result};
