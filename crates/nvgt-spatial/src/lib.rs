//! Spatial DSP: the non-HRTF positioning fallback, HRTF-style binaural
//! rendering, and the sound-environment scene/reflections simulator that
//! attaches to sources for occlusion-aware, reverberant playback.

mod basic;
mod environment;
mod error;
mod hrtf;

pub use basic::{apply_basic_position, compute_basic_position, db_convert, BasicPosition, Vec3};
pub use environment::{Material, SoundEnvironment, Triangle, BUILTIN_MATERIALS};
pub use error::{Result, SpatialError};
pub use hrtf::{spatial_blend, BinauralRenderer, Interpolation, ListenerPose, HRTF_FRAME_SIZE};
