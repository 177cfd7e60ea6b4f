//! Error kinds raised by the streaming core.
//!
//! `CapacityExceeded` and `BufferOverrun` are recovered where they occur (the request
//! or write is clamped and the run continues); they exist as values so the clamp can
//! be logged and asserted on. `GraphicsUnavailable` is terminal for the renderer.

use crate::lod::LodLevel;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("requested {requested} points exceeds the capacity of {capacity}; clamped")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error(
        "{set:?} write of {len} points at offset {offset} passes capacity {capacity}; \
         {dropped} points dropped"
    )]
    BufferOverrun {
        set: LodLevel,
        offset: usize,
        len: usize,
        capacity: usize,
        dropped: usize,
    },

    #[error("graphics unavailable: {0}")]
    GraphicsUnavailable(String),

    #[error("invalid viewport scale {0}")]
    InvalidScale(f32),

    #[error("failed to spawn point generator thread")]
    GeneratorSpawn(#[from] std::io::Error),

    #[error("point generator did not finish within {0:?}")]
    GeneratorTimeout(std::time::Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
