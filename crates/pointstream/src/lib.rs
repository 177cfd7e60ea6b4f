// src/lib.rs
//! Streaming 2-D point sets for interactive scatter rendering.
//!
//! Points are produced by a background generator thread in ordered batches, committed
//! into two parallel point sets (full resolution and a coarse every-Nth sample), each
//! backed by a device buffer and an R-tree. A viewport controller owns pan/scale and
//! the screen↔world transform; the render scheduler decides the level of detail and
//! culls against the active index once per dirty frame.
//!
//! Nothing in this crate touches a GPU API directly. Device memory is reached through
//! the [`store::DeviceBuffer`] trait so every invariant is testable with host memory.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod generator;
pub mod lod;
pub mod scheduler;
pub mod spatial_index;
pub mod store;
pub mod types;
pub mod viewport;

// Re-export commonly used types for convenience.
pub use self::config::{RenderStyle, StreamConfig};
pub use self::coordinator::{Coordinator, Status};
pub use self::error::{Error, Result};
pub use self::generator::{GenerateRequest, GeneratorHandle, GeneratorMessage};
pub use self::lod::{decide_lod, DrawMode, LodLevel};
pub use self::scheduler::{
    DrawSource, DrawUniforms, FramePlan, FrameState, FrameStats, PointLayer, RenderScheduler,
};
pub use self::spatial_index::{IndexEntry, SpatialIndex};
pub use self::store::{DeviceBuffer, HostBuffer, PointStore, VisibleBuffer, WriteReport};
pub use self::types::{Batch, Point, WorldExtent, WorldRect};
pub use self::viewport::{ViewportController, ViewportState};
