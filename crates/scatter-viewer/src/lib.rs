// src/lib.rs
//! Interactive viewer for streamed 2-D point clouds.
//!
//! The streaming core lives in `pointstream`; this crate supplies the wgpu device
//! buffers and point pipeline, winit input, and the egui controls around it.

pub mod app;
pub mod config;
pub mod input;
pub mod renderer;
pub mod ui;
