//! Session configuration for streaming and rendering.

use crate::types::WorldExtent;

/// Hard cap on the full point set.
pub const MAX_TOTAL_POINTS: usize = 1_000_000;
/// Largest batch the generator may emit.
pub const MAX_BATCH_SIZE: usize = 1_000;
/// Auto-LOD switches to the coarse set strictly below this scale.
pub const LOD_THRESHOLD: f32 = 0.6;
/// Wheel sensitivity `k` in `scale * exp(-delta * k)`.
pub const ZOOM_SENSITIVITY: f32 = 0.0012;
pub const SCALE_MIN: f32 = 1e-4;
pub const SCALE_MAX: f32 = 1e4;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of the full point set.
    pub max_total_points: usize,
    /// Points per generator batch.
    pub batch_size: usize,
    /// One coarse point per `coarse_rate` global indices.
    pub coarse_rate: usize,
    pub world: WorldExtent,
    /// Seed for the generator RNG; each run derives its stream from this and its start index.
    pub seed: u64,
    pub lod_threshold: f32,
    pub zoom_sensitivity: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    /// Sets with at most this many points are drawn straight from `[0, count)`.
    pub cull_min_points: usize,
    /// Maximum batches committed per frame tick.
    pub commit_budget: usize,
    /// Bound of the generator → coordinator channel, in messages.
    pub channel_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_total_points: MAX_TOTAL_POINTS,
            batch_size: MAX_BATCH_SIZE,
            coarse_rate: 100,
            world: WorldExtent::default(),
            seed: 0x2d_c0ff_ee,
            lod_threshold: LOD_THRESHOLD,
            zoom_sensitivity: ZOOM_SENSITIVITY,
            scale_min: SCALE_MIN,
            scale_max: SCALE_MAX,
            cull_min_points: 2_048,
            commit_budget: 32,
            channel_depth: 64,
        }
    }
}

impl StreamConfig {
    /// Returns a copy with every field forced into its legal range.
    pub fn validated(mut self) -> Self {
        self.max_total_points = self.max_total_points.max(1);
        self.batch_size = clamp_count(self.batch_size, 1, MAX_BATCH_SIZE);
        self.coarse_rate = clamp_count(self.coarse_rate, 1, self.max_total_points);

        if !(self.world.width.is_finite() && self.world.width > 0.0) {
            self.world.width = WorldExtent::default().width;
        }
        if !(self.world.height.is_finite() && self.world.height > 0.0) {
            self.world.height = WorldExtent::default().height;
        }

        if !(self.scale_min.is_finite() && self.scale_min > 0.0) {
            self.scale_min = SCALE_MIN;
        }
        if !(self.scale_max.is_finite() && self.scale_max >= self.scale_min) {
            self.scale_max = SCALE_MAX.max(self.scale_min);
        }
        if !self.lod_threshold.is_finite() {
            self.lod_threshold = LOD_THRESHOLD;
        }
        if !(self.zoom_sensitivity.is_finite() && self.zoom_sensitivity > 0.0) {
            self.zoom_sensitivity = ZOOM_SENSITIVITY;
        }

        self.commit_budget = self.commit_budget.max(1);
        self.channel_depth = self.channel_depth.max(1);
        self
    }

    /// Capacity of the coarse set: `ceil(max_total_points / coarse_rate)`.
    pub fn coarse_capacity(&self) -> usize {
        self.max_total_points.div_ceil(self.coarse_rate.max(1))
    }
}

/// Render-global appearance; nothing here is per point.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    /// Point diameter in CSS-like pixels before the device pixel ratio.
    pub point_size: f32,
    pub point_color: [f32; 4],
    pub clear_color: [f32; 3],
    /// Upper bound applied to the window's scale factor.
    pub max_device_pixel_ratio: f32,
}

pub const POINT_SIZE_MIN: f32 = 2.0;
pub const POINT_SIZE_MAX: f32 = 20.0;

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            point_size: 4.0,
            point_color: [0.15, 0.45, 0.35, 0.9],
            clear_color: [0.99, 0.99, 0.985],
            max_device_pixel_ratio: 2.0,
        }
    }
}

impl RenderStyle {
    pub fn clamp_point_size(size: f32) -> f32 {
        if size.is_finite() {
            size.clamp(POINT_SIZE_MIN, POINT_SIZE_MAX)
        } else {
            RenderStyle::default().point_size
        }
    }
}

/// Clamp a user-entered count into `[min, max]`.
pub fn clamp_count(value: usize, min: usize, max: usize) -> usize {
    value.clamp(min, max.max(min))
}
