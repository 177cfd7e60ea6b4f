//! Plain data shared across the pipeline: points, batches and world-space rectangles.

/// A single world-space position. Layout matches the `Float32x2` vertex attribute
/// the point pipeline reads, so a `&[Point]` can be written to a device buffer as-is.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size in bytes of one encoded point (interleaved x, y as f32).
pub const POINT_STRIDE: u64 = std::mem::size_of::<Point>() as u64;

/// One unit of generator output.
///
/// `start_offset` is the global index of `points[0]` within the run's full sequence.
/// The batch is moved across the generator boundary; nothing on the producing side
/// keeps a reference to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub start_offset: usize,
    pub points: Vec<Point>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Global index one past the last point in this batch.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.points.len()
    }
}

/// The coordinate range the generator produces within. Fixed for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldExtent {
    pub width: f32,
    pub height: f32,
}

impl WorldExtent {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for WorldExtent {
    fn default() -> Self {
        Self::new(2000.0, 2000.0)
    }
}

/// Axis-aligned world rectangle, bounds inclusive on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl WorldRect {
    /// Builds a rectangle from two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Grow every side by `margin`.
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }
}
