//! Device-resident point storage.
//!
//! [`PointStore`] owns the full and coarse buffers together with their valid counts.
//! Streaming writes are sub-range updates at a point offset, bounded by the capacity
//! fixed at the last [`PointStore::allocate`]. [`VisibleBuffer`] is the small,
//! growable buffer the scheduler refills with the culled subset each dirty frame.

use crate::error::Error;
use crate::lod::LodLevel;
use crate::types::{Point, POINT_STRIDE};

/// The graphics collaborator's view of one buffer: allocate N bytes, write bytes at an offset.
pub trait DeviceBuffer {
    /// Replace the buffer with a fresh allocation of at least `size_bytes`. Prior contents are lost.
    fn allocate(&mut self, size_bytes: u64);

    /// Copy `bytes` into the buffer starting at `offset_bytes`. The caller guarantees the range fits.
    fn write(&mut self, offset_bytes: u64, bytes: &[u8]);

    /// Current allocation size in bytes.
    fn size_bytes(&self) -> u64;
}

/// Plain host memory. Used headless and as the reference for what the device should hold.
#[derive(Debug, Default, Clone)]
pub struct HostBuffer {
    bytes: Vec<u8>,
}

impl HostBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decode the first `count` points.
    pub fn points(&self, count: usize) -> Vec<Point> {
        let len = (count * POINT_STRIDE as usize).min(self.bytes.len());
        self.bytes[..len]
            .chunks_exact(POINT_STRIDE as usize)
            .map(bytemuck::pod_read_unaligned::<Point>)
            .collect()
    }
}

impl DeviceBuffer for HostBuffer {
    fn allocate(&mut self, size_bytes: u64) {
        self.bytes = vec![0; size_bytes as usize];
    }

    fn write(&mut self, offset_bytes: u64, bytes: &[u8]) {
        let start = offset_bytes as usize;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Outcome of a clamped write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Point offset the write started at.
    pub offset: usize,
    pub written: usize,
    /// Points past capacity that were discarded.
    pub dropped: usize,
}

/// One buffer plus the bookkeeping that makes `[0, count)` meaningful.
#[derive(Debug)]
struct PointSlot<B> {
    buffer: B,
    capacity: usize,
    count: usize,
    allocated: bool,
}

impl<B: DeviceBuffer> PointSlot<B> {
    fn new(buffer: B) -> Self {
        Self {
            buffer,
            capacity: 0,
            count: 0,
            allocated: false,
        }
    }

    fn allocate(&mut self, capacity: usize) {
        self.buffer.allocate(capacity as u64 * POINT_STRIDE);
        self.capacity = capacity;
        self.count = 0;
        self.allocated = true;
    }

    fn write_at(&mut self, set: LodLevel, offset: usize, points: &[Point]) -> WriteReport {
        let room = self.capacity.saturating_sub(offset);
        let written = points.len().min(room);
        let dropped = points.len() - written;

        if dropped > 0 {
            log::warn!(
                "{}",
                Error::BufferOverrun {
                    set,
                    offset,
                    len: points.len(),
                    capacity: self.capacity,
                    dropped,
                }
            );
        }

        if written > 0 {
            let bytes: &[u8] = bytemuck::cast_slice(&points[..written]);
            self.buffer.write(offset as u64 * POINT_STRIDE, bytes);
            self.count = self.count.max(offset + written);
        }

        WriteReport {
            offset,
            written,
            dropped,
        }
    }
}

/// The full and coarse device buffers and their valid lengths.
#[derive(Debug)]
pub struct PointStore<B> {
    full: PointSlot<B>,
    coarse: PointSlot<B>,
}

impl<B: DeviceBuffer> PointStore<B> {
    /// Wrap two unallocated buffers. [`allocate`](Self::allocate) must run before any write.
    pub fn new(full: B, coarse: B) -> Self {
        Self {
            full: PointSlot::new(full),
            coarse: PointSlot::new(coarse),
        }
    }

    fn slot(&self, set: LodLevel) -> &PointSlot<B> {
        match set {
            LodLevel::Full => &self.full,
            LodLevel::Coarse => &self.coarse,
        }
    }

    fn slot_mut(&mut self, set: LodLevel) -> &mut PointSlot<B> {
        match set {
            LodLevel::Full => &mut self.full,
            LodLevel::Coarse => &mut self.coarse,
        }
    }

    /// (Re)allocate both buffers and reset both counts to zero.
    pub fn allocate(&mut self, full_capacity: usize, coarse_capacity: usize) {
        self.full.allocate(full_capacity);
        self.coarse.allocate(coarse_capacity);
        log::info!(
            "Allocated point store: full={} points ({} B), coarse={} points ({} B)",
            full_capacity,
            self.full.buffer.size_bytes(),
            coarse_capacity,
            self.coarse.buffer.size_bytes(),
        );
    }

    pub fn is_allocated(&self) -> bool {
        self.full.allocated && self.coarse.allocated
    }

    /// Forget all points without touching the allocation.
    pub fn reset_counts(&mut self) {
        self.full.count = 0;
        self.coarse.count = 0;
    }

    /// Write `points` into `set` starting at point `offset`, clamped to capacity.
    pub fn write(&mut self, set: LodLevel, offset: usize, points: &[Point]) -> WriteReport {
        self.slot_mut(set).write_at(set, offset, points)
    }

    /// Append at the current count of `set`.
    pub fn append(&mut self, set: LodLevel, points: &[Point]) -> WriteReport {
        let offset = self.slot(set).count;
        self.write(set, offset, points)
    }

    pub fn count(&self, set: LodLevel) -> usize {
        self.slot(set).count
    }

    pub fn capacity(&self, set: LodLevel) -> usize {
        self.slot(set).capacity
    }

    pub fn remaining(&self, set: LodLevel) -> usize {
        let slot = self.slot(set);
        slot.capacity.saturating_sub(slot.count)
    }

    pub fn full_count(&self) -> usize {
        self.full.count
    }

    pub fn coarse_count(&self) -> usize {
        self.coarse.count
    }

    pub fn buffer(&self, set: LodLevel) -> &B {
        &self.slot(set).buffer
    }
}

/// Growable per-frame buffer for the culled subset.
///
/// Capacity grows to the next power of two (at least `MIN_VISIBLE_POINTS`) and is never
/// shrunk, so steady panning does not reallocate.
#[derive(Debug)]
pub struct VisibleBuffer<B> {
    buffer: B,
    capacity: usize,
    count: usize,
}

pub const MIN_VISIBLE_POINTS: usize = 4096;

impl<B: DeviceBuffer> VisibleBuffer<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            capacity: 0,
            count: 0,
        }
    }

    /// Replace the contents with `points`; returns the number of points now drawable.
    pub fn upload(&mut self, points: &[Point]) -> usize {
        if points.len() > self.capacity {
            let capacity = points.len().next_power_of_two().max(MIN_VISIBLE_POINTS);
            self.buffer.allocate(capacity as u64 * POINT_STRIDE);
            log::debug!("Visible buffer grown to {} points", capacity);
            self.capacity = capacity;
        }
        if !points.is_empty() {
            self.buffer.write(0, bytemuck::cast_slice(points));
        }
        self.count = points.len();
        self.count
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(range: std::ops::Range<usize>) -> Vec<Point> {
        range.map(|i| Point::new(i as f32, -(i as f32))).collect()
    }

    #[test]
    fn allocate_sizes_buffers_and_resets_counts() {
        let mut store = PointStore::new(HostBuffer::new(), HostBuffer::new());
        assert!(!store.is_allocated());
        store.allocate(100, 10);
        assert!(store.is_allocated());
        assert_eq!(store.buffer(LodLevel::Full).size_bytes(), 800);
        assert_eq!(store.buffer(LodLevel::Coarse).size_bytes(), 80);

        store.append(LodLevel::Full, &pts(0..5));
        store.allocate(100, 10);
        assert_eq!(store.full_count(), 0);
    }

    #[test]
    fn appends_land_at_the_current_count() {
        let mut store = PointStore::new(HostBuffer::new(), HostBuffer::new());
        store.allocate(10, 2);

        let a = store.append(LodLevel::Full, &pts(0..4));
        let b = store.append(LodLevel::Full, &pts(4..7));
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 4);
        assert_eq!(store.full_count(), 7);
        assert_eq!(store.buffer(LodLevel::Full).points(7), pts(0..7));
    }

    #[test]
    fn overrunning_write_is_clamped_and_excess_dropped() {
        let mut store = PointStore::new(HostBuffer::new(), HostBuffer::new());
        store.allocate(10, 1);
        store.append(LodLevel::Full, &pts(0..8));

        let report = store.append(LodLevel::Full, &pts(8..13));
        assert_eq!(report.written, 2);
        assert_eq!(report.dropped, 3);
        assert_eq!(store.full_count(), 10);
        assert_eq!(store.remaining(LodLevel::Full), 0);
        assert_eq!(store.buffer(LodLevel::Full).bytes().len(), 80);
        assert_eq!(store.buffer(LodLevel::Full).points(10), pts(0..10));

        let full = store.append(LodLevel::Full, &pts(0..1));
        assert_eq!(full.written, 0);
        assert_eq!(full.dropped, 1);
    }

    #[test]
    fn sets_are_independent() {
        let mut store = PointStore::new(HostBuffer::new(), HostBuffer::new());
        store.allocate(10, 3);
        store.append(LodLevel::Coarse, &pts(100..102));
        assert_eq!(store.coarse_count(), 2);
        assert_eq!(store.full_count(), 0);
        assert_eq!(store.capacity(LodLevel::Coarse), 3);
    }

    #[test]
    fn visible_buffer_grows_by_powers_of_two_and_never_shrinks() {
        let mut visible = VisibleBuffer::new(HostBuffer::new());
        assert_eq!(visible.upload(&pts(0..10)), 10);
        assert_eq!(visible.capacity(), MIN_VISIBLE_POINTS);

        visible.upload(&pts(0..5000));
        assert_eq!(visible.capacity(), 8192);
        assert_eq!(visible.buffer().points(5000), pts(0..5000));

        assert_eq!(visible.upload(&[]), 0);
        assert_eq!(visible.capacity(), 8192);
    }
}
