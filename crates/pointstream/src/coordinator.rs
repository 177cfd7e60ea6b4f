//! Generation coordinator.
//!
//! Receives batches from the active generator run and commits each one to both point
//! sets: device write at the current count, then a bulk insert into the matching index.
//! All mutation of the store and the indices happens here, on the thread that drives the
//! frame loop, so between commits `index.len() == count` holds for both sets.

use crate::config::{clamp_count, StreamConfig};
use crate::error::{Error, Result};
use crate::generator::{GenerateRequest, GeneratorHandle, GeneratorMessage};
use crate::lod::LodLevel;
use crate::scheduler::{PointLayer, RenderScheduler};
use crate::spatial_index::{entries_for, IndexEntry, SpatialIndex};
use crate::store::{DeviceBuffer, PointStore};
use crate::types::{Batch, Point};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// Snapshot for the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    /// Points committed to the full set.
    pub loaded_count: usize,
    pub coarse_count: usize,
    pub generating: bool,
    /// Last cumulative progress reported by the active (or last) run.
    pub progress: usize,
}

impl Status {
    pub fn text(&self) -> String {
        if self.generating {
            format!("Generating... ({})", self.loaded_count)
        } else {
            format!("Loaded {} points", self.loaded_count)
        }
    }
}

struct ActiveRun {
    handle: GeneratorHandle,
    requested: usize,
    started: Instant,
}

enum Received {
    Message(GeneratorMessage),
    Nothing,
    Closed,
}

pub struct Coordinator<B> {
    config: StreamConfig,
    store: PointStore<B>,
    full_index: SpatialIndex,
    coarse_index: SpatialIndex,
    run: Option<ActiveRun>,
    progress: usize,
}

impl<B: DeviceBuffer> Coordinator<B> {
    /// Takes ownership of the two device buffers. Nothing is allocated until the first run.
    pub fn new(config: StreamConfig, full: B, coarse: B) -> Self {
        Self {
            config: config.validated(),
            store: PointStore::new(full, coarse),
            full_index: SpatialIndex::new(),
            coarse_index: SpatialIndex::new(),
            run: None,
            progress: 0,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn store(&self) -> &PointStore<B> {
        &self.store
    }

    pub fn full_index(&self) -> &SpatialIndex {
        &self.full_index
    }

    pub fn coarse_index(&self) -> &SpatialIndex {
        &self.coarse_index
    }

    /// The two point sets in the shape the scheduler plans from.
    pub fn layers(&self) -> (PointLayer<'_>, PointLayer<'_>) {
        (
            PointLayer {
                index: &self.full_index,
                count: self.store.full_count(),
            },
            PointLayer {
                index: &self.coarse_index,
                count: self.store.coarse_count(),
            },
        )
    }

    pub fn is_generating(&self) -> bool {
        self.run.is_some()
    }

    pub fn status(&self) -> Status {
        Status {
            loaded_count: self.store.full_count(),
            coarse_count: self.store.coarse_count(),
            generating: self.is_generating(),
            progress: self.progress,
        }
    }

    /// Replace the scene with a fresh run of `total` points.
    ///
    /// Any active run is cancelled first. Returns the number of points actually requested.
    pub fn generate(&mut self, total: usize, scheduler: &mut RenderScheduler) -> Result<usize> {
        self.cancel_run();
        self.reset_sets(scheduler);
        self.store
            .allocate(self.config.max_total_points, self.config.coarse_capacity());

        let capacity = self.config.max_total_points;
        let accepted = if total > capacity {
            log::warn!("{}", Error::CapacityExceeded { requested: total, capacity });
            capacity
        } else {
            total
        };

        self.start_run(accepted, 0)?;
        Ok(accepted)
    }

    /// Append up to `total` more points after the ones already committed.
    ///
    /// Returns 0 without starting a run when the full set is at capacity.
    pub fn add_more(&mut self, total: usize, scheduler: &mut RenderScheduler) -> Result<usize> {
        self.cancel_run();
        if !self.store.is_allocated() {
            self.store
                .allocate(self.config.max_total_points, self.config.coarse_capacity());
        }

        let start = self.store.full_count();
        let remaining = self.store.remaining(LodLevel::Full);
        if remaining == 0 {
            log::info!("Full set at capacity ({} points); nothing to add", start);
            return Ok(0);
        }

        let accepted = total.min(remaining);
        if accepted < total {
            log::warn!(
                "{}",
                Error::CapacityExceeded {
                    requested: start + total,
                    capacity: self.config.max_total_points,
                }
            );
        }

        self.start_run(accepted, start)?;
        scheduler.mark_dirty();
        Ok(accepted)
    }

    /// Cancel the active run. Committed points stay.
    pub fn stop(&mut self) {
        if self.cancel_run() {
            log::info!("Generation stopped at {} points", self.store.full_count());
        }
    }

    /// Cancel any run and empty both sets. The allocation is kept.
    pub fn clear(&mut self, scheduler: &mut RenderScheduler) {
        self.cancel_run();
        self.reset_sets(scheduler);
        log::info!("Cleared point sets");
    }

    /// Change the coarse sampling rate. The sets are reallocated and start empty.
    pub fn set_coarse_rate(&mut self, rate: usize, scheduler: &mut RenderScheduler) -> usize {
        let rate = clamp_count(rate, 1, self.config.max_total_points);
        if rate == self.config.coarse_rate {
            return rate;
        }

        self.cancel_run();
        self.config.coarse_rate = rate;
        self.reset_sets(scheduler);
        self.store
            .allocate(self.config.max_total_points, self.config.coarse_capacity());
        log::info!("Coarse rate set to 1/{}; point sets reset", rate);
        rate
    }

    /// Clamp and store the batch size used by the next run.
    pub fn set_batch_size(&mut self, batch_size: usize) -> usize {
        self.config.batch_size = clamp_count(batch_size, 1, crate::config::MAX_BATCH_SIZE);
        self.config.batch_size
    }

    /// Commit queued generator output, at most `commit_budget` batches.
    ///
    /// Returns the number of batches committed.
    pub fn poll(&mut self, scheduler: &mut RenderScheduler) -> usize {
        let mut committed = 0;
        while committed < self.config.commit_budget {
            let received = match self.run.as_ref() {
                Some(run) => match run.handle.try_recv() {
                    Ok(msg) => Received::Message(msg),
                    Err(TryRecvError::Empty) => Received::Nothing,
                    Err(TryRecvError::Disconnected) => Received::Closed,
                },
                None => break,
            };

            match self.dispatch(received, scheduler) {
                Some(true) => committed += 1,
                Some(false) => {}
                None => break,
            }
        }
        committed
    }

    /// Block until the active run finishes, committing everything it sends.
    pub fn run_to_completion(
        &mut self,
        scheduler: &mut RenderScheduler,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::GeneratorTimeout(timeout));
            }

            let received = match self.run.as_ref() {
                Some(run) => match run.handle.recv_timeout(deadline - now) {
                    Ok(msg) => Received::Message(msg),
                    Err(RecvTimeoutError::Timeout) => Received::Nothing,
                    Err(RecvTimeoutError::Disconnected) => Received::Closed,
                },
                None => return Ok(()),
            };

            // `Nothing` here means the deadline passed; the next iteration reports it.
            self.dispatch(received, scheduler);
        }
    }

    /// Handle one receive outcome. `Some(true)` when a batch was committed, `None` to stop polling.
    fn dispatch(&mut self, received: Received, scheduler: &mut RenderScheduler) -> Option<bool> {
        match received {
            Received::Message(GeneratorMessage::Batch(batch)) => {
                self.commit_batch(batch, scheduler);
                Some(true)
            }
            Received::Message(GeneratorMessage::Progress { loaded }) => {
                self.progress = loaded;
                Some(false)
            }
            Received::Message(GeneratorMessage::Done) => {
                if let Some(run) = self.run.take() {
                    log::info!(
                        "Generation finished: {} of {} requested in {:.2?}, {} points loaded",
                        self.progress,
                        run.requested,
                        run.started.elapsed(),
                        self.store.full_count()
                    );
                }
                scheduler.mark_dirty();
                None
            }
            Received::Nothing => None,
            Received::Closed => {
                log::warn!("Point generator exited without finishing its run");
                self.run = None;
                None
            }
        }
    }

    /// Commit one batch to both sets. Returns the number of full points written.
    pub fn commit_batch(&mut self, batch: Batch, scheduler: &mut RenderScheduler) -> usize {
        let write_offset = self.store.full_count();
        if batch.start_offset != write_offset {
            log::debug!(
                "Batch starts at {} but the full set holds {}; appending at {}",
                batch.start_offset,
                write_offset,
                write_offset
            );
        }

        let report = self.store.write(LodLevel::Full, write_offset, &batch.points);
        if report.written == 0 {
            return 0;
        }
        let written = &batch.points[..report.written];
        self.full_index
            .bulk_insert(entries_for(written, write_offset));

        let rate = self.config.coarse_rate;
        let (coarse_points, coarse_entries): (Vec<Point>, Vec<IndexEntry>) = written
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let g = write_offset + i;
                (g % rate == 0).then_some((
                    *p,
                    IndexEntry {
                        point: *p,
                        global_index: g as u32,
                    },
                ))
            })
            .unzip();

        let mut coarse_written = 0;
        if !coarse_points.is_empty() {
            let coarse = self.store.append(LodLevel::Coarse, &coarse_points);
            coarse_written = coarse.written;
            let mut coarse_entries = coarse_entries;
            coarse_entries.truncate(coarse.written);
            self.coarse_index.bulk_insert(coarse_entries);
        }

        log::debug!(
            "Committed batch at {}: {} full, {} coarse ({} dropped)",
            write_offset,
            report.written,
            coarse_written,
            report.dropped
        );

        scheduler.mark_dirty();
        report.written
    }

    fn start_run(&mut self, total: usize, start_index: usize) -> Result<()> {
        let request = GenerateRequest {
            total,
            start_index,
            batch_size: self.config.batch_size,
            world: self.config.world,
            coarse_rate: self.config.coarse_rate,
            seed: self.config.seed,
        };
        let handle = GeneratorHandle::spawn(request, self.config.channel_depth)?;

        log::info!("Generating {} points from index {}", total, start_index);
        self.progress = 0;
        self.run = Some(ActiveRun {
            handle,
            requested: total,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Returns true if a run was active.
    fn cancel_run(&mut self) -> bool {
        match self.run.take() {
            Some(mut run) => {
                run.handle.cancel();
                true
            }
            None => false,
        }
    }

    fn reset_sets(&mut self, scheduler: &mut RenderScheduler) {
        self.store.reset_counts();
        self.full_index.clear();
        self.coarse_index.clear();
        self.progress = 0;
        scheduler.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderStyle;
    use crate::store::HostBuffer;

    fn coordinator(max_total_points: usize, coarse_rate: usize) -> (Coordinator<HostBuffer>, RenderScheduler) {
        let config = StreamConfig {
            max_total_points,
            coarse_rate,
            ..Default::default()
        };
        let scheduler = RenderScheduler::new(&config, &RenderStyle::default());
        (
            Coordinator::new(config, HostBuffer::new(), HostBuffer::new()),
            scheduler,
        )
    }

    fn batch(start: usize, len: usize) -> Batch {
        Batch {
            start_offset: start,
            points: (start..start + len)
                .map(|i| Point::new(i as f32, 1.0))
                .collect(),
        }
    }

    fn allocate(c: &mut Coordinator<HostBuffer>) {
        let (full, coarse) = (c.config.max_total_points, c.config.coarse_capacity());
        c.store.allocate(full, coarse);
    }

    #[test]
    fn commit_writes_both_sets_and_keeps_indices_in_step() {
        let (mut c, mut s) = coordinator(10_000, 10);
        allocate(&mut c);

        c.commit_batch(batch(0, 25), &mut s);
        c.commit_batch(batch(25, 25), &mut s);

        assert_eq!(c.store().full_count(), 50);
        assert_eq!(c.full_index().len(), 50);
        assert_eq!(c.store().coarse_count(), 5);
        assert_eq!(c.coarse_index().len(), 5);

        let mut globals: Vec<u32> = c.coarse_index().query_all().iter().map(|e| e.global_index).collect();
        globals.sort_unstable();
        assert_eq!(globals, vec![0, 10, 20, 30, 40]);

        let coarse = c.store().buffer(LodLevel::Coarse).points(5);
        assert_eq!(coarse.iter().map(|p| p.x).collect::<Vec<_>>(), vec![0.0, 10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn commit_past_capacity_is_clamped() {
        let (mut c, mut s) = coordinator(30, 100);
        allocate(&mut c);

        assert_eq!(c.commit_batch(batch(0, 20), &mut s), 20);
        assert_eq!(c.commit_batch(batch(20, 20), &mut s), 10);
        assert_eq!(c.commit_batch(batch(40, 20), &mut s), 0);
        assert_eq!(c.store().full_count(), 30);
        assert_eq!(c.full_index().len(), 30);
        assert_eq!(c.store().coarse_count(), 1);
    }

    #[test]
    fn commit_marks_the_scene_dirty() {
        let (mut c, mut s) = coordinator(100, 10);
        allocate(&mut c);
        let vp = crate::viewport::ViewportController::new(c.config(), 2.0);
        let (full, coarse) = c.layers();
        s.begin_frame(&vp, full, coarse).unwrap();
        s.end_frame(0);
        assert!(!s.is_dirty());

        c.commit_batch(batch(0, 3), &mut s);
        assert!(s.is_dirty());
    }

    #[test]
    fn add_more_at_capacity_is_a_no_op() {
        let (mut c, mut s) = coordinator(10, 5);
        allocate(&mut c);
        c.commit_batch(batch(0, 10), &mut s);

        assert_eq!(c.add_more(100, &mut s).unwrap(), 0);
        assert!(!c.is_generating());
        assert_eq!(c.store().full_count(), 10);
    }

    #[test]
    fn clear_resets_counts_and_indices() {
        let (mut c, mut s) = coordinator(100, 10);
        allocate(&mut c);
        c.commit_batch(batch(0, 40), &mut s);
        c.clear(&mut s);

        assert_eq!(c.status(), Status::default());
        assert!(c.full_index().is_empty());
        assert!(c.coarse_index().is_empty());
        assert!(c.store().is_allocated());
    }

    #[test]
    fn coarse_rate_change_reallocates_and_resets() {
        let (mut c, mut s) = coordinator(1000, 10);
        allocate(&mut c);
        c.commit_batch(batch(0, 100), &mut s);

        assert_eq!(c.set_coarse_rate(0, &mut s), 1);
        assert_eq!(c.store().full_count(), 0);
        assert_eq!(c.coarse_index().len(), 0);
        assert_eq!(c.store().capacity(LodLevel::Coarse), 1000);

        assert_eq!(c.set_coarse_rate(250, &mut s), 250);
        assert_eq!(c.store().capacity(LodLevel::Coarse), 4);
    }

    #[test]
    fn status_text_reflects_run_state() {
        let mut status = Status {
            loaded_count: 1200,
            ..Default::default()
        };
        assert_eq!(status.text(), "Loaded 1200 points");
        status.generating = true;
        assert_eq!(status.text(), "Generating... (1200)");
    }

    #[test]
    fn batch_size_is_clamped() {
        let (mut c, _) = coordinator(100, 10);
        assert_eq!(c.set_batch_size(0), 1);
        assert_eq!(c.set_batch_size(5000), crate::config::MAX_BATCH_SIZE);
    }
}
