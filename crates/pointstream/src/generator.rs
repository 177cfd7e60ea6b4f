//! Background point generator.
//!
//! A run lives on its own thread and talks to the rendering side only through a bounded
//! channel of [`GeneratorMessage`]s. Batches are moved across; the worker keeps nothing
//! it has sent. Dropping the [`GeneratorHandle`] (or calling [`GeneratorHandle::cancel`])
//! stops the worker within one batch and joins it.

use crate::error::Result;
use crate::types::{Batch, Point, WorldExtent};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Share of points drawn from the cluster grid; the rest follow the spiral.
const CLUSTER_PROBABILITY: f32 = 0.65;
const CLUSTER_COLUMNS: f32 = 5.0;
const CLUSTER_ROWS: f32 = 4.0;
const CLUSTER_MARGIN: f32 = 0.08;
const CLUSTER_JITTER: f32 = 0.06;
/// Target number of progress notifications per run.
const PROGRESS_STEPS: usize = 200;
/// Points generated between cancellation checks inside a batch.
const CANCEL_CHECK_EVERY: usize = 256;

/// Everything a run needs. Sent to the worker by value.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub total: usize,
    /// Global index of the first point produced.
    pub start_index: usize,
    pub batch_size: usize,
    pub world: WorldExtent,
    /// Carried for diagnostics only; the coordinator does the sampling.
    pub coarse_rate: usize,
    pub seed: u64,
}

impl GenerateRequest {
    /// Notification cadence: `max(1, total / 200)` points.
    pub fn progress_interval(&self) -> usize {
        (self.total / PROGRESS_STEPS).max(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorMessage {
    Batch(Batch),
    /// Cumulative number of points produced by this run so far.
    Progress { loaded: usize },
    Done,
}

/// Position on the spiral arm at progress `t` in `[0, 1)`. `jitter` is uniform in `[0, 1)`.
fn spiral_point(t: f32, jitter: f32, world: &WorldExtent) -> Point {
    let (w, h) = (world.width, world.height);
    let angle = t * 8.0 * PI;
    let radius = 0.15 * w + ((t * 30.0).sin() * 0.1 + jitter * 0.05) * w;
    Point::new(w / 2.0 + angle.cos() * radius, h / 2.0 + angle.sin() * radius)
}

/// Deterministic point source for one run.
struct PointSynth {
    rng: StdRng,
    world: WorldExtent,
    start_index: usize,
    total: usize,
    produced: usize,
}

impl PointSynth {
    fn new(request: &GenerateRequest) -> Self {
        let stream = (request.start_index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            rng: StdRng::seed_from_u64(request.seed ^ stream),
            world: request.world,
            start_index: request.start_index,
            total: request.total,
            produced: 0,
        }
    }

    fn produced(&self) -> usize {
        self.produced
    }

    fn remaining(&self) -> usize {
        self.total - self.produced
    }

    /// Spiral progress of the next point, measured across every run so far, so a
    /// continuation picks the arm up where the previous run left it.
    fn spiral_t(&self) -> f32 {
        (self.start_index + self.produced) as f32 / (self.start_index + self.total) as f32
    }

    /// Next point of the run, or `None` once `total` points have been produced.
    fn next_point(&mut self) -> Option<Point> {
        if self.produced >= self.total {
            return None;
        }

        let (w, h) = (self.world.width, self.world.height);
        let point = if self.rng.gen::<f32>() < CLUSTER_PROBABILITY {
            let cx = (self.rng.gen::<f32>() * CLUSTER_COLUMNS).floor() / CLUSTER_COLUMNS * w
                + CLUSTER_MARGIN * w;
            let cy = (self.rng.gen::<f32>() * CLUSTER_ROWS).floor() / CLUSTER_ROWS * h
                + CLUSTER_MARGIN * h;
            let jx = (self.rng.gen::<f32>() - 0.5) * CLUSTER_JITTER * w;
            let jy = (self.rng.gen::<f32>() - 0.5) * CLUSTER_JITTER * h;
            Point::new(cx + jx, cy + jy)
        } else {
            let t = self.spiral_t();
            spiral_point(t, self.rng.gen::<f32>(), &self.world)
        };

        self.produced += 1;
        Some(point)
    }
}

/// Produce a whole run, sending each message through `emit`.
///
/// Stops early when `emit` returns false or `cancelled` returns true. `cancelled` is
/// polled every few hundred points and before each batch.
fn produce<E, C>(request: &GenerateRequest, mut emit: E, mut cancelled: C)
where
    E: FnMut(GeneratorMessage) -> bool,
    C: FnMut() -> bool,
{
    let batch_size = request.batch_size.max(1);
    let interval = request.progress_interval();
    let mut synth = PointSynth::new(request);
    let mut reported = 0;

    while synth.remaining() > 0 {
        if cancelled() {
            return;
        }

        let start_offset = request.start_index + synth.produced();
        let len = batch_size.min(synth.remaining());
        let mut points = Vec::with_capacity(len);
        while points.len() < len {
            if points.len() % CANCEL_CHECK_EVERY == CANCEL_CHECK_EVERY - 1 && cancelled() {
                return;
            }
            match synth.next_point() {
                Some(p) => points.push(p),
                None => break,
            }
        }

        if !emit(GeneratorMessage::Batch(Batch {
            start_offset,
            points,
        })) {
            return;
        }

        let loaded = synth.produced();
        if loaded / interval > reported / interval || loaded == request.total {
            reported = loaded;
            if !emit(GeneratorMessage::Progress { loaded }) {
                return;
            }
        }

        thread::yield_now();
    }

    emit(GeneratorMessage::Done);
}

/// Run `request` on the calling thread and collect its messages.
#[cfg(test)]
fn generate_all(request: &GenerateRequest) -> Vec<GeneratorMessage> {
    let mut out = Vec::new();
    produce(
        request,
        |msg| {
            out.push(msg);
            true
        },
        || false,
    );
    out
}

/// Owner side of a running generator thread.
pub struct GeneratorHandle {
    rx: Receiver<GeneratorMessage>,
    /// Dropping this sender tells the worker to stop.
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl GeneratorHandle {
    /// Start a worker for `request`. `depth` bounds the number of queued messages.
    pub fn spawn(request: GenerateRequest, depth: usize) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(depth.max(1));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        log::debug!(
            "Spawning generator: total={} start={} batch={} coarse_rate={}",
            request.total,
            request.start_index,
            request.batch_size,
            request.coarse_rate
        );

        let thread = thread::Builder::new()
            .name("point-generator".into())
            .spawn(move || {
                produce(
                    &request,
                    |msg| tx.send(msg).is_ok(),
                    || !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)),
                );
            })?;

        Ok(Self {
            rx,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn try_recv(&self) -> Result<GeneratorMessage, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<GeneratorMessage, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Stop the worker and wait for it to exit. Queued messages are discarded.
    pub fn cancel(&mut self) {
        self.stop.take();
        // Replacing the receiver unblocks a worker waiting on a full channel.
        self.rx = crossbeam_channel::never();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Point generator thread panicked");
            }
        }
    }
}

impl Drop for GeneratorHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
