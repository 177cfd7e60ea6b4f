/*!
# LOD render scheduler

Owns the dirty flag and turns a dirty frame tick into a [`FramePlan`]: which set to
draw, what to draw from it, and the uniforms for the draw call. The renderer executes
the plan and reports back with [`RenderScheduler::end_frame`].

```text
 mark_dirty        begin_frame        end_frame
Idle ─────▶ Dirty ───────────▶ Rendering ─────────▶ Idle
                 ◀───────────            (Dirty if marked mid-frame)
                  abort_frame
```
*/

use crate::config::{RenderStyle, StreamConfig};
use crate::lod::{decide_lod, DrawMode, LodLevel};
use crate::spatial_index::SpatialIndex;
use crate::types::{Point, WorldRect};
use crate::viewport::ViewportController;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Dirty,
    Rendering,
}

/// One point set as seen by the scheduler: its index and the valid buffer length.
#[derive(Debug, Clone, Copy)]
pub struct PointLayer<'a> {
    pub index: &'a SpatialIndex,
    pub count: usize,
}

/// Draw-call uniforms. Everything is render-global.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawUniforms {
    /// Canvas size in device pixels.
    pub canvas: [f32; 2],
    pub pan: [f32; 2],
    pub scale: f32,
    /// Diameter in device pixels, never below one.
    pub point_size: f32,
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    /// Draw [`RenderScheduler::visible_points`], culled from `level`.
    Visible { level: LodLevel, count: usize },
    /// Draw `[0, count)` of `level`'s device buffer directly.
    Range { level: LodLevel, count: usize },
    /// Nothing to draw; clear only.
    Empty,
}

impl DrawSource {
    pub fn point_count(&self) -> usize {
        match *self {
            DrawSource::Visible { count, .. } | DrawSource::Range { count, .. } => count,
            DrawSource::Empty => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub lod: LodLevel,
    pub source: DrawSource,
    pub uniforms: DrawUniforms,
    pub visible_rect: WorldRect,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Frames actually rendered per second.
    pub fps: f32,
    /// Frame ticks per second, rendered or not.
    pub ticks_per_second: f32,
    pub points_drawn: usize,
    pub lod: Option<LodLevel>,
}

const STATS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct RenderScheduler {
    state: FrameState,
    /// A dirty mark that arrived while a frame was in flight.
    dirty_again: bool,
    draw_mode: DrawMode,
    auto_lod: bool,
    point_size: f32,
    point_color: [f32; 4],
    lod_threshold: f32,
    cull_min_points: usize,
    visible: Vec<Point>,
    last_lod: Option<LodLevel>,
    stats: FrameStats,
    window_start: Option<Instant>,
    window_frames: u32,
    window_ticks: u32,
}

impl RenderScheduler {
    /// Starts dirty so the first tick draws.
    pub fn new(config: &StreamConfig, style: &RenderStyle) -> Self {
        Self {
            state: FrameState::Dirty,
            dirty_again: false,
            draw_mode: DrawMode::Auto,
            auto_lod: true,
            point_size: RenderStyle::clamp_point_size(style.point_size),
            point_color: style.point_color,
            lod_threshold: config.lod_threshold,
            cull_min_points: config.cull_min_points,
            visible: Vec::new(),
            last_lod: None,
            stats: FrameStats::default(),
            window_start: None,
            window_frames: 0,
            window_ticks: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == FrameState::Dirty
    }

    pub fn mark_dirty(&mut self) {
        match self.state {
            FrameState::Idle => self.state = FrameState::Dirty,
            FrameState::Rendering => self.dirty_again = true,
            FrameState::Dirty => {}
        }
    }

    pub fn draw_mode(&self) -> DrawMode {
        self.draw_mode
    }

    pub fn set_draw_mode(&mut self, mode: DrawMode) {
        if self.draw_mode != mode {
            self.draw_mode = mode;
            self.mark_dirty();
        }
    }

    pub fn auto_lod(&self) -> bool {
        self.auto_lod
    }

    pub fn set_auto_lod(&mut self, enabled: bool) {
        if self.auto_lod != enabled {
            self.auto_lod = enabled;
            self.mark_dirty();
        }
    }

    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    /// Clamps to the slider range; returns the size now in effect.
    pub fn set_point_size(&mut self, size: f32) -> f32 {
        let size = RenderStyle::clamp_point_size(size);
        if size != self.point_size {
            self.point_size = size;
            self.mark_dirty();
        }
        size
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Positions selected by the last culled plan.
    pub fn visible_points(&self) -> &[Point] {
        &self.visible
    }

    /// Count one frame tick; refreshes the per-second rates once a second has passed.
    pub fn tick(&mut self, now: Instant) {
        self.window_ticks += 1;
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= STATS_WINDOW {
            let secs = elapsed.as_secs_f32();
            self.stats.fps = self.window_frames as f32 / secs;
            self.stats.ticks_per_second = self.window_ticks as f32 / secs;
            self.window_start = Some(now);
            self.window_frames = 0;
            self.window_ticks = 0;
        }
    }

    /// Plan a frame if the scene is dirty. Idle ticks return `None` and do no work.
    pub fn begin_frame(
        &mut self,
        viewport: &ViewportController,
        full: PointLayer<'_>,
        coarse: PointLayer<'_>,
    ) -> Option<FramePlan> {
        if self.state != FrameState::Dirty {
            return None;
        }
        self.state = FrameState::Rendering;
        self.dirty_again = false;

        let vp = viewport.state();
        let lod = decide_lod(self.draw_mode, self.auto_lod, vp.scale, self.lod_threshold);
        if self.last_lod != Some(lod) {
            log::debug!("LOD -> {} at scale {:.4}", lod.label(), vp.scale);
            self.last_lod = Some(lod);
        }

        let layer = match lod {
            LodLevel::Full => full,
            LodLevel::Coarse => coarse,
        };
        let point_size = (self.point_size * vp.device_pixel_ratio).max(1.0);
        // Sprites centred just off-canvas still overlap it by up to their radius.
        let visible_rect = viewport
            .visible_world_rect()
            .expanded(point_size / 2.0 / vp.scale);

        self.visible.clear();
        let source = if layer.count == 0 {
            DrawSource::Empty
        } else if layer.count <= self.cull_min_points {
            DrawSource::Range {
                level: lod,
                count: layer.count,
            }
        } else {
            let count = layer.index.query_points_into(&visible_rect, &mut self.visible);
            if count == 0 {
                DrawSource::Empty
            } else {
                DrawSource::Visible { level: lod, count }
            }
        };

        let uniforms = DrawUniforms {
            canvas: vp.canvas.to_array(),
            pan: vp.pan.to_array(),
            scale: vp.scale,
            point_size,
            color: self.point_color,
        };

        Some(FramePlan {
            lod,
            source,
            uniforms,
            visible_rect,
        })
    }

    /// The planned frame was submitted.
    pub fn end_frame(&mut self, points_drawn: usize) {
        if self.state != FrameState::Rendering {
            return;
        }
        self.window_frames += 1;
        self.stats.points_drawn = points_drawn;
        self.stats.lod = self.last_lod;
        self.state = if self.dirty_again {
            FrameState::Dirty
        } else {
            FrameState::Idle
        };
        self.dirty_again = false;
    }

    /// The planned frame could not be presented; try again next tick.
    pub fn abort_frame(&mut self) {
        if self.state == FrameState::Rendering {
            self.state = FrameState::Dirty;
            self.dirty_again = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_index::entries_for;

    struct Scene {
        full: SpatialIndex,
        coarse: SpatialIndex,
        full_count: usize,
        coarse_count: usize,
    }

    impl Scene {
        /// `n` points spread over a 100×100 grid scaled to the default world.
        fn new(n: usize, rate: usize) -> Self {
            let pts: Vec<Point> = (0..n)
                .map(|i| Point::new((i % 100) as f32 * 20.0, (i / 100 % 100) as f32 * 20.0))
                .collect();
            Self::from_points(pts, rate)
        }

        fn from_points(pts: Vec<Point>, rate: usize) -> Self {
            let coarse_pts: Vec<Point> = pts.iter().step_by(rate).copied().collect();
            let mut full = SpatialIndex::new();
            full.bulk_insert(entries_for(&pts, 0));
            let mut coarse = SpatialIndex::new();
            coarse.bulk_insert(entries_for(&coarse_pts, 0));
            Self {
                full,
                coarse,
                full_count: pts.len(),
                coarse_count: coarse_pts.len(),
            }
        }

        fn layers(&self) -> (PointLayer<'_>, PointLayer<'_>) {
            (
                PointLayer {
                    index: &self.full,
                    count: self.full_count,
                },
                PointLayer {
                    index: &self.coarse,
                    count: self.coarse_count,
                },
            )
        }
    }

    fn setup() -> (RenderScheduler, ViewportController) {
        let config = StreamConfig::default();
        let mut vp = ViewportController::new(&config, 2.0);
        vp.resize(1000, 1000, 1.0);
        (RenderScheduler::new(&config, &RenderStyle::default()), vp)
    }

    fn plan(s: &mut RenderScheduler, vp: &ViewportController, scene: &Scene) -> Option<FramePlan> {
        let (full, coarse) = scene.layers();
        s.begin_frame(vp, full, coarse)
    }

    #[test]
    fn idle_ticks_do_nothing() {
        let (mut s, vp) = setup();
        let scene = Scene::new(10, 1);
        assert!(plan(&mut s, &vp, &scene).is_some());
        s.end_frame(10);
        assert_eq!(s.state(), FrameState::Idle);
        assert!(plan(&mut s, &vp, &scene).is_none());

        s.mark_dirty();
        assert!(s.is_dirty());
        assert!(plan(&mut s, &vp, &scene).is_some());
        assert_eq!(s.state(), FrameState::Rendering);
    }

    #[test]
    fn dirty_mark_during_a_frame_schedules_another() {
        let (mut s, vp) = setup();
        let scene = Scene::new(10, 1);
        plan(&mut s, &vp, &scene).unwrap();
        s.mark_dirty();
        s.end_frame(10);
        assert_eq!(s.state(), FrameState::Dirty);
    }

    #[test]
    fn aborted_frame_stays_dirty() {
        let (mut s, vp) = setup();
        let scene = Scene::new(10, 1);
        plan(&mut s, &vp, &scene).unwrap();
        s.abort_frame();
        assert!(s.is_dirty());
    }

    #[test]
    fn auto_picks_coarse_when_zoomed_out() {
        let (mut s, vp) = setup();
        // 1000px canvas over a 2000-unit world: scale 0.5.
        assert_eq!(vp.scale(), 0.5);
        let scene = Scene::new(10_000, 100);
        let p = plan(&mut s, &vp, &scene).unwrap();
        assert_eq!(p.lod, LodLevel::Coarse);
        assert_eq!(p.source, DrawSource::Range { level: LodLevel::Coarse, count: 100 });
    }

    #[test]
    fn large_sets_are_culled_to_the_viewport() {
        let (mut s, mut vp) = setup();
        s.set_draw_mode(DrawMode::Full);
        vp.set_scale(2.0).unwrap();
        let scene = Scene::new(10_000, 100);

        let p = plan(&mut s, &vp, &scene).unwrap();
        let DrawSource::Visible { level, count } = p.source else {
            panic!("expected a culled draw, got {:?}", p.source);
        };
        assert_eq!(level, LodLevel::Full);
        assert_eq!(count, s.visible_points().len());
        assert_eq!(count, scene.full.count_in(&p.visible_rect));
        assert!(count < 10_000);
        assert!(s.visible_points().iter().all(|pt| p.visible_rect.contains(*pt)));
    }

    #[test]
    fn culling_keeps_sprites_that_overlap_the_canvas_edge() {
        let (mut s, vp) = setup();
        s.set_draw_mode(DrawMode::Full);
        // Scale 0.5 with the default 4px sprite: the radius is 4 world units.
        assert_eq!(vp.visible_world_rect().min_x, 0.0);

        let mut pts: Vec<Point> = (0..3000).map(|i| Point::new(1000.0, i as f32 * 0.5)).collect();
        pts.push(Point::new(-3.0, 1000.0));
        pts.push(Point::new(-6.0, 1000.0));
        pts.push(Point::new(1000.0, 2003.5));
        let scene = Scene::from_points(pts, 1);

        let p = plan(&mut s, &vp, &scene).unwrap();
        assert!(matches!(p.source, DrawSource::Visible { .. }), "{:?}", p.source);
        let visible = s.visible_points();
        assert!(visible.contains(&Point::new(-3.0, 1000.0)));
        assert!(visible.contains(&Point::new(1000.0, 2003.5)));
        assert!(!visible.contains(&Point::new(-6.0, 1000.0)));
        assert_eq!(visible.len(), 3002);
    }

    #[test]
    fn empty_set_plans_an_empty_draw() {
        let (mut s, vp) = setup();
        let scene = Scene::new(0, 1);
        assert_eq!(plan(&mut s, &vp, &scene).unwrap().source, DrawSource::Empty);
    }

    #[test]
    fn uniforms_follow_viewport_and_device_pixel_ratio() {
        let (mut s, mut vp) = setup();
        vp.resize(1000, 1000, 2.0);
        assert_eq!(s.set_point_size(50.0), 20.0);
        let p = plan(&mut s, &vp, &Scene::new(1, 1)).unwrap();
        assert_eq!(p.uniforms.point_size, 40.0);
        assert_eq!(p.uniforms.canvas, [1000.0, 1000.0]);
        assert_eq!(p.uniforms.scale, vp.scale());
        assert_eq!(p.uniforms.pan, vp.pan().to_array());
    }

    #[test]
    fn control_changes_mark_dirty_only_when_they_change_something() {
        let (mut s, vp) = setup();
        plan(&mut s, &vp, &Scene::new(1, 1)).unwrap();
        s.end_frame(1);

        s.set_auto_lod(true);
        s.set_draw_mode(DrawMode::Auto);
        s.set_point_size(4.0);
        assert_eq!(s.state(), FrameState::Idle);

        s.set_auto_lod(false);
        assert!(s.is_dirty());
    }

    #[test]
    fn stats_are_measured_per_second() {
        let (mut s, vp) = setup();
        let scene = Scene::new(5, 1);
        let t0 = Instant::now();
        for i in 0..=60u64 {
            if i % 2 == 0 {
                s.mark_dirty();
                if plan(&mut s, &vp, &scene).is_some() {
                    s.end_frame(5);
                }
            }
            s.tick(t0 + Duration::from_millis(i * 1000 / 60));
        }

        let stats = s.stats();
        assert!((stats.ticks_per_second - 60.0).abs() < 1.5, "{stats:?}");
        assert!((stats.fps - 30.0).abs() < 1.5, "{stats:?}");
        assert_eq!(stats.points_drawn, 5);
        assert_eq!(stats.lod, Some(LodLevel::Coarse));
    }
}
