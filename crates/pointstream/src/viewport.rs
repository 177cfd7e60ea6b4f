//! Pan/zoom state and the screen ↔ world transform.
//!
//! Screen coordinates are device pixels with the origin at the top-left of the canvas.
//! The transform is `screen = world * scale + pan` on both axes.

use crate::config::StreamConfig;
use crate::error::{Error, Result};
use crate::types::{Point, WorldExtent, WorldRect};
use glam::Vec2;

/// What the renderer needs from the viewport each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Offset in device pixels.
    pub pan: Vec2,
    /// World units → device pixels.
    pub scale: f32,
    pub device_pixel_ratio: f32,
    /// Canvas size in device pixels.
    pub canvas: Vec2,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            scale: 1.0,
            device_pixel_ratio: 1.0,
            canvas: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    state: ViewportState,
    world: WorldExtent,
    scale_min: f32,
    scale_max: f32,
    sensitivity: f32,
    max_device_pixel_ratio: f32,
    drag_from: Option<Vec2>,
    /// Set by the first user pan or zoom; until then resizes re-center the world.
    touched: bool,
}

impl ViewportController {
    pub fn new(config: &StreamConfig, max_device_pixel_ratio: f32) -> Self {
        Self {
            state: ViewportState::default(),
            world: config.world,
            scale_min: config.scale_min,
            scale_max: config.scale_max,
            sensitivity: config.zoom_sensitivity,
            max_device_pixel_ratio: max_device_pixel_ratio.max(1.0),
            drag_from: None,
            touched: false,
        }
    }

    #[inline]
    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn pan(&self) -> Vec2 {
        self.state.pan
    }

    /// New canvas size in device pixels. `device_pixel_ratio` is capped at the configured maximum.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.state.canvas = Vec2::new(width as f32, height as f32);
        self.state.device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(self.max_device_pixel_ratio)
        } else {
            1.0
        };

        if !self.touched {
            self.center_world();
        }
    }

    /// Fit the whole world into the canvas and center it.
    pub fn center_world(&mut self) {
        let canvas = self.state.canvas;
        if canvas.x <= 0.0 || canvas.y <= 0.0 {
            return;
        }

        let world = Vec2::new(self.world.width, self.world.height);
        let fit = (canvas.x / world.x).min(canvas.y / world.y);
        let scale = fit.clamp(self.scale_min, self.scale_max);

        self.state.scale = scale;
        self.state.pan = canvas / 2.0 - world * scale / 2.0;
    }

    /// Zoom by a wheel `delta` keeping the world point under `cursor` fixed.
    ///
    /// Factors that overflow or underflow land on the scale bounds. Only a NaN factor is rejected.
    pub fn zoom_at(&mut self, cursor: Vec2, delta: f32) -> Result<()> {
        let old = self.state.scale;
        let proposed = old * (-delta * self.sensitivity).exp();
        if proposed.is_nan() {
            log::warn!("{}; zoom ignored", Error::InvalidScale(proposed));
            return Err(Error::InvalidScale(proposed));
        }

        let scale = proposed.clamp(self.scale_min, self.scale_max);
        let ratio = scale / old;
        self.state.pan = cursor - (cursor - self.state.pan) * ratio;
        self.state.scale = scale;
        self.touched = true;
        Ok(())
    }

    /// Replace the scale, keeping the canvas centre fixed.
    pub fn set_scale(&mut self, scale: f32) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            log::warn!("{}; keeping {}", Error::InvalidScale(scale), self.state.scale);
            return Err(Error::InvalidScale(scale));
        }

        let center = self.state.canvas / 2.0;
        let scale = scale.clamp(self.scale_min, self.scale_max);
        self.state.pan = center - (center - self.state.pan) * (scale / self.state.scale);
        self.state.scale = scale;
        self.touched = true;
        Ok(())
    }

    /// Shift the view by `delta` device pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.state.pan += delta;
        self.touched = true;
    }

    pub fn pointer_down(&mut self, at: Vec2) {
        self.drag_from = Some(at);
    }

    /// Returns true when the move panned the view.
    pub fn pointer_move(&mut self, at: Vec2) -> bool {
        match self.drag_from.replace(at) {
            Some(last) if last != at => {
                self.pan_by(at - last);
                true
            }
            Some(_) => false,
            None => {
                self.drag_from = None;
                false
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag_from = None;
    }

    #[inline]
    pub fn screen_to_world(&self, screen: Vec2) -> Point {
        let w = (screen - self.state.pan) / self.state.scale;
        Point::new(w.x, w.y)
    }

    #[inline]
    pub fn world_to_screen(&self, world: Point) -> Vec2 {
        Vec2::new(world.x, world.y) * self.state.scale + self.state.pan
    }

    /// World-space rectangle covered by `[0, cw] × [0, ch]`.
    pub fn visible_world_rect(&self) -> WorldRect {
        WorldRect::from_corners(
            self.screen_to_world(Vec2::ZERO),
            self.screen_to_world(self.state.canvas),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(w: u32, h: u32) -> ViewportController {
        let mut vp = ViewportController::new(&StreamConfig::default(), 2.0);
        vp.resize(w, h, 1.0);
        vp
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).abs().max_element() < 1e-2
    }

    #[test]
    fn initial_resize_fits_and_centers_the_world() {
        let vp = controller(1000, 500);
        assert_eq!(vp.scale(), 0.25);
        assert_eq!(vp.pan(), Vec2::new(250.0, 0.0));

        let rect = vp.visible_world_rect();
        assert_eq!(rect.min_y, 0.0);
        assert_eq!(rect.max_y, 2000.0);
        assert_eq!(rect.min_x, -1000.0);
        assert_eq!(rect.max_x, 3000.0);
    }

    #[test]
    fn zoom_keeps_the_point_under_the_cursor_fixed() {
        let mut vp = controller(800, 600);
        let cursor = Vec2::new(123.0, 456.0);
        let before = vp.screen_to_world(cursor);

        for delta in [-300.0, 120.0, -40.0, 900.0] {
            vp.zoom_at(cursor, delta).unwrap();
            let after = vp.screen_to_world(cursor);
            assert!((after.x - before.x).abs() < 1e-2, "{after:?} vs {before:?}");
            assert!((after.y - before.y).abs() < 1e-2);
        }
        assert!(approx(vp.world_to_screen(before), cursor));
    }

    #[test]
    fn negative_wheel_delta_zooms_in() {
        let mut vp = controller(800, 600);
        let s = vp.scale();
        vp.zoom_at(Vec2::ZERO, -100.0).unwrap();
        assert!(vp.scale() > s);
        assert!((vp.scale() - s * (0.12f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped_to_scale_bounds() {
        let mut vp = controller(800, 600);
        for _ in 0..100 {
            vp.zoom_at(Vec2::new(400.0, 300.0), -10_000.0).unwrap();
        }
        assert_eq!(vp.scale(), 1e4);
        for _ in 0..100 {
            vp.zoom_at(Vec2::new(400.0, 300.0), 10_000.0).unwrap();
        }
        assert_eq!(vp.scale(), 1e-4);
        assert!(vp.scale() > 0.0 && vp.scale().is_finite());
    }

    #[test]
    fn overflowing_zoom_lands_on_the_bounds() {
        let mut vp = controller(800, 600);
        let cursor = Vec2::new(400.0, 300.0);

        vp.zoom_at(cursor, -1e30).unwrap();
        assert_eq!(vp.scale(), 1e4);
        vp.zoom_at(cursor, f32::INFINITY).unwrap();
        assert_eq!(vp.scale(), 1e-4);
        vp.zoom_at(cursor, f32::NEG_INFINITY).unwrap();
        assert_eq!(vp.scale(), 1e4);
        assert!(vp.pan().is_finite());
    }

    #[test]
    fn invalid_scale_is_rejected_and_previous_kept() {
        let mut vp = controller(800, 600);
        let s = vp.scale();
        assert!(matches!(vp.set_scale(0.0), Err(Error::InvalidScale(_))));
        assert!(vp.set_scale(f32::NAN).is_err());
        assert!(vp.zoom_at(Vec2::ZERO, f32::NAN).is_err());
        assert_eq!(vp.scale(), s);

        vp.set_scale(2.0).unwrap();
        assert_eq!(vp.scale(), 2.0);
    }

    #[test]
    fn drag_pans_by_the_pointer_delta() {
        let mut vp = controller(800, 600);
        let pan = vp.pan();

        assert!(!vp.pointer_move(Vec2::new(5.0, 5.0)));
        vp.pointer_down(Vec2::new(10.0, 10.0));
        assert!(vp.pointer_move(Vec2::new(25.0, 4.0)));
        assert!(vp.pointer_move(Vec2::new(30.0, 4.0)));
        vp.pointer_up();
        assert!(!vp.pointer_move(Vec2::new(500.0, 500.0)));

        assert_eq!(vp.pan(), pan + Vec2::new(20.0, -6.0));
    }

    #[test]
    fn resize_recenters_only_until_the_user_interacts() {
        let mut vp = controller(800, 600);
        vp.resize(400, 400, 1.0);
        assert_eq!(vp.scale(), 0.2);

        vp.pan_by(Vec2::new(7.0, 0.0));
        let pan = vp.pan();
        vp.resize(1600, 1600, 1.0);
        assert_eq!(vp.scale(), 0.2);
        assert_eq!(vp.pan(), pan);
    }

    #[test]
    fn device_pixel_ratio_is_capped() {
        let mut vp = controller(800, 600);
        vp.resize(800, 600, 3.0);
        assert_eq!(vp.state().device_pixel_ratio, 2.0);
        vp.resize(800, 600, 1.5);
        assert_eq!(vp.state().device_pixel_ratio, 1.5);
    }
}
