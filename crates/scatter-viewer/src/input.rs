//! Window input → viewport updates.

use glam::Vec2;
use pointstream::{RenderScheduler, ViewportController};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Wheel delta per scrolled line, in the pixel units the zoom sensitivity is tuned for.
const LINE_DELTA_PX: f32 = 100.0;

/// Normalise a wheel event to a pixel delta where positive means zoom out.
pub fn wheel_delta(delta: &MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -*y * LINE_DELTA_PX,
        MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
    }
}

#[derive(Debug, Default)]
pub struct InputAdapter {
    cursor: Vec2,
}

impl InputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies pointer and wheel events to the viewport. Returns true if the event was used.
    pub fn handle_event(
        &mut self,
        event: &WindowEvent,
        viewport: &mut ViewportController,
        scheduler: &mut RenderScheduler,
    ) -> bool {
        match event {
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                match state {
                    ElementState::Pressed => viewport.pointer_down(self.cursor),
                    ElementState::Released => viewport.pointer_up(),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                if viewport.pointer_move(self.cursor) {
                    scheduler.mark_dirty();
                }
                true
            }
            WindowEvent::CursorLeft { .. } => {
                viewport.pointer_up();
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if viewport.zoom_at(self.cursor, wheel_delta(delta)).is_ok() {
                    scheduler.mark_dirty();
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn scrolling_up_zooms_in() {
        assert_eq!(wheel_delta(&MouseScrollDelta::LineDelta(0.0, 1.0)), -100.0);
        assert_eq!(wheel_delta(&MouseScrollDelta::LineDelta(0.0, -2.0)), 200.0);
        assert_eq!(
            wheel_delta(&MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 30.0))),
            -30.0
        );
    }
}
