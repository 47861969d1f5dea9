use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Where the orbit drag is in its press, hold, release cycle.
/// `Began` and `Ended` last for exactly one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OrbitDrag {
    #[default]
    Idle,
    Began,
    Held,
    Ended,
}

/// Cursor, wheel and orbit-button state gathered between two frames
#[derive(Debug, Default)]
pub struct PointerState {
    pub cursor: Vec2,
    pub prev_cursor: Vec2,
    /// Sum of wheel notches this frame, one per event regardless of device resolution
    pub scroll_steps: f32,
    pub drag: OrbitDrag,
    /// Cursor position when the orbit button went down
    pub drag_origin: Vec2,
}

impl PointerState {
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button: MouseButton::Right, .. } => {
                self.set_orbit_button(*state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.move_cursor(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                self.scroll(y);
            }
            _ => {}
        }
    }

    pub fn set_orbit_button(&mut self, pressed: bool) {
        match (pressed, self.drag) {
            (true, OrbitDrag::Idle | OrbitDrag::Ended) => {
                self.drag = OrbitDrag::Began;
                self.drag_origin = self.cursor;
            }
            (false, OrbitDrag::Began | OrbitDrag::Held) => self.drag = OrbitDrag::Ended,
            // Repeated press or release events
            _ => {}
        }
    }

    /// `prev_cursor` stays put until `end_frame`, so every move in a frame adds up
    pub fn move_cursor(&mut self, position: Vec2) {
        self.cursor = position;
    }

    pub fn scroll(&mut self, y: f32) {
        if y != 0.0 {
            self.scroll_steps += y.signum();
        }
    }

    /// Snaps both cursor samples to `position` so the next delta starts from zero
    pub fn warp_cursor(&mut self, position: Vec2) {
        self.cursor = position;
        self.prev_cursor = position;
    }

    pub fn cursor_delta(&self) -> Vec2 {
        self.cursor - self.prev_cursor
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, OrbitDrag::Began | OrbitDrag::Held)
    }

    /// Clears the per-frame parts once the frame has consumed them
    pub fn end_frame(&mut self) {
        self.scroll_steps = 0.0;
        self.prev_cursor = self.cursor;
        self.drag = match self.drag {
            OrbitDrag::Began => OrbitDrag::Held,
            OrbitDrag::Ended => OrbitDrag::Idle,
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_walks_through_every_phase() {
        let mut pointer = PointerState::default();
        pointer.move_cursor(Vec2::new(10.0, 20.0));
        pointer.set_orbit_button(true);
        assert_eq!(pointer.drag, OrbitDrag::Began);
        assert_eq!(pointer.drag_origin, Vec2::new(10.0, 20.0));

        pointer.end_frame();
        assert_eq!(pointer.drag, OrbitDrag::Held);
        assert!(pointer.is_dragging());

        pointer.set_orbit_button(false);
        assert_eq!(pointer.drag, OrbitDrag::Ended);
        assert!(!pointer.is_dragging());

        pointer.end_frame();
        assert_eq!(pointer.drag, OrbitDrag::Idle);
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut pointer = PointerState::default();
        pointer.set_orbit_button(false);
        assert_eq!(pointer.drag, OrbitDrag::Idle);
    }

    #[test]
    fn scroll_counts_notches_and_resets_each_frame() {
        let mut pointer = PointerState::default();
        pointer.scroll(0.25);
        pointer.scroll(-40.0);
        pointer.scroll(3.0);
        assert_eq!(pointer.scroll_steps, 1.0);

        pointer.end_frame();
        assert_eq!(pointer.scroll_steps, 0.0);
    }

    #[test]
    fn cursor_delta_is_relative_to_last_frame() {
        let mut pointer = PointerState::default();
        pointer.warp_cursor(Vec2::new(100.0, 100.0));
        pointer.move_cursor(Vec2::new(101.0, 99.0));
        pointer.move_cursor(Vec2::new(104.0, 97.0));
        assert_eq!(pointer.cursor_delta(), Vec2::new(4.0, -3.0));

        pointer.end_frame();
        assert_eq!(pointer.cursor_delta(), Vec2::ZERO);
    }
}
