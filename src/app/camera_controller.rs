use std::f32::consts::PI;
use glam::{FloatExt, Quat, Vec2, Vec3};
use winit::dpi::PhysicalPosition;
use winit::window::Window;
use crate::app::pointer::{OrbitDrag, PointerState};
use crate::renderer::camera::{calculate_direction, calculate_pitch, calculate_yaw, Camera};

/// Orbits the camera around its pivot while the right mouse button is held and
/// zooms with the wheel, easing towards the requested orientation and distance.
pub struct CameraController {
    camera: Camera,

    orbit_sensitivity: f32,
    orbit_smoothing: f32,
    orbit_max_pitch: f32,
    desired_direction: Vec3,
    current_direction: Vec3,

    zoom_sensitivity: f32,
    zoom_smoothing: f32,
    desired_distance: f32,
    current_distance: f32,
}

impl CameraController {
    pub fn new(camera: Camera) -> Self {
        let pivot_to_eye = camera.get_position() - camera.get_pivot();
        let distance = pivot_to_eye.length();
        let direction = if distance > 0.0 { pivot_to_eye / distance } else { Vec3::Z };
        Self {
            camera,

            orbit_sensitivity: 2.0,
            orbit_smoothing: 10.0,
            orbit_max_pitch: 80.0_f32.to_radians(),
            desired_direction: direction,
            current_direction: direction,

            zoom_sensitivity: 2.0,
            zoom_smoothing: 4.0,
            desired_distance: distance,
            current_distance: distance,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn process_input(&mut self, pointer: &mut PointerState, window: &Window, delta_time: f32) {
        let window_size = window.inner_size();
        let viewport = Vec2::new(window_size.width as f32, window_size.height as f32);
        let window_center = viewport / 2.0;

        match pointer.drag {
            OrbitDrag::Began => {
                window.set_cursor_visible(false);
                set_cursor_position(window, window_center);
                pointer.warp_cursor(window_center);
            }
            OrbitDrag::Ended => {
                window.set_cursor_visible(true);
                // Put the cursor back where the drag started
                let origin = pointer.drag_origin;
                set_cursor_position(window, origin);
                pointer.warp_cursor(origin);
            }
            OrbitDrag::Idle | OrbitDrag::Held => {}
        }

        if pointer.is_dragging() {
            self.orbit(pointer.prev_cursor, pointer.cursor, viewport);

            // Recenter before the cursor hits the window edge
            let border = viewport.min_element() / 4.0;
            let pos = pointer.cursor;
            if pos.cmplt(Vec2::splat(border)).any() || pos.cmpgt(viewport - border).any() {
                pointer.warp_cursor(window_center);
                set_cursor_position(window, window_center);
            }
        }

        self.zoom(pointer.scroll_steps * self.zoom_sensitivity);
        self.ease(delta_time);
    }

    fn zoom(&mut self, delta: f32) {
        if delta == 0.0 {
            return;
        }
        // Proportional to distance so zooming feels the same near and far
        let delta = delta * self.current_distance * 0.1;
        self.desired_distance = (self.current_distance - delta)
            .clamp(self.camera.get_near() + 0.1, self.camera.get_far() - 0.1);
    }

    fn orbit(&mut self, prev: Vec2, curr: Vec2, viewport: Vec2) {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return;
        }
        // Full width is one turn, full height is half a turn
        let angle_x = (prev.x - curr.x) * 2.0 * PI / viewport.x * self.orbit_sensitivity;
        let angle_y = (prev.y - curr.y) * PI / viewport.y * self.orbit_sensitivity;
        if angle_x == 0.0 && angle_y == 0.0 {
            return;
        }

        let rotation = Quat::from_axis_angle(self.camera.get_up(), angle_x)
            * Quat::from_axis_angle(self.camera.get_right(), angle_y);
        let direction = rotation * self.current_direction;

        self.desired_direction = if calculate_pitch(direction).abs() <= self.orbit_max_pitch {
            direction
        } else {
            let pitch = self.orbit_max_pitch * direction.y.signum();
            calculate_direction(pitch, calculate_yaw(direction))
        };
    }

    fn ease(&mut self, delta_time: f32) {
        let t_zoom = 1.0 - (-self.zoom_smoothing * delta_time).exp();
        self.current_distance = self.current_distance.lerp(self.desired_distance, t_zoom);

        let t_orbit = 1.0 - (-self.orbit_smoothing * delta_time).exp();
        self.current_direction = slerp(self.current_direction, self.desired_direction, t_orbit);

        let pivot = self.camera.get_pivot();
        self.camera.set_position(pivot + self.current_direction * self.current_distance);
    }
}

fn set_cursor_position(window: &Window, pos: Vec2) {
    if let Err(e) = window.set_cursor_position(PhysicalPosition::new(pos.x as f64, pos.y as f64)) {
        log::error!("Failed to set cursor position: {e}");
    }
}

fn slerp(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    let a = a.normalize();
    let b = b.normalize();

    let theta = a.dot(b).clamp(-1.0, 1.0).acos();
    // Nearly parallel, plain lerp avoids dividing by ~0
    if theta.abs() < 1e-6 {
        return a.lerp(b, t).normalize();
    }

    let sin_theta = theta.sin();
    (((1.0 - t) * theta).sin() / sin_theta) * a + ((t * theta).sin() / sin_theta) * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slerp_stays_on_unit_sphere() {
        let a = Vec3::X;
        let b = Vec3::Z;
        for i in 0..=10 {
            let v = slerp(a, b, i as f32 / 10.0);
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
        assert!(slerp(a, b, 1.0).abs_diff_eq(b, 1e-5));
    }

    #[test]
    fn zoom_is_clamped_to_clip_planes() {
        let mut controller = CameraController::new(Camera::new());
        controller.zoom(1.0e6);
        assert!(controller.desired_distance >= controller.camera.get_near() + 0.1 - 1e-6);
    }

    #[test]
    fn orbit_never_passes_the_pole() {
        let mut controller = CameraController::new(Camera::new());
        controller.orbit(Vec2::new(400.0, 0.0), Vec2::new(400.0, 150.0), Vec2::new(800.0, 600.0));
        assert!(calculate_pitch(controller.desired_direction).abs() <= controller.orbit_max_pitch + 1e-4);
    }
}
