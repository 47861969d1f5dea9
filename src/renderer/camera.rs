use glam::{Mat4, Vec3};
use crate::renderer::shader_data::CameraUniform;

pub struct Camera {
    position: Vec3,
    forward: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    aspect_ratio: f32,
    pivot: Vec3,
}

impl Camera {
    const DEFAULT_FOV_Y_DEG: f32 = 45.0;

    pub fn new() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            fov_y_deg: Self::DEFAULT_FOV_Y_DEG,
            near: 0.1,
            far: 1000.0,
            aspect_ratio: 1.0,
            pivot: Vec3::ZERO,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.look_at(self.pivot);
    }

    pub fn look_at(&mut self, target: Vec3) {
        if target == self.position {
            return;
        }
        self.pivot = target;
        self.forward = (target - self.position).normalize();
        self.right = self.forward.cross(self.world_up).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }

    /// Ignores zero sized extents so a minimized window keeps the last ratio
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    /// Right-handed perspective with 0..1 depth, flipped on Y for Vulkan clip space
    pub fn projection(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view: self.view(),
            projection: self.projection(),
        }
    }

    pub fn get_position(&self) -> Vec3 {
        self.position
    }

    pub fn get_up(&self) -> Vec3 {
        self.up
    }

    pub fn get_right(&self) -> Vec3 {
        self.right
    }

    pub fn get_near(&self) -> f32 {
        self.near
    }

    pub fn get_far(&self) -> f32 {
        self.far
    }

    pub fn get_pivot(&self) -> Vec3 {
        self.pivot
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

pub fn calculate_pitch(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    forward.y.clamp(-1.0, 1.0).asin()
}

pub fn calculate_yaw(forward: Vec3) -> f32 {
    let forward = forward.normalize();
    forward.z.atan2(forward.x)
}

pub fn calculate_direction(pitch: f32, yaw: f32) -> Vec3 {
    Vec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::new();
        let above = camera.projection() * camera.view() * Vec4::new(0.0, 1.0, 0.0, 1.0);
        // Points above the camera land in negative clip-space Y
        assert!(above.y / above.w < 0.0);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let camera = Camera::new();
        let p = camera.projection() * Vec4::new(0.0, 0.0, -camera.get_near(), 1.0);
        assert!((p.z / p.w).abs() < 1e-5);
    }

    #[test]
    fn aspect_ratio_ignores_minimized_window() {
        let mut camera = Camera::new();
        camera.set_aspect_ratio(1600, 800);
        camera.set_aspect_ratio(0, 0);
        assert_eq!(camera.aspect_ratio, 2.0);
    }

    #[test]
    fn look_at_keeps_basis_orthonormal() {
        let mut camera = Camera::new();
        camera.set_position(Vec3::new(3.0, 2.0, 4.0));
        camera.look_at(Vec3::ZERO);
        assert!(camera.forward.dot(camera.get_up()).abs() < 1e-5);
        assert!(camera.forward.dot(camera.get_right()).abs() < 1e-5);
        assert!((camera.get_up().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pitch_and_yaw_follow_forward() {
        let mut camera = Camera::new();
        camera.set_position(Vec3::new(0.0, 5.0, 5.0));
        camera.look_at(Vec3::ZERO);
        assert!((calculate_pitch(camera.forward) + std::f32::consts::FRAC_PI_4).abs() < 1e-5);
        assert!((calculate_yaw(camera.forward) + std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn direction_round_trips_through_pitch_and_yaw() {
        let dir = Vec3::new(1.0, 0.5, -2.0).normalize();
        let rebuilt = calculate_direction(calculate_pitch(dir), calculate_yaw(dir));
        assert!(rebuilt.abs_diff_eq(dir, 1e-5));
    }

    #[test]
    fn uniform_carries_view_and_projection() {
        let camera = Camera::new();
        let uniform = camera.uniform();
        assert_eq!(uniform.view, camera.view());
        assert_eq!(uniform.projection, camera.projection());
    }
}
