//! Pointer-lock style first-person controls
//!
//! Holds the player camera. Looking and walking only apply while the pointer
//! is locked; the browser layer calls `lock`/`unlock` when the lock changes.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::{THROW_LIFT, THROW_SPEED};

/// Held movement keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
}

/// Camera lens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lens {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov_y: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// First-person camera controller
#[derive(Debug, Clone)]
pub struct PlayerControls {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    locked: bool,
    pub lens: Lens,
    /// Walk speed (m/s)
    pub move_speed: f32,
    /// Radians per pixel of mouse movement
    pub look_sensitivity: f32,
}

impl Default for PlayerControls {
    fn default() -> Self {
        Self {
            // Standing on the island, eye height
            position: Vec3::new(0.0, 4.0, 10.0),
            yaw: 0.0,
            pitch: 0.0,
            locked: false,
            lens: Lens::default(),
            move_speed: 8.0,
            look_sensitivity: 0.002,
        }
    }
}

impl PlayerControls {
    const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns true if the state changed
    pub fn lock(&mut self) -> bool {
        !std::mem::replace(&mut self.locked, true)
    }

    pub fn unlock(&mut self) -> bool {
        std::mem::replace(&mut self.locked, false)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Mouse movement in pixels
    pub fn look(&mut self, dx: f32, dy: f32) {
        if !self.locked {
            return;
        }
        self.yaw -= dx * self.look_sensitivity;
        self.pitch = (self.pitch - dy * self.look_sensitivity)
            .clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    /// View direction (camera looks down -Z at rest)
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Forward projected onto the ground plane
    fn ground_forward(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    pub fn move_forward(&mut self, distance: f32) {
        if self.locked {
            self.position += self.ground_forward() * distance;
        }
    }

    pub fn move_right(&mut self, distance: f32) {
        if self.locked {
            let right = self.ground_forward().cross(Vec3::Y);
            self.position += right * distance;
        }
    }

    pub fn apply_movement(&mut self, input: MoveInput, dt: f32) {
        let axis = |pos: bool, neg: bool| (pos as i32 - neg as i32) as f32;
        let step = self.move_speed * dt;
        self.move_forward(axis(input.forward, input.back) * step);
        self.move_right(axis(input.right, input.left) * step);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.lens.fov_y, aspect.max(1e-3), self.lens.near, self.lens.far)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view_matrix()
    }

    /// Where a thrown ball starts
    pub fn throw_origin(&self) -> Vec3 {
        self.position + self.forward() * 0.5
    }

    /// Launch velocity along the view direction with a little lift
    pub fn throw_velocity(&self, speed: f32) -> Vec3 {
        self.forward() * speed + Vec3::Y * THROW_LIFT
    }

    pub fn default_throw_velocity(&self) -> Vec3 {
        self.throw_velocity(THROW_SPEED)
    }
}
