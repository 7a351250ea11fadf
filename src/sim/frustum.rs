//! View-frustum culling
//!
//! Planes are extracted from a view-projection matrix with [0, 1] depth
//! (the wgpu convention).

use glam::{Mat4, Vec3, Vec4};

/// Six inward-facing planes (xyz = normal, w = offset)
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(m: Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let raw = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near
            r3 - r2, // far
        ];
        let planes = raw.map(|p| {
            let len = p.truncate().length();
            if len > 0.0 { p / len } else { p }
        });
        Self { planes }
    }

    /// Sphere touches or lies inside the frustum
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(center) + p.w >= -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frustum() -> Frustum {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn test_point_in_front_is_inside() {
        assert!(frustum().contains_point(Vec3::new(0.0, 0.0, -10.0)));
    }

    #[test]
    fn test_point_behind_is_outside() {
        assert!(!frustum().contains_point(Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_beyond_far_plane() {
        assert!(!frustum().contains_point(Vec3::new(0.0, 0.0, -150.0)));
    }

    #[test]
    fn test_sphere_straddling_edge() {
        let f = frustum();
        // Just outside the right plane at z = -10 (half width ≈ 5.77)
        let center = Vec3::new(6.5, 0.0, -10.0);
        assert!(!f.intersects_sphere(center, 0.1));
        assert!(f.intersects_sphere(center, 2.0));
    }
}
