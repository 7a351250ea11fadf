//! Ray casting against scene meshes
//!
//! Rays are transformed into each object's local space, intersected with the
//! analytic shape, and the hit is mapped back to world space.

use glam::{Mat3, Vec3};

use super::scene::{MeshShape, ObjectId, SceneGraph};

/// A ray with a unit direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    /// Returns None for a zero-length direction
    pub fn new(origin: Vec3, dir: Vec3) -> Option<Self> {
        let dir = dir.try_normalize()?;
        Some(Self { origin, dir })
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Nearest intersection of a ray with a scene object
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub object: ObjectId,
    pub distance: f32,
    pub point: Vec3,
    /// World-space unit normal
    pub normal: Vec3,
}

/// Intersect a local-space ray (unnormalized direction allowed) with a shape.
/// Returns the ray parameter and the local normal.
fn intersect_shape(origin: Vec3, dir: Vec3, shape: MeshShape) -> Option<(f32, Vec3)> {
    match shape {
        MeshShape::Sphere { radius } => {
            let a = dir.length_squared();
            if a < 1e-12 {
                return None;
            }
            let b = origin.dot(dir);
            let c = origin.length_squared() - radius * radius;
            let disc = b * b - a * c;
            if disc < 0.0 {
                return None;
            }
            let sqrt_disc = disc.sqrt();
            let mut t = (-b - sqrt_disc) / a;
            if t < 0.0 {
                // Origin inside the sphere: take the exit
                t = (-b + sqrt_disc) / a;
            }
            if t < 0.0 {
                return None;
            }
            let normal = (origin + dir * t).normalize_or_zero();
            Some((t, normal))
        }
        MeshShape::Cuboid { half_extents } => {
            let mut t_min = f32::NEG_INFINITY;
            let mut t_max = f32::INFINITY;
            let mut enter_axis = 0;
            for axis in 0..3 {
                let o = origin[axis];
                let d = dir[axis];
                let h = half_extents[axis];
                if d.abs() < 1e-9 {
                    if o < -h || o > h {
                        return None;
                    }
                    continue;
                }
                let inv = 1.0 / d;
                let mut t0 = (-h - o) * inv;
                let mut t1 = (h - o) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                if t0 > t_min {
                    t_min = t0;
                    enter_axis = axis;
                }
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return None;
                }
            }
            if t_max < 0.0 || t_min < 0.0 {
                // Behind the ray, or starting inside the box
                return None;
            }
            let mut normal = Vec3::ZERO;
            normal[enter_axis] = -dir[enter_axis].signum();
            Some((t_min, normal))
        }
        MeshShape::Plane { half_size } => {
            if dir.y.abs() < 1e-9 {
                return None;
            }
            let t = -origin.y / dir.y;
            if t < 0.0 {
                return None;
            }
            let p = origin + dir * t;
            if p.x.abs() > half_size.x || p.z.abs() > half_size.y {
                return None;
            }
            // Double sided: face the incoming ray
            let normal = if dir.y < 0.0 { Vec3::Y } else { Vec3::NEG_Y };
            Some((t, normal))
        }
    }
}

/// Cast a ray against `candidates`, returning the nearest hit within
/// `max_distance`. Objects in `ignore` are skipped.
pub fn cast(
    scene: &SceneGraph,
    ray: &Ray,
    max_distance: f32,
    candidates: &[ObjectId],
    ignore: &[ObjectId],
) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;

    for &id in candidates {
        if ignore.contains(&id) {
            continue;
        }
        let Some(shape) = scene.get(id).and_then(|n| n.shape()) else {
            continue;
        };

        let world = scene.world_matrix(id);
        if world.matrix3.determinant().abs() < 1e-12 {
            continue;
        }
        let inverse = world.inverse();
        let local_origin = inverse.transform_point3(ray.origin);
        let local_dir = inverse.transform_vector3(ray.dir);

        let Some((t, local_normal)) = intersect_shape(local_origin, local_dir, shape) else {
            continue;
        };

        let point = world.transform_point3(local_origin + local_dir * t);
        let distance = (point - ray.origin).length();
        if distance > max_distance {
            continue;
        }
        if best.is_some_and(|b| b.distance <= distance) {
            continue;
        }

        let normal_matrix = Mat3::from(world.matrix3).inverse().transpose();
        let normal = (normal_matrix * local_normal).normalize_or_zero();
        best = Some(RayHit {
            object: id,
            distance,
            point,
            normal,
        });
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::scene::{Layer, NodeDesc};
    use glam::{Quat, Vec2};

    #[test]
    fn test_ray_hits_nearest_sphere() {
        let mut scene = SceneGraph::new();
        let near = scene.add(
            NodeDesc::mesh("near", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 0.0, -5.0)),
            None,
        );
        let far = scene.add(
            NodeDesc::mesh("far", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 0.0, -10.0)),
            None,
        );
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        let hit = cast(&scene, &ray, 100.0, &[far, near], &[]).unwrap();
        assert_eq!(hit.object, near);
        assert!((hit.distance - 4.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn test_max_distance_limits_hits() {
        let mut scene = SceneGraph::new();
        let target = scene.add(
            NodeDesc::mesh("t", MeshShape::Sphere { radius: 1.0 }, Layer::Prop)
                .at(Vec3::new(0.0, 0.0, -5.0)),
            None,
        );
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!(cast(&scene, &ray, 3.0, &[target], &[]).is_none());
        assert!(cast(&scene, &ray, 100.0, &[target], &[target]).is_none());
    }

    #[test]
    fn test_rotated_cuboid_normal_in_world_space() {
        let mut scene = SceneGraph::new();
        // Box rotated 90° about Z: its local +X face now points along world +Y
        let rock = scene.add(
            NodeDesc::mesh(
                "rock",
                MeshShape::Cuboid {
                    half_extents: Vec3::ONE,
                },
                Layer::Terrain,
            )
            .rotated(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
            None,
        );
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y).unwrap();
        let hit = cast(&scene, &ray, 10.0, &[rock], &[]).unwrap();
        assert!((hit.point.y - 1.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn test_plane_bounds() {
        let mut scene = SceneGraph::new();
        let ground = scene.add(
            NodeDesc::mesh(
                "ground",
                MeshShape::Plane {
                    half_size: Vec2::splat(2.0),
                },
                Layer::Terrain,
            ),
            None,
        );
        let inside = Ray::new(Vec3::new(1.0, 3.0, 1.0), Vec3::NEG_Y).unwrap();
        let outside = Ray::new(Vec3::new(5.0, 3.0, 0.0), Vec3::NEG_Y).unwrap();
        assert!(cast(&scene, &inside, 10.0, &[ground], &[]).is_some());
        assert!(cast(&scene, &outside, 10.0, &[ground], &[]).is_none());
    }

    #[test]
    fn test_zero_direction_ray() {
        assert!(Ray::new(Vec3::ZERO, Vec3::ZERO).is_none());
    }
}
