//! Procedural flight paths
//!
//! A closed Catmull-Rom loop through 5-7 random control points. The path
//! parameter wraps modulo 1, so sampling never runs off the end.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{PATH_MAX_POINTS, PATH_MIN_POINTS};
use crate::wrap_unit;

/// Region a flight path is generated in.
///
/// Control points take x/z from `[min, max]` and sit at
/// `base_altitude + [min.y, max.y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub base_altitude: f32,
}

impl FlightBounds {
    pub fn new(min: Vec3, max: Vec3, base_altitude: f32) -> Self {
        // Accept corners in either order
        Self {
            min: min.min(max),
            max: min.max(max),
            base_altitude,
        }
    }

    /// Random control point inside the bounds
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        Vec3::new(
            lerp(self.min.x, self.max.x, rng.random::<f32>()),
            self.base_altitude + lerp(self.min.y, self.max.y, rng.random::<f32>()),
            lerp(self.min.z, self.max.z, rng.random::<f32>()),
        )
    }
}

impl Default for FlightBounds {
    fn default() -> Self {
        Self {
            min: Vec3::new(-40.0, 0.0, -40.0),
            max: Vec3::new(40.0, 15.0, 40.0),
            base_altitude: 10.0,
        }
    }
}

/// A point on the path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSample {
    pub position: Vec3,
    /// Unit tangent (zero on a degenerate path)
    pub tangent: Vec3,
}

/// Closed smooth curve through random control points
#[derive(Debug, Clone)]
pub struct FlightPath {
    points: Vec<Vec3>,
    bounds: FlightBounds,
}

impl FlightPath {
    pub fn new<R: Rng + ?Sized>(bounds: FlightBounds, rng: &mut R) -> Self {
        Self {
            points: Self::control_points(&bounds, rng),
            bounds,
        }
    }

    /// Build a path from explicit control points (needs at least 2)
    pub fn from_points(points: Vec<Vec3>, bounds: FlightBounds) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        Some(Self { points, bounds })
    }

    fn control_points<R: Rng + ?Sized>(bounds: &FlightBounds, rng: &mut R) -> Vec<Vec3> {
        let count = rng.random_range(PATH_MIN_POINTS..=PATH_MAX_POINTS);
        (0..count).map(|_| bounds.random_point(rng)).collect()
    }

    /// Replace the curve with a fresh one inside `bounds`.
    /// Callers keep their own progress, so the next sample lands on the new
    /// curve at the same parameter.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, bounds: FlightBounds, rng: &mut R) {
        let points = Self::control_points(&bounds, rng);
        self.points = points;
        self.bounds = bounds;
    }

    pub fn bounds(&self) -> &FlightBounds {
        &self.bounds
    }

    pub fn control_point_count(&self) -> usize {
        self.points.len()
    }

    /// Segment index and local parameter for a wrapped `t`
    fn locate(&self, t: f32) -> (usize, f32) {
        let n = self.points.len();
        let scaled = wrap_unit(t) * n as f32;
        let index = (scaled.floor() as usize).min(n - 1);
        (index, scaled - index as f32)
    }

    fn segment(&self, index: usize) -> [Vec3; 4] {
        let n = self.points.len();
        [
            self.points[(index + n - 1) % n],
            self.points[index],
            self.points[(index + 1) % n],
            self.points[(index + 2) % n],
        ]
    }

    /// Position and tangent at `t` (any real value; wrapped into [0, 1))
    pub fn sample(&self, t: f32) -> PathSample {
        let (index, u) = self.locate(t);
        let [p0, p1, p2, p3] = self.segment(index);

        let u2 = u * u;
        let u3 = u2 * u;
        let position = 0.5
            * ((2.0 * p1)
                + (p2 - p0) * u
                + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u2
                + (3.0 * p1 - p0 - 3.0 * p2 + p3) * u3);
        let derivative = 0.5
            * ((p2 - p0)
                + 2.0 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * u
                + 3.0 * (3.0 * p1 - p0 - 3.0 * p2 + p3) * u2);

        PathSample {
            position,
            tangent: derivative.normalize_or_zero(),
        }
    }

    pub fn position(&self, t: f32) -> Vec3 {
        self.sample(t).position
    }
}
