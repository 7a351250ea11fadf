//! Ocean surface clock
//!
//! The wave shader runs on the GPU; the simulation only owns its time
//! uniform. `height_at` mirrors the shader's base swell for CPU-side use.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OceanSurface {
    /// Seconds fed to the shader's `time` uniform
    pub time: f32,
    pub amplitude: f32,
    pub wavelength: f32,
    pub speed: f32,
}

impl Default for OceanSurface {
    fn default() -> Self {
        Self {
            time: 0.0,
            amplitude: 0.4,
            wavelength: 12.0,
            speed: 1.2,
        }
    }
}

impl OceanSurface {
    pub fn advance(&mut self, dt: f32) {
        if dt.is_finite() && dt > 0.0 {
            self.time += dt;
        }
    }

    /// Two crossed sine swells, relative to sea level (y = 0)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let k = std::f32::consts::TAU / self.wavelength;
        let phase = self.time * self.speed;
        let a = (k * x + phase).sin();
        let b = (k * 0.7 * z - phase * 0.8).sin();
        self.amplitude * 0.5 * (a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_ignores_bad_dt() {
        let mut ocean = OceanSurface::default();
        ocean.advance(0.5);
        ocean.advance(-1.0);
        ocean.advance(f32::NAN);
        assert_eq!(ocean.time, 0.5);
    }

    #[test]
    fn test_height_bounded_by_amplitude() {
        let mut ocean = OceanSurface::default();
        for i in 0..100 {
            ocean.advance(0.1);
            let h = ocean.height_at(i as f32 * 1.3, i as f32 * -0.7);
            assert!(h.abs() <= ocean.amplitude + 1e-5);
        }
    }
}
