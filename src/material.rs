//! Materials and the color-pair contact parameter table.

use crate::error::DemError;

/// Immutable after creation (spec.md §3).
#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub density: f64,
    pub young: f64,
    pub poisson: f64,
}

impl Material {
    pub fn new(density: f64, young: f64, poisson: f64) -> Result<Self, DemError> {
        if !(density > 0.0) || !(young > 0.0) || !(poisson > 0.0 && poisson < 0.5) {
            return Err(DemError::InvalidMaterial {
                density,
                young,
                poisson,
            });
        }
        Ok(Self {
            density,
            young,
            poisson,
        })
    }
}

/// Per-color-pair contact law parameters, looked up by `(color1, color2)`
/// with `(0, 0)` as the default fallback (spec.md §4.3).
#[derive(Clone, Copy, Debug)]
pub struct PairParams {
    pub spring: f64,
    pub damper: f64,
    pub friction_static: f64,
    pub friction_dynamic: f64,
    pub rolling_resistance: f64,
    pub drilling_resistance: f64,
    pub kskn: f64,
}

impl Default for PairParams {
    fn default() -> Self {
        Self {
            spring: 1.0e6,
            damper: 0.0,
            friction_static: 0.0,
            friction_dynamic: 0.0,
            rolling_resistance: 0.0,
            drilling_resistance: 0.0,
            kskn: 1.0,
        }
    }
}

/// Sparse color-pair table; unset pairs fall back to the `(0, 0)` default.
#[derive(Clone, Debug, Default)]
pub struct PairTable {
    entries: std::collections::HashMap<(i32, i32), PairParams>,
}

impl PairTable {
    pub fn set(&mut self, color1: i32, color2: i32, params: PairParams) {
        let key = Self::key(color1, color2);
        self.entries.insert(key, params);
    }

    pub fn lookup(&self, color1: i32, color2: i32) -> PairParams {
        let key = Self::key(color1, color2);
        self.entries
            .get(&key)
            .or_else(|| self.entries.get(&(0, 0)))
            .copied()
            .unwrap_or_default()
    }

    fn key(color1: i32, color2: i32) -> (i32, i32) {
        if color1 <= color2 {
            (color1, color2)
        } else {
            (color2, color1)
        }
    }
}
