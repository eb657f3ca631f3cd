//! The rigid body (spec.md §3, entity **Particle**).

use glam::{DMat3, DVec3};

/// The skew-symmetric matrix such that `skew_matrix(a) * v == a.cross(v)`.
pub fn skew_matrix(a: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, a.z, -a.y),
        DVec3::new(-a.z, 0.0, a.x),
        DVec3::new(a.y, -a.x, 0.0),
    )
}

/// Rodrigues' formula: the rotation matrix `exp([w]_x)` for rotation vector
/// `w` (axis times angle), used by the integrator's exponential-map update
/// (spec.md §4.9).
pub fn exp_map(w: DVec3) -> DMat3 {
    let theta = w.length();
    if theta < 1e-12 {
        DMat3::IDENTITY + skew_matrix(w)
    } else {
        let axis = w / theta;
        let k = skew_matrix(axis);
        DMat3::IDENTITY + theta.sin() * k + (1.0 - theta.cos()) * (k * k)
    }
}

/// Flags carried per particle. `ANALYTICAL` elides the particle from
/// contact detection and shape update (spec.md §9); `OUTREST` marks a
/// particle that has had an out-of-balance-detection warning raised for it
/// and is otherwise inert bookkeeping carried across steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParticleFlags(u32);

impl ParticleFlags {
    pub const ANALYTICAL: Self = Self(1 << 0);
    pub const OUTREST: Self = Self(1 << 1);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for ParticleFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A rigid body: mass, inertia, current and referential kinematic state.
///
/// `rotation` is kept orthonormal to first order by the integrator's
/// exponential-map update (spec.md §4.9); `ang_vel_ref` is the angular
/// velocity expressed in the body (referential) frame, `ang_vel_spatial` is
/// `rotation * ang_vel_ref`.
#[derive(Clone, Debug)]
pub struct Particle {
    pub mass: f64,
    pub inv_mass: f64,
    pub inertia: DMat3,
    pub inv_inertia: DMat3,

    pub pos: DVec3,
    pub pos_ref: DVec3,

    pub rotation: DMat3,

    pub ang_vel_ref: DVec3,
    pub lin_vel: DVec3,

    pub force: DVec3,
    pub torque: DVec3,

    pub material: usize,
    pub flags: ParticleFlags,

    /// previous-step position/rotation, used as the CD kinematic snapshot
    /// (spec.md §2, "CD ... using previous-step kinematics").
    pub pos_prev: DVec3,
    pub rotation_prev: DMat3,
}

impl Particle {
    pub fn new(mass: f64, inertia: DMat3, material: usize) -> Self {
        let inv_mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };
        let inv_inertia = inertia.inverse();
        Self {
            mass,
            inv_mass,
            inertia,
            inv_inertia,
            pos: DVec3::ZERO,
            pos_ref: DVec3::ZERO,
            rotation: DMat3::IDENTITY,
            ang_vel_ref: DVec3::ZERO,
            lin_vel: DVec3::ZERO,
            force: DVec3::ZERO,
            torque: DVec3::ZERO,
            material,
            flags: ParticleFlags::empty(),
            pos_prev: DVec3::ZERO,
            rotation_prev: DMat3::IDENTITY,
        }
    }

    pub fn is_analytical(&self) -> bool {
        self.flags.contains(ParticleFlags::ANALYTICAL)
    }

    /// Spatial angular velocity `Omega = R * omega`.
    pub fn ang_vel_spatial(&self) -> DVec3 {
        self.rotation * self.ang_vel_ref
    }

    /// Velocity of the material point currently at `point` (spatial),
    /// combining translation and the rigid rotation about the mass center.
    pub fn point_velocity(&self, point: DVec3) -> DVec3 {
        self.lin_vel + self.ang_vel_spatial().cross(point - self.pos)
    }

    pub fn reset_accumulators(&mut self) {
        self.force = DVec3::ZERO;
        self.torque = DVec3::ZERO;
    }
}
