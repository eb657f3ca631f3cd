//! Prescribed motion (PD, spec.md §4.8): per-component velocity or
//! acceleration overrides driven by time-indexed callbacks.

use glam::DVec3;
use tracing::instrument;

use crate::callback::ScalarFn;
use crate::particle::Particle;

/// One optionally-prescribed scalar component; `None` leaves the component
/// free (spec.md §4.8: "each of x, y, z can be independently prescribed...
/// or left free").
#[derive(Clone, Default)]
pub struct Component(pub Option<ScalarFn>);

impl Component {
    fn apply(&self, time: f64, current: f64) -> f64 {
        match &self.0 {
            Some(f) => f.eval(time),
            None => current,
        }
    }

    fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

#[derive(Clone, Default)]
pub struct Components {
    pub x: Component,
    pub y: Component,
    pub z: Component,
}

impl Components {
    fn eval(&self, time: f64, current: DVec3) -> DVec3 {
        DVec3::new(
            self.x.apply(time, current.x),
            self.y.apply(time, current.y),
            self.z.apply(time, current.z),
        )
    }

    fn mask(&self) -> DVec3 {
        DVec3::new(
            if self.x.is_set() { 0.0 } else { 1.0 },
            if self.y.is_set() { 0.0 } else { 1.0 },
            if self.z.is_set() { 0.0 } else { 1.0 },
        )
    }
}

pub enum Kind {
    Velocity,
    Acceleration,
}

pub struct PrescribedMotion {
    pub particle: usize,
    pub kind: Kind,
    pub linear: Components,
    pub angular: Components,
}

/// Overwrites `v`/`Omega` directly after the integrator's velocity update
/// (spec.md §4.8, `kind=velocity`).
#[instrument(level = "trace", skip_all)]
pub fn apply_prescribed_velocity(particles: &mut [Particle], motions: &[PrescribedMotion], time: f64) {
    for m in motions.iter().filter(|m| matches!(m.kind, Kind::Velocity)) {
        let p = &mut particles[m.particle];
        p.lin_vel = m.linear.eval(time, p.lin_vel);
        let omega_spatial = m.angular.eval(time, p.ang_vel_spatial());
        p.ang_vel_ref = p.rotation.transpose() * omega_spatial;
    }
}

/// Writes the equivalent force/torque `f = m . a` (and `tau` via the
/// particle's inertia) before the velocity update, zeroing any other
/// accumulated contribution along the prescribed axes (spec.md §4.8,
/// `kind=acceleration`).
#[instrument(level = "trace", skip_all)]
pub fn apply_prescribed_acceleration(particles: &mut [Particle], motions: &[PrescribedMotion], time: f64) {
    for m in motions.iter().filter(|m| matches!(m.kind, Kind::Acceleration)) {
        let p = &mut particles[m.particle];

        let accel = m.linear.eval(time, DVec3::ZERO);
        let mask = m.linear.mask();
        p.force = p.force * mask + (DVec3::ONE - mask) * (p.mass * accel);

        let alpha_local = m.angular.eval(time, DVec3::ZERO);
        let angular_mask = m.angular.mask();
        let prescribed_torque_local = p.inertia * alpha_local;
        let prescribed_torque_spatial = p.rotation * prescribed_torque_local;
        p.torque = p.torque * angular_mask + (DVec3::ONE - angular_mask) * prescribed_torque_spatial;
    }
}
