//! Force assembler — torsional spring (TS, spec.md §4.5).

use glam::{DMat3, DQuat, DVec3, EulerRot};
use tracing::instrument;

use crate::particle::Particle;
use crate::timeseries::LoadCurve;

/// One axis's torque law: stiffness table plus a linear damper coefficient
/// applied to the relative angular rate about that axis.
#[derive(Clone, Debug)]
pub struct AxisLaw {
    pub stiffness: LoadCurve,
    pub damping: f64,
}

impl AxisLaw {
    pub fn eval(&mut self, angle: f64, rate: f64) -> f64 {
        self.stiffness.eval(angle) + self.damping * rate
    }
}

/// Admissible cone on (pitch, yaw) past which a stiff restoring moment is
/// added on top of the table-driven torque (spec.md §4.5). The restoring
/// coefficient is not supplied here: it is the infinite-slope extrapolation
/// of the pitch/yaw tables' own last segment (spec.md §4.5), so two cones
/// with the same `max_angle` but different pitch/yaw tables restore at
/// different rates.
#[derive(Clone, Copy, Debug)]
pub struct Cone {
    pub max_angle: f64,
}

pub struct TorsionalSpring {
    pub part0: usize,
    pub part1: usize,
    /// Reference roll/pitch/yaw axes in each particle's referential frame,
    /// transported into the spatial frame every evaluation.
    pub roll: AxisLaw,
    pub pitch: AxisLaw,
    pub yaw: AxisLaw,
    pub cone: Option<Cone>,
}

/// `part1^T . part0` decomposed Z-Y-X, with roll about the transported
/// x-axis, pitch about y, yaw about z, matching the spec's (φ, θ, ψ) naming.
fn relative_euler(part0: DMat3, part1: DMat3) -> (f64, f64, f64) {
    let relative = part1.transpose() * part0;
    let q = DQuat::from_mat3(&relative);
    let (z, y, x) = q.to_euler(EulerRot::ZYX);
    (x, y, z)
}

#[instrument(level = "trace", skip_all)]
pub fn apply_torsional_springs(particles: &mut [Particle], springs: &mut [TorsionalSpring]) {
    for spring in springs.iter_mut() {
        let (rot0, rot1) = (particles[spring.part0].rotation, particles[spring.part1].rotation);
        let (mut roll, mut pitch, mut yaw) = relative_euler(rot0, rot1);

        let rel_omega = particles[spring.part0].ang_vel_spatial() - particles[spring.part1].ang_vel_spatial();
        let rel_omega_local = rot0.transpose() * rel_omega;

        let mut restoring = DVec3::ZERO;
        if let Some(cone) = spring.cone {
            let radius = (pitch * pitch + yaw * yaw).sqrt();
            if radius > cone.max_angle {
                let scale = cone.max_angle / radius;
                let excess = radius - cone.max_angle;
                let dir = DVec3::new(0.0, pitch, yaw).normalize_or_zero();
                let stiffness =
                    0.5 * (spring.pitch.stiffness.last_segment_slope().abs() + spring.yaw.stiffness.last_segment_slope().abs());
                restoring = -dir * (stiffness * excess);
                pitch *= scale;
                yaw *= scale;
            }
        }

        let t_roll = spring.roll.eval(roll, rel_omega_local.x);
        let t_pitch = spring.pitch.eval(pitch, rel_omega_local.y);
        let t_yaw = spring.yaw.eval(yaw, rel_omega_local.z);

        let moment_local = DVec3::new(t_roll, t_pitch, t_yaw) + restoring;
        let moment_spatial = rot0 * moment_local;

        particles[spring.part0].torque += moment_spatial;
        particles[spring.part1].torque -= moment_spatial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat3;

    fn still(rotation: DMat3) -> Particle {
        let mut p = Particle::new(1.0, DMat3::IDENTITY, 0);
        p.rotation = rotation;
        p
    }

    #[test]
    fn aligned_bodies_produce_zero_table_torque_at_origin() {
        let mut particles = vec![still(DMat3::IDENTITY), still(DMat3::IDENTITY)];
        let flat = || LoadCurve::new(&[-10.0, 10.0], &[0.0, 0.0]).unwrap();
        let mut spring = TorsionalSpring {
            part0: 0,
            part1: 1,
            roll: AxisLaw { stiffness: flat(), damping: 0.0 },
            pitch: AxisLaw { stiffness: flat(), damping: 0.0 },
            yaw: AxisLaw { stiffness: flat(), damping: 0.0 },
            cone: None,
        };
        apply_torsional_springs(&mut particles, std::slice::from_mut(&mut spring));
        assert_eq!(particles[0].torque, DVec3::ZERO);
        assert_eq!(particles[1].torque, DVec3::ZERO);
    }
}
