//! Restraint applicator (RA, spec.md §4.7): projects velocity and force
//! components out of a restrained particle along a set of directions,
//! independently for translation and rotation.

use glam::DVec3;
use tracing::instrument;

use crate::particle::Particle;

/// Up to three orthonormalized directions restraining a particle's
/// translational or rotational degrees of freedom.
#[derive(Clone, Debug, Default)]
pub struct DirectionSet {
    pub directions: Vec<DVec3>,
}

impl DirectionSet {
    pub fn project_out(&self, v: DVec3) -> DVec3 {
        self.directions.iter().fold(v, |acc, d| acc - acc.dot(*d) * *d)
    }
}

pub struct Restraint {
    pub particle: usize,
    pub linear: DirectionSet,
    pub angular: DirectionSet,
}

/// Zeroes restrained velocity/force/torque components (spec.md §4.7). Run
/// twice per step: once on force/torque before the velocity update, once
/// on the resulting velocity after it, so that neither externally applied
/// nor integrator-accumulated components survive along a restrained axis.
#[instrument(level = "trace", skip_all)]
pub fn restrain_forces(particles: &mut [Particle], restraints: &[Restraint]) {
    for r in restraints {
        let p = &mut particles[r.particle];
        p.force = r.linear.project_out(p.force);
        p.torque = r.angular.project_out(p.torque);
    }
}

#[instrument(level = "trace", skip_all)]
pub fn restrain_velocities(particles: &mut [Particle], restraints: &[Restraint]) {
    for r in restraints {
        let p = &mut particles[r.particle];
        p.lin_vel = r.linear.project_out(p.lin_vel);
        p.ang_vel_ref = r.angular.project_out(p.ang_vel_ref);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat3;

    #[test]
    fn restrained_axis_velocity_component_is_zeroed() {
        let mut particles = vec![Particle::new(1.0, DMat3::IDENTITY, 0)];
        particles[0].lin_vel = DVec3::new(3.0, 4.0, 5.0);
        let restraints = vec![Restraint {
            particle: 0,
            linear: DirectionSet { directions: vec![DVec3::X] },
            angular: DirectionSet::default(),
        }];

        restrain_velocities(&mut particles, &restraints);

        assert_eq!(particles[0].lin_vel.x, 0.0);
        assert_eq!(particles[0].lin_vel.y, 4.0);
        assert_eq!(particles[0].lin_vel.z, 5.0);
    }
}
