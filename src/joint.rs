//! Joint solver (JS, spec.md §4.6): bilateral point-coincidence constraints
//! assembled into one sparse-block linear system and solved once per step.
//!
//! Block assembly follows the reference engine's `reset_joints_matrix` /
//! per-step value fill exactly, including its off-diagonal sign-flip rule
//! for a particle shared between two joints in opposite slots. Problem
//! sizes in this engine are small enough that a dense `nalgebra` solve
//! stands in for the reference's pluggable sparse backends (spec.md §4.6,
//! option (c): "a skyline-LU for systems below a pluggable size threshold").

use std::collections::HashMap;

use glam::{DMat3, DVec3};
use tracing::instrument;

use crate::error::{DemError, DemResult};
use crate::particle::{skew_matrix, Particle};

/// A bilateral point constraint between `part0` and, optionally, `part1`
/// (`None` pins the point to the fixed world location `world_point`).
pub struct Joint {
    pub part0: usize,
    pub part1: Option<usize>,
    pub world_point: DVec3,
}

impl Joint {
    fn particle(&self, slot: usize) -> Option<usize> {
        match slot {
            0 => Some(self.part0),
            1 => self.part1,
            _ => unreachable!(),
        }
    }

    /// The shared coincidence point this step: the midpoint of the two
    /// attachment points, converging to exact coincidence as the solver
    /// drives relative velocity to zero.
    fn point(&self, particles: &[Particle]) -> DVec3 {
        match self.part1 {
            Some(p1) => 0.5 * (particles[self.part0].pos + particles[p1].pos),
            None => self.world_point,
        }
    }
}

/// First-order velocity prediction ignoring joint reactions but including
/// the integrator's gyroscopic coupling, used only to build the joint
/// solver's right-hand side (spec.md §4.6: "obtained by predicting
/// velocities one step ahead without joint forces"; spec.md §4.9 requires
/// the gyroscopic term `w x (J.w)` in the same velocity update this
/// predicts).
fn predicted_point_velocity(p: &Particle, point: DVec3, h: f64) -> DVec3 {
    let v_lin = p.lin_vel + h * p.force * p.inv_mass;

    let jw = p.inertia * p.ang_vel_ref;
    let body_torque = p.rotation.transpose() * p.torque;
    let gyroscopic = p.ang_vel_ref.cross(jw);
    let omega_ref = p.inv_inertia * (jw + h * (body_torque - gyroscopic));
    let omega = p.rotation * omega_ref;

    v_lin + omega.cross(point - p.pos)
}

/// Particle-to-joint adjacency, rebuilt only when joint topology changes
/// (spec.md §4.6: "Assembly is performed symbolically once per
/// joint-topology change").
#[derive(Default)]
pub struct JointTopology {
    adjacency: HashMap<usize, Vec<usize>>,
}

impl JointTopology {
    pub fn rebuild(joints: &[Joint]) -> Self {
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, joint) in joints.iter().enumerate() {
            adjacency.entry(joint.part0).or_default().push(i);
            if let Some(p1) = joint.part1 {
                adjacency.entry(p1).or_default().push(i);
            }
        }
        Self { adjacency }
    }
}

fn sign_flip(joints: &[Joint], i: usize, j: usize, shared: usize) -> bool {
    let slot_in = |joint: &Joint, part: usize| -> Option<usize> {
        if joint.part0 == part {
            Some(0)
        } else if joint.part1 == Some(part) {
            Some(1)
        } else {
            None
        }
    };
    let si = slot_in(&joints[i], shared);
    let sj = slot_in(&joints[j], shared);
    matches!((si, sj), (Some(0), Some(1)) | (Some(1), Some(0)))
}

/// Assembles `W` and `b`, solves `W . R = b`, and applies `R / h` as force
/// (and the corresponding lever-arm torque) on every joint's particles.
#[instrument(level = "trace", skip(particles, joints, topology))]
pub fn solve_joints(particles: &mut [Particle], joints: &[Joint], topology: &JointTopology, h: f64) -> DemResult<()> {
    if joints.is_empty() {
        return Ok(());
    }

    let points: Vec<DVec3> = joints.iter().map(|j| j.point(particles)).collect();
    let mut blocks: HashMap<(usize, usize), DMat3> = HashMap::new();

    for (i, joint) in joints.iter().enumerate() {
        let mut wii = DMat3::ZERO;

        for slot in 0..2 {
            let Some(part) = joint.particle(slot) else { continue };
            let p = &particles[part];
            let a = p.pos - points[i];
            let hi = p.rotation * skew_matrix(a);
            let c = p.inv_inertia.transpose() * hi;
            wii += hi * c;
            wii += DMat3::from_diagonal(DVec3::splat(p.inv_mass));

            if let Some(adj) = topology.adjacency.get(&part) {
                for &j in adj {
                    if j == i {
                        continue;
                    }
                    let aj = p.pos - points[j];
                    let hj = p.rotation * skew_matrix(aj);
                    let cj = p.inv_inertia.transpose() * hj;
                    let mut wij = hi * cj;
                    wij += DMat3::from_diagonal(DVec3::splat(p.inv_mass));
                    if sign_flip(joints, i, j, part) {
                        wij *= -1.0;
                    }
                    *blocks.entry((i, j)).or_insert(DMat3::ZERO) += wij;
                }
            }
        }

        *blocks.entry((i, i)).or_insert(DMat3::ZERO) += wii;
    }

    let n = joints.len();
    let mut w = nalgebra::DMatrix::<f64>::zeros(3 * n, 3 * n);
    for ((bi, bj), block) in &blocks {
        let cols = [block.x_axis, block.y_axis, block.z_axis];
        for col in 0..3 {
            let c = cols[col].to_array();
            for row in 0..3 {
                w[(3 * bi + row, 3 * bj + col)] = c[row];
            }
        }
    }

    let mut b = nalgebra::DVector::<f64>::zeros(3 * n);
    for (i, joint) in joints.iter().enumerate() {
        let v0 = predicted_point_velocity(&particles[joint.part0], points[i], h);
        let v1 = match joint.part1 {
            Some(p1) => predicted_point_velocity(&particles[p1], points[i], h),
            None => DVec3::ZERO,
        };
        let rhs = v1 - v0;
        b[3 * i] = rhs.x;
        b[3 * i + 1] = rhs.y;
        b[3 * i + 2] = rhs.z;
    }

    let lu = w.lu();
    let solution = lu.solve(&b).ok_or_else(|| DemError::SingularJointMatrix {
        joints: (0..n).collect(),
    })?;

    for (i, joint) in joints.iter().enumerate() {
        let r = DVec3::new(solution[3 * i], solution[3 * i + 1], solution[3 * i + 2]);
        let impulse_rate = r / h;

        let lever0 = particles[joint.part0].pos - points[i];
        particles[joint.part0].force += impulse_rate;
        particles[joint.part0].torque += lever0.cross(impulse_rate);

        if let Some(p1) = joint.part1 {
            let lever1 = particles[p1].pos - points[i];
            particles[p1].force -= impulse_rate;
            particles[p1].torque -= lever1.cross(impulse_rate);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat3;

    fn particle_at(pos: DVec3) -> Particle {
        let mut p = Particle::new(1.0, DMat3::IDENTITY, 0);
        p.pos = pos;
        p
    }

    #[test]
    fn pinned_particle_reaction_cancels_predicted_drift() {
        let mut particles = vec![particle_at(DVec3::ZERO)];
        particles[0].force = DVec3::new(0.0, 0.0, -9.81);
        let joints = vec![Joint {
            part0: 0,
            part1: None,
            world_point: DVec3::ZERO,
        }];
        let topology = JointTopology::rebuild(&joints);

        solve_joints(&mut particles, &joints, &topology, 1e-3).unwrap();

        let predicted = predicted_point_velocity(&particles[0], DVec3::ZERO, 1e-3);
        assert!(predicted.length() < 1e-9);
    }
}
