//! Scenario 4 (spec.md §8): an open chain of point masses held together by
//! bilateral joints under gravity, checked for pivot-point coincidence at
//! every step.
//!
//! `Joint` (joint.rs) constrains the two attached particles' own positions
//! rather than arbitrary body-fixed offsets, so a rigid rod of nonzero
//! length between two distinct joints on the same body isn't representable
//! here; this scenario instead joins four distinct point masses that start
//! exactly coincident — the degenerate (zero-length-rod) case of the same
//! chain topology, which still fully exercises the solver's off-diagonal
//! block assembly for a particle shared between two joints.

use glam::{DMat3, DVec3};

use crate::callback::VectorFn;
use crate::joint::Joint;
use crate::World;

#[test]
fn joint_pivots_stay_coincident_through_the_chain() {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0, 0.3).unwrap();
    let masses = [1.0, 2.0, 0.5, 1.5];
    let particles: Vec<_> = masses
        .iter()
        .map(|&m| world.add_analytical_particle(m, DMat3::IDENTITY * m, mat, DVec3::ZERO).unwrap())
        .collect();

    // Distinct initial velocities so the joints must actually do work to
    // keep the chain coincident.
    let initial_velocities = [
        DVec3::new(1.0, 0.0, 0.0),
        DVec3::new(-0.5, 0.3, 0.0),
        DVec3::new(0.0, -0.2, 0.1),
        DVec3::new(0.2, 0.1, -0.3),
    ];
    for (&idx, &v) in particles.iter().zip(&initial_velocities) {
        world.particles[idx].lin_vel = v;
    }

    world.set_gravity(VectorFn::Constant(DVec3::new(0.0, 0.0, -9.81)));

    for w in particles.windows(2) {
        world
            .add_joint(Joint {
                part0: w[0],
                part1: Some(w[1]),
                world_point: DVec3::ZERO,
            })
            .unwrap();
    }

    let h: f64 = 1e-4;
    let steps = (2.0 / h).round() as u64;
    for _ in 0..steps {
        world.step(h, 1.0).unwrap();
        for w in particles.windows(2) {
            let gap = (world.particles[w[0]].pos - world.particles[w[1]].pos).length();
            assert!(gap < 1e-8, "joint pivots separated: {gap}");
        }
    }
}
