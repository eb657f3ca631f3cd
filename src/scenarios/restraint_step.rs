//! Scenario 5 (spec.md §8): a single restrained particle under gravity,
//! checked against the exact post-step velocity.

use glam::{DMat3, DVec3};

use crate::callback::VectorFn;
use crate::restraint::{DirectionSet, Restraint};
use crate::World;

#[test]
fn restrained_axis_is_exactly_zero_after_one_step() {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0, 0.3).unwrap();
    let idx = world.add_analytical_particle(1.0, DMat3::IDENTITY, mat, DVec3::ZERO).unwrap();
    world.particles[idx].lin_vel = DVec3::new(3.0, 4.0, 5.0);
    world.set_gravity(VectorFn::Constant(DVec3::new(0.0, 0.0, -9.81)));

    world
        .add_restraint(Restraint {
            particle: idx,
            linear: DirectionSet { directions: vec![DVec3::X] },
            angular: DirectionSet::default(),
        })
        .unwrap();

    let h = 1e-3;
    world.step(h, 1.0).unwrap();

    let v = world.particles[idx].lin_vel;
    assert_eq!(v.x, 0.0);
    assert_eq!(v.y, 4.0);
    assert!((v.z - (5.0 - 9.81 * h)).abs() < 1e-12);
}
