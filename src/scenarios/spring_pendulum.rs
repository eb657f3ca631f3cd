//! Scenario 3 (spec.md §8): a sphere on a linear spring tethered to a fixed
//! world point under gravity, checked for total mechanical energy
//! conservation under the adaptive step controller.

use glam::{DMat3, DVec3};

use crate::callback::VectorFn;
use crate::spring::{LinearSpring, SpringAttachment, SpringDirection, SpringLaw};
use crate::timeseries::LoadCurve;
use crate::World;

#[test]
fn total_mechanical_energy_is_conserved() {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0, 0.3).unwrap();
    let idx = world
        .add_analytical_particle(1.0, DMat3::IDENTITY, mat, DVec3::new(0.1, 0.0, -1.0))
        .unwrap();
    world.set_gravity(VectorFn::Constant(DVec3::new(0.0, 0.0, -9.81)));

    let k = 1000.0;
    let mut spring = LinearSpring::new(
        SpringAttachment::on(idx, DVec3::ZERO),
        SpringAttachment::fixed(DVec3::ZERO),
        SpringDirection::Follower,
        SpringLaw::Linear(LoadCurve::new(&[-10.0, 10.0], &[-10.0 * k, 10.0 * k]).unwrap()),
    );
    spring.stroke0 = 1.0;
    world.add_linear_spring(spring).unwrap();

    let total_energy = |w: &World| {
        let p = &w.particles[idx];
        let ke = 0.5 * p.mass * p.lin_vel.length_squared();
        let pe_grav = p.mass * 9.81 * p.pos.z;
        let stretch = p.pos.length() - 1.0;
        let pe_spring = 0.5 * k * stretch * stretch;
        ke + pe_grav + pe_spring
    };
    let e0 = total_energy(&world);

    world.dem(10.0, 1e-4, 0.2).unwrap();

    let e1 = total_energy(&world);
    assert!((e1 - e0).abs() / e0.abs() < 0.01, "energy drifted: {e0} -> {e1}");
}
