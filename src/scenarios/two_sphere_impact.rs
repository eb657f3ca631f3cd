//! Scenario 1 (spec.md §8): two spheres colliding head-on, checked against
//! the closed-form coefficient of restitution for a linear spring-dashpot
//! contact law.

use glam::{DMat3, DVec3};

use crate::material::PairParams;
use crate::World;

#[test]
fn coefficient_of_restitution_matches_closed_form() {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0, 0.3).unwrap();
    let inertia = DMat3::from_diagonal(DVec3::splat(0.4)); // 2/5 m r^2, m = r = 1

    let a = world
        .add_sphere_particle(1.0, inertia, mat, DVec3::new(-3.0, 0.0, 0.0), 1.0, 0)
        .unwrap();
    let b = world
        .add_sphere_particle(1.0, inertia, mat, DVec3::new(3.0, 0.0, 0.0), 1.0, 0)
        .unwrap();
    world.particles[a].lin_vel = DVec3::new(1.0, 0.0, 0.0);
    world.particles[b].lin_vel = DVec3::new(-1.0, 0.0, 0.0);

    let zeta = 0.1_f64;
    let k = 1.0e6_f64;
    let c = 2.0 * (k * 1.0_f64).sqrt() * zeta;
    world.set_pair_params(
        0,
        0,
        PairParams {
            spring: k,
            damper: c,
            ..Default::default()
        },
    );

    let h: f64 = 1e-5;
    let steps = (0.02 / h).round() as u64;
    let mut g_min = f64::INFINITY;
    for _ in 0..steps {
        world.step(h, 1.0).unwrap();
        let gap = (world.particles[b].pos - world.particles[a].pos).length() - 2.0;
        g_min = g_min.min(gap);
    }

    let v_rel_final = world.particles[a].lin_vel.x - world.particles[b].lin_vel.x;
    let restitution = -v_rel_final / 2.0;
    let expected = (-std::f64::consts::PI * zeta / (1.0 - zeta * zeta).sqrt()).exp();

    assert!((g_min - (-1.9e-3)).abs() < 5e-4, "g_min = {g_min}");
    assert!(
        (restitution - expected).abs() / expected < 0.05,
        "restitution = {restitution}, expected {expected}"
    );
}
