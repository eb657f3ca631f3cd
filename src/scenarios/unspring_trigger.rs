//! Scenario 6 (spec.md §8): a spring's own force feeds an UNSPRING rule that
//! watches itself; once the aggregate exceeds the threshold for two
//! consecutive checks the spring is deactivated and stops contributing
//! force.

use glam::{DMat3, DVec3};

use crate::callback::ScalarFn;
use crate::prescribed::{Component, Components, Kind, PrescribedMotion};
use crate::spring::{LinearSpring, SpringAttachment, SpringDirection, SpringLaw, SpringStatus};
use crate::timeseries::LoadCurve;
use crate::unspring::{Entity, Operator, UnloadAction, UnspringRule};
use crate::World;

#[test]
fn sustained_overload_deactivates_the_spring() {
    let mut world = World::new();
    let mat = world.add_material(1.0, 1.0, 0.3).unwrap();
    let idx = world.add_analytical_particle(1.0, DMat3::IDENTITY, mat, DVec3::ZERO).unwrap();

    // Drive a deterministic stroke ramp regardless of the spring's own
    // reaction force, so `SF` climbs predictably step over step.
    world
        .add_prescribed_motion(PrescribedMotion {
            particle: idx,
            kind: Kind::Velocity,
            linear: Components {
                x: Component(Some(ScalarFn::Constant(2.0))),
                ..Default::default()
            },
            angular: Components::default(),
        })
        .unwrap();

    let k = 2000.0;
    let spring = LinearSpring::new(
        SpringAttachment::on(idx, DVec3::ZERO),
        SpringAttachment::fixed(DVec3::ZERO),
        SpringDirection::Follower,
        SpringLaw::Linear(LoadCurve::new(&[-1.0, 1.0], &[-k, k]).unwrap()),
    );
    let spring_handle = world.add_linear_spring(spring).unwrap();

    world
        .add_unspring_rule(UnspringRule::new(
            vec![spring_handle],
            vec![spring_handle],
            vec![],
            Entity::SpringForce,
            Operator::Max,
            true,
            None,
            Some(100.0),
            10,
            2,
            UnloadAction::Instant,
        ))
        .unwrap();

    let h = 1e-3;
    for _ in 0..50 {
        world.step(h, 1.0).unwrap();
    }

    assert!(matches!(world.springs[spring_handle].status, SpringStatus::Inactive));

    world.step(h, 1.0).unwrap();
    assert_eq!(world.particles[idx].force, DVec3::ZERO);
}
