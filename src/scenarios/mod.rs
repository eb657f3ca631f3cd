//! End-to-end scenarios exercising the full `World::step` pipeline against
//! the closed-form or energy/momentum expectations used to validate the
//! engine as a whole, as opposed to one module in isolation.

pub mod four_bar_chain;
pub mod free_rotator;
pub mod restraint_step;
pub mod spring_pendulum;
pub mod two_sphere_impact;
pub mod unspring_trigger;
