//! Error taxonomy for the model-definition surface and the stepping loop.
//!
//! Input-validation and topology errors are returned from creation APIs and
//! never enter the stepping loop (spec.md §7). Runtime errors abort the
//! current step and carry the simulation time at which they occurred.

use thiserror::Error;

/// A handle into one of the engine's entity tables.
pub type Handle = usize;

#[derive(Debug, Error)]
pub enum DemError {
    #[error("material must have density > 0, Young modulus > 0, Poisson ratio in (0, 0.5); got density={density}, young={young}, poisson={poisson}")]
    InvalidMaterial {
        density: f64,
        young: f64,
        poisson: f64,
    },

    #[error("particle mass must be positive, got {0}")]
    InvalidParticleMass(f64),

    #[error("{what} refers to out-of-range particle index {index}")]
    DanglingParticleIndex { what: &'static str, index: i64 },

    #[error("{what} refers to out-of-range material index {index}")]
    DanglingMaterialIndex { what: &'static str, index: usize },

    #[error("{what} refers to out-of-range spring index {index}")]
    DanglingSpringIndex { what: &'static str, index: usize },

    #[error("{table} table must have strictly increasing x values")]
    NonMonotoneTable { table: &'static str },

    #[error("spring {spring} is already reserved as a modified spring by rule {rule}")]
    SpringAlreadyReserved { spring: Handle, rule: Handle },

    #[error("spring {spring} cannot be listed in `activate` because it is currently active")]
    ActivateAlreadyActive { spring: Handle },

    #[error("joint matrix factorization failed (singular W); joints involved: {joints:?}")]
    SingularJointMatrix { joints: Vec<Handle> },

    #[error("callback `{name}` returned a value of the wrong shape")]
    CallbackShapeError { name: &'static str },
}

/// A condition that is reported but does not abort the step (spec.md §7).
#[derive(Debug, Clone, PartialEq)]
pub enum StepWarning {
    /// The critical step estimate collapsed below `eps`; the controller fell
    /// back to the caller-supplied step.
    CriticalStepCollapsed { h_crit: f64, eps: f64 },
}

pub type DemResult<T> = Result<T, DemError>;
