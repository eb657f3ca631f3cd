//! Adaptive step controller (AS, spec.md §4.10) and the per-particle
//! stiffness/damping accumulators the force assembler builds during FA.

use crate::particle::Particle;

/// Per-particle stiffness/damping aggregates, rebuilt every step by FA.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepAccumulator {
    /// Aggregate translational stiffness (contact + spring) seen by this
    /// particle this step.
    pub kmax: f64,
    /// Aggregate translational damping slope.
    pub emax: f64,
    /// Aggregate rotational stiffness contribution (lever-arm cross terms
    /// from springs plus torsional spring stiffness).
    pub krot: f64,
}

impl StepAccumulator {
    pub fn accumulate_linear(&mut self, k: f64, damping_slope: f64) {
        self.kmax += k;
        self.emax += damping_slope;
    }

    pub fn accumulate_rotational(&mut self, krot: f64) {
        self.krot += krot;
    }
}

/// Critical-step estimate for one particle from its accumulators
/// (spec.md §4.10): `h_crit = 2/omega_max * (sqrt(1+zeta^2) - zeta)`.
fn critical_step(kmax: f64, emax: f64, mass: f64) -> Option<f64> {
    if kmax <= 0.0 || mass <= 0.0 {
        return None;
    }
    let omega_max = (kmax / mass).sqrt();
    let zeta = emax / (2.0 * (kmax * mass).sqrt());
    Some(2.0 / omega_max * ((1.0 + zeta * zeta).sqrt() - zeta))
}

/// Rotational analogue using `krot` and the particle's inertia, taking the
/// smallest principal inertia as the limiting axis.
fn critical_step_rotational(krot: f64, particle: &Particle) -> Option<f64> {
    if krot <= 0.0 {
        return None;
    }
    let j_min = particle
        .inertia
        .x_axis
        .x
        .min(particle.inertia.y_axis.y)
        .min(particle.inertia.z_axis.z);
    if j_min <= 0.0 {
        return None;
    }
    let omega_max = (krot / j_min).sqrt();
    Some(2.0 / omega_max)
}

/// Computes `h_crit` over all particles and scales it by `adaptive` to
/// obtain the next step. Falls back to `fallback_step` (and reports a
/// `StepWarning`, spec.md §7) when no particle contributes a finite
/// critical step.
pub fn next_step(
    particles: &[Particle],
    accumulators: &[StepAccumulator],
    adaptive: f64,
    fallback_step: f64,
) -> (f64, Option<crate::error::StepWarning>) {
    let mut h_crit = f64::INFINITY;

    for (p, acc) in particles.iter().zip(accumulators) {
        if let Some(h) = critical_step(acc.kmax, acc.emax, p.mass) {
            h_crit = h_crit.min(h);
        }
        if let Some(h) = critical_step_rotational(acc.krot, p) {
            h_crit = h_crit.min(h);
        }
    }

    const EPS: f64 = 1e-300;
    if !h_crit.is_finite() || h_crit < EPS {
        return (
            fallback_step,
            Some(crate::error::StepWarning::CriticalStepCollapsed {
                h_crit,
                eps: EPS,
            }),
        );
    }

    (adaptive * h_crit, None)
}
