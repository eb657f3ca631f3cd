//! Force assembler — linear spring (LS, spec.md §4.4).
//!
//! A spring connects two attachment points, `part0` always a particle and
//! `part1` either a particle or a fixed point in space ("world"). Direction
//! mode, the force-stroke table, optional elastic-plastic unloading, a
//! dashpot and tangential friction combine into one total force applied
//! with opposite sign at each end.

use glam::DVec3;
use tracing::instrument;

use crate::adaptive::StepAccumulator;
use crate::callback::ScalarFn;
use crate::particle::Particle;
use crate::timeseries::LoadCurve;

/// One end of a spring: either a particle's body-fixed point, or a point
/// fixed in space.
#[derive(Clone, Debug)]
pub struct SpringAttachment {
    pub particle: Option<usize>,
    /// Offset in the particle's referential (body) frame; ignored when
    /// `particle` is `None`.
    pub local_point: DVec3,
    /// Used only when `particle` is `None`.
    pub world_point: DVec3,
}

impl SpringAttachment {
    pub fn fixed(point: DVec3) -> Self {
        Self {
            particle: None,
            local_point: DVec3::ZERO,
            world_point: point,
        }
    }

    pub fn on(particle: usize, local_point: DVec3) -> Self {
        Self {
            particle: Some(particle),
            local_point,
            world_point: DVec3::ZERO,
        }
    }

    fn point(&self, particles: &[Particle]) -> DVec3 {
        match self.particle {
            Some(p) => particles[p].pos + particles[p].rotation * self.local_point,
            None => self.world_point,
        }
    }

    fn velocity(&self, particles: &[Particle]) -> DVec3 {
        match self.particle {
            Some(p) => particles[p].point_velocity(self.point(particles)),
            None => DVec3::ZERO,
        }
    }

    fn mass(&self, particles: &[Particle]) -> Option<f64> {
        self.particle.map(|p| particles[p].mass)
    }
}

/// Spring direction mode (spec.md §4.4 step 1).
#[derive(Clone, Debug)]
pub enum SpringDirection {
    /// Tracks the line from `p0` to `p1`.
    Follower,
    /// `part0`'s referential direction, rotated by `part0`'s current
    /// orientation.
    Constant,
    /// `Constant`, projected onto the plane spanned by `part0`'s current
    /// orientation and renormalized.
    Planar,
    /// The plane normal stored on `part1`'s geometry, rotated by `part1`'s
    /// current orientation (or used as-is when `part1` is fixed in space).
    /// `p0` measures its signed distance to that plane.
    Project,
}

/// Backbone force-stroke law.
#[derive(Clone, Debug)]
pub enum SpringLaw {
    /// A single piecewise-linear table, no plastic memory.
    Linear(LoadCurve),
    /// Elastic-plastic backbone with an optional unloading branch that the
    /// spring slides along once it retreats from its extreme stroke,
    /// re-engaging the backbone at the same extreme (spec.md §4.4 step 3).
    GeneralNonlinear {
        backbone: LoadCurve,
        unload: Option<LoadCurve>,
        yield_compression: f64,
        yield_tension: f64,
    },
}

#[derive(Clone, Copy, Debug)]
enum Branch {
    Backbone,
    Unloading,
}

#[derive(Clone, Debug)]
pub enum DashpotLaw {
    Table(LoadCurve),
    CriticalRatio(f64),
    None,
}

/// `unspring[i]` status (spec.md §4.4): `-3`/`-2` both evaluate the nominal
/// law (the distinction only matters to the UNSPRING monitor's bookkeeping
/// of which springs are reserved); `-1` forces zero output; `Active` applies
/// a time-dependent multiplier from a fade-out load curve.
#[derive(Clone, Debug, Default)]
pub enum SpringStatus {
    #[default]
    Unused,
    Reserved,
    Inactive,
    Active(ScalarFn),
}

pub struct LinearSpring {
    pub part0: SpringAttachment,
    pub part1: SpringAttachment,
    pub direction: SpringDirection,
    /// Reference direction in `part0`'s referential frame, used by
    /// `Constant`/`Planar`.
    pub reference_dir_local: DVec3,
    /// Plane normal in the referential frame of `part0` (`Planar`) or
    /// `part1` (`Project`).
    pub plane_normal_local: DVec3,
    pub stroke0: f64,
    pub offset: ScalarFn,
    pub law: SpringLaw,
    pub dashpot: DashpotLaw,
    /// Coulomb friction coefficient on the in-plane slip force; `0`
    /// disables tangential friction.
    pub friction: f64,
    pub kskn: f64,
    pub status: SpringStatus,

    stroke_prev: f64,
    smin: f64,
    smax: f64,
    branch: Branch,
    tangential_disp: DVec3,
    /// `[s, min(s), max(s)]`.
    pub stroke_record: [f64; 3],
    /// `[|F_total . d|, F_s, |F_t|]`.
    pub force_record: [f64; 3],
}

impl LinearSpring {
    pub fn new(
        part0: SpringAttachment,
        part1: SpringAttachment,
        direction: SpringDirection,
        law: SpringLaw,
    ) -> Self {
        Self {
            part0,
            part1,
            direction,
            reference_dir_local: DVec3::X,
            plane_normal_local: DVec3::Z,
            stroke0: 0.0,
            offset: ScalarFn::Constant(0.0),
            law,
            dashpot: DashpotLaw::None,
            friction: 0.0,
            kskn: 1.0,
            status: SpringStatus::Unused,
            stroke_prev: 0.0,
            smin: 0.0,
            smax: 0.0,
            branch: Branch::Backbone,
            tangential_disp: DVec3::ZERO,
            stroke_record: [0.0; 3],
            force_record: [0.0; 3],
        }
    }

    fn resolve(&self, particles: &[Particle]) -> (DVec3, DVec3, DVec3, f64) {
        let p0 = self.part0.point(particles);
        let p1 = self.part1.point(particles);
        let owner_rot = self.part0.particle.map(|p| particles[p].rotation).unwrap_or(glam::DMat3::IDENTITY);

        match self.direction {
            SpringDirection::Follower => {
                let diff = p1 - p0;
                let len = diff.length();
                let d = if len > 1e-300 { diff / len } else { DVec3::X };
                (d, p0, p1, len)
            }
            SpringDirection::Constant => {
                let d = (owner_rot * self.reference_dir_local).normalize_or_zero();
                (d, p0, p1, (p1 - p0).dot(d))
            }
            SpringDirection::Planar => {
                let base = owner_rot * self.reference_dir_local;
                let normal = (owner_rot * self.plane_normal_local).normalize_or_zero();
                let d = (base - base.dot(normal) * normal).normalize_or_zero();
                (d, p0, p1, (p1 - p0).dot(d))
            }
            SpringDirection::Project => {
                let part1_rot = self.part1.particle.map(|p| particles[p].rotation).unwrap_or(glam::DMat3::IDENTITY);
                let normal = (part1_rot * self.plane_normal_local).normalize_or_zero();
                (normal, p0, p1, (p0 - p1).dot(normal))
            }
        }
    }

    fn backbone_force_and_slope(&mut self, s: f64) -> (f64, f64) {
        const EPS: f64 = 1e-6;
        match &mut self.law {
            SpringLaw::Linear(table) => {
                let f = table.eval(s);
                let slope = (table.eval(s + EPS) - table.eval(s - EPS)) / (2.0 * EPS);
                (f, slope)
            }
            SpringLaw::GeneralNonlinear {
                backbone,
                unload,
                yield_compression,
                yield_tension,
            } => {
                if s > self.smax {
                    self.smax = s;
                    self.branch = Branch::Backbone;
                } else if s < self.smin {
                    self.smin = s;
                    self.branch = Branch::Backbone;
                } else if s < self.stroke_prev && self.smax > self.smin {
                    self.branch = Branch::Unloading;
                }

                let raw = match (&self.branch, unload.as_mut()) {
                    (Branch::Unloading, Some(u)) => u.eval(s),
                    _ => backbone.eval(s),
                };
                let slope = match (&self.branch, unload.as_mut()) {
                    (Branch::Unloading, Some(u)) => (u.eval(s + EPS) - u.eval(s - EPS)) / (2.0 * EPS),
                    _ => (backbone.eval(s + EPS) - backbone.eval(s - EPS)) / (2.0 * EPS),
                };
                (raw.clamp(*yield_compression, *yield_tension), slope)
            }
        }
    }
}

/// Evaluates every spring's force law and accumulates it into `particles`
/// and the per-particle adaptive-step accumulators.
#[instrument(level = "trace", skip_all)]
pub fn apply_linear_springs(
    particles: &mut [Particle],
    springs: &mut [LinearSpring],
    accumulators: &mut [StepAccumulator],
    time: f64,
    dt: f64,
) {
    for spring in springs.iter_mut() {
        let multiplier = match &spring.status {
            SpringStatus::Unused | SpringStatus::Reserved => 1.0,
            SpringStatus::Inactive => {
                spring.stroke_record = [spring.stroke_record[0], spring.smin, spring.smax];
                spring.force_record = [0.0, 0.0, 0.0];
                continue;
            }
            SpringStatus::Active(curve) => curve.eval(time),
        };

        // A fade curve that has reached (and, by construction, holds at)
        // zero returns the spring to inactive rather than keep evaluating
        // it as `Active` forever (spec.md §4.11(a)).
        if matches!(spring.status, SpringStatus::Active(_)) && multiplier == 0.0 {
            spring.status = SpringStatus::Inactive;
            spring.stroke_record = [spring.stroke_record[0], spring.smin, spring.smax];
            spring.force_record = [0.0, 0.0, 0.0];
            continue;
        }

        let (d, p0, p1, raw) = spring.resolve(particles);
        let offset = spring.offset.eval(time);
        let s = raw - spring.stroke0 - offset;

        let (f_s, k_eff) = spring.backbone_force_and_slope(s);
        let k_eff = k_eff.abs();

        let v0 = spring.part0.velocity(particles);
        let v1 = spring.part1.velocity(particles);
        let v_rel = v1 - v0;
        let sdot = v_rel.dot(d);

        let m0 = spring.part0.mass(particles).unwrap_or(0.0);
        let m1 = spring.part1.mass(particles);
        let inv_m_red = 1.0 / m0.max(1e-300) + m1.map(|m| 1.0 / m.max(1e-300)).unwrap_or(0.0);
        let m_red = if inv_m_red > 1e-300 { 1.0 / inv_m_red } else { m0 };

        let (f_d, c_eff) = match &mut spring.dashpot {
            DashpotLaw::Table(curve) => {
                let f = curve.eval(sdot);
                let slope = (curve.eval(sdot + 1e-6) - curve.eval(sdot - 1e-6)) / 2e-6;
                (f, slope.abs())
            }
            DashpotLaw::CriticalRatio(zeta) => {
                let c = 2.0 * *zeta * (k_eff * m_red).sqrt();
                (c * sdot, c)
            }
            DashpotLaw::None => (0.0, 0.0),
        };

        let v_t = v_rel - sdot * d;
        spring.tangential_disp += v_t * dt;
        let f_t_trial = spring.tangential_disp * (spring.kskn * k_eff);
        let f_t = if spring.friction > 0.0 {
            let limit = spring.friction * f_s.abs();
            if f_t_trial.length() > limit && f_t_trial.length() > 1e-300 {
                let clipped = f_t_trial.normalize() * limit;
                spring.tangential_disp = clipped / (spring.kskn * k_eff).max(1e-300);
                clipped
            } else {
                f_t_trial
            }
        } else {
            DVec3::ZERO
        };

        let total = (multiplier * (f_s + f_d)) * d + f_t;

        if let Some(p) = spring.part0.particle {
            let lever = p0 - particles[p].pos;
            particles[p].force += total;
            particles[p].torque += lever.cross(total);
            accumulators[p].accumulate_linear(k_eff, c_eff);
            accumulators[p].accumulate_rotational(k_eff * lever.length_squared());
        }
        if let Some(p) = spring.part1.particle {
            let lever = p1 - particles[p].pos;
            particles[p].force -= total;
            particles[p].torque -= lever.cross(total);
            accumulators[p].accumulate_linear(k_eff, c_eff);
            accumulators[p].accumulate_rotational(k_eff * lever.length_squared());
        }

        spring.smax = spring.smax.max(s);
        spring.smin = spring.smin.min(s);
        spring.stroke_record = [s, spring.smin, spring.smax];
        spring.force_record = [total.dot(d).abs(), f_s, f_t.length()];
        spring.stroke_prev = s;
    }
}
