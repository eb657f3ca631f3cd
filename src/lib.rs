//! Crate root: the `World` entity tables and the per-step pipeline
//! (spec.md §2): OD -> CD -> FA -> PD -> RA -> JS -> IN -> SU -> SE -> AS.

pub mod adaptive;
pub mod callback;
pub mod contact;
pub mod error;
pub mod force;
pub mod geometry;
pub mod integrator;
pub mod joint;
pub mod material;
pub mod obstacle;
pub mod partition;
pub mod particle;
pub mod prescribed;
pub mod restraint;
#[cfg(test)]
pub mod scenarios;
pub mod shape_update;
pub mod spring;
pub mod timeseries;
pub mod torsion;
pub mod unspring;

use glam::{DMat3, DVec3};
use tracing::instrument;

use adaptive::StepAccumulator;
use callback::VectorFn;
use contact::ContactDetector;
use error::{DemError, DemResult, Handle, StepWarning};
use force::apply_contact_forces;
use geometry::{Ellipsoid, Triangle, TriangleOwner};
use joint::{solve_joints, Joint, JointTopology};
use material::{Material, PairParams, PairTable};
use obstacle::{advance_obstacles, Obstacle};
use partition::PartitionTree;
use particle::{Particle, ParticleFlags};
use prescribed::{apply_prescribed_acceleration, apply_prescribed_velocity, PrescribedMotion};
use restraint::{restrain_forces, restrain_velocities, Restraint};
use shape_update::{update_ellipsoids, update_triangles};
use spring::{apply_linear_springs, LinearSpring, SpringStatus};
use torsion::{apply_torsional_springs, TorsionalSpring};
use unspring::{check_unspring_rules, UnspringRule};

/// The full model: every entity table plus the mutable state the per-step
/// pipeline threads through (spec.md §2/§3). Entities are referenced by
/// their index into the owning table (spec.md's "handles are stable
/// indices, never recycled").
pub struct World {
    pub materials: Vec<Material>,
    pub particles: Vec<Particle>,
    pub ellipsoids: Vec<Ellipsoid>,
    pub triangles: Vec<Triangle>,
    pub obstacles: Vec<Obstacle>,
    pub springs: Vec<LinearSpring>,
    pub torsional_springs: Vec<TorsionalSpring>,
    pub joints: Vec<Joint>,
    pub restraints: Vec<Restraint>,
    pub prescribed: Vec<PrescribedMotion>,
    pub unspring_rules: Vec<UnspringRule>,
    pub pair_table: PairTable,
    pub gravity: VectorFn,
    pub damping_linear: f64,
    pub damping_angular: f64,

    joint_topology: JointTopology,
    tree: PartitionTree,
    active_ellipsoids: Vec<usize>,
    contact_detector: ContactDetector,
    accumulators: Vec<StepAccumulator>,
    step_count: u64,
    time: f64,
    /// Set once `step` has run the integrator's leapfrog half-step
    /// (spec.md §4.9 step 1); `dem`/`step` run it exactly once, on first
    /// call after construction or after `reset`.
    started: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            materials: Vec::new(),
            particles: Vec::new(),
            ellipsoids: Vec::new(),
            triangles: Vec::new(),
            obstacles: Vec::new(),
            springs: Vec::new(),
            torsional_springs: Vec::new(),
            joints: Vec::new(),
            restraints: Vec::new(),
            prescribed: Vec::new(),
            unspring_rules: Vec::new(),
            pair_table: PairTable::default(),
            gravity: VectorFn::default(),
            damping_linear: 0.0,
            damping_angular: 0.0,
            joint_topology: JointTopology::default(),
            tree: PartitionTree::empty(),
            active_ellipsoids: Vec::new(),
            contact_detector: ContactDetector::new(),
            accumulators: Vec::new(),
            step_count: 0,
            time: 0.0,
            started: false,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    fn check_material(&self, what: &'static str, index: usize) -> DemResult<()> {
        if index >= self.materials.len() {
            return Err(DemError::DanglingMaterialIndex { what, index });
        }
        Ok(())
    }

    fn check_particle(&self, what: &'static str, index: usize) -> DemResult<()> {
        if index >= self.particles.len() {
            return Err(DemError::DanglingParticleIndex {
                what,
                index: index as i64,
            });
        }
        Ok(())
    }

    fn check_spring(&self, what: &'static str, index: usize) -> DemResult<()> {
        if index >= self.springs.len() {
            return Err(DemError::DanglingSpringIndex { what, index });
        }
        Ok(())
    }

    pub fn add_material(&mut self, density: f64, young: f64, poisson: f64) -> DemResult<Handle> {
        let material = Material::new(density, young, poisson)?;
        self.materials.push(material);
        Ok(self.materials.len() - 1)
    }

    fn push_particle(&mut self, mass: f64, inertia: DMat3, material: usize, pos: DVec3) -> DemResult<Handle> {
        if !(mass > 0.0) {
            return Err(DemError::InvalidParticleMass(mass));
        }
        self.check_material("particle", material)?;
        let handle = self.particles.len();
        let mut p = Particle::new(mass, inertia, material);
        p.pos = pos;
        p.pos_prev = pos;
        self.particles.push(p);
        self.accumulators.push(StepAccumulator::default());
        Ok(handle)
    }

    /// A dynamical sphere: mass, inertia, material, and a contact sphere of
    /// `radius` centered on the particle (spec.md §3, entity
    /// **Ellipsoid/Sphere** with `radius2 < 0`).
    pub fn add_sphere_particle(
        &mut self,
        mass: f64,
        inertia: DMat3,
        material: usize,
        pos: DVec3,
        radius: f64,
        color: i32,
    ) -> DemResult<Handle> {
        let handle = self.push_particle(mass, inertia, material, pos)?;
        let idx = self.ellipsoids.len();
        self.ellipsoids.push(Ellipsoid {
            owner: handle,
            center: pos,
            center_ref: DVec3::ZERO,
            radii: DVec3::new(radius, -1.0, -1.0),
            orientation: DMat3::IDENTITY,
            orientation_ref: DMat3::IDENTITY,
            color,
        });
        self.active_ellipsoids.push(idx);
        Ok(handle)
    }

    /// A dynamical general ellipsoid with three independent semi-axes and a
    /// referential orientation.
    pub fn add_ellipsoid_particle(
        &mut self,
        mass: f64,
        inertia: DMat3,
        material: usize,
        pos: DVec3,
        radii: DVec3,
        orientation: DMat3,
        color: i32,
    ) -> DemResult<Handle> {
        let handle = self.push_particle(mass, inertia, material, pos)?;
        let idx = self.ellipsoids.len();
        self.ellipsoids.push(Ellipsoid {
            owner: handle,
            center: pos,
            center_ref: DVec3::ZERO,
            radii,
            orientation,
            orientation_ref: orientation,
            color,
        });
        self.active_ellipsoids.push(idx);
        Ok(handle)
    }

    /// A particle whose geometry is supplied externally and never touched
    /// by CD/SU (spec.md §9, `ANALYTICAL` flag).
    pub fn add_analytical_particle(&mut self, mass: f64, inertia: DMat3, material: usize, pos: DVec3) -> DemResult<Handle> {
        let handle = self.push_particle(mass, inertia, material, pos)?;
        self.particles[handle].flags.insert(ParticleFlags::ANALYTICAL);
        Ok(handle)
    }

    /// A dynamical particle whose contact surface is a triangle mesh, given
    /// as vertex triples in the particle's referential frame (spec.md §3,
    /// entity **Triangle** with `owner` a particle).
    pub fn add_meshed_particle(
        &mut self,
        mass: f64,
        inertia: DMat3,
        material: usize,
        pos: DVec3,
        local_triangles: Vec<[DVec3; 3]>,
        color: i32,
    ) -> DemResult<Handle> {
        let handle = self.push_particle(mass, inertia, material, pos)?;
        for local_vertices in local_triangles {
            self.triangles.push(Triangle {
                vertices: local_vertices.map(|v| pos + v),
                local_vertices,
                color,
                owner: TriangleOwner::Particle(handle),
            });
        }
        Ok(handle)
    }

    /// A fixed (non-moving) obstacle surface. Its triangles carry no
    /// velocity at all — contact against it always sees `v_partner = 0`
    /// (spec.md §3, `TriangleOwner::StaticObstacle`).
    pub fn add_static_obstacle(&mut self, triangles: Vec<[DVec3; 3]>, color: i32) -> Vec<Handle> {
        triangles
            .into_iter()
            .map(|vertices| {
                let idx = self.triangles.len();
                self.triangles.push(Triangle {
                    vertices,
                    local_vertices: vertices,
                    color,
                    owner: TriangleOwner::StaticObstacle,
                });
                idx
            })
            .collect()
    }

    /// An obstacle advanced rigidly about `pivot` by a prescribed
    /// linear/angular velocity (spec.md §3, entity **Obstacle**).
    pub fn add_moving_obstacle(
        &mut self,
        pivot: DVec3,
        triangles: Vec<[DVec3; 3]>,
        color: i32,
        linear_velocity: VectorFn,
        angular_velocity: VectorFn,
    ) -> Handle {
        let obstacle_idx = self.obstacles.len() as u32;
        let start = self.triangles.len();
        for vertices in triangles {
            self.triangles.push(Triangle {
                vertices,
                local_vertices: vertices,
                color,
                owner: TriangleOwner::MovingObstacle(obstacle_idx),
            });
        }
        let end = self.triangles.len();
        self.obstacles.push(Obstacle {
            pivot,
            triangle_range: start..end,
            linear_velocity,
            angular_velocity,
        });
        obstacle_idx as usize
    }

    pub fn add_linear_spring(&mut self, spring: LinearSpring) -> DemResult<Handle> {
        if let Some(p) = spring.part0.particle {
            self.check_particle("linear spring part0", p)?;
        }
        if let Some(p) = spring.part1.particle {
            self.check_particle("linear spring part1", p)?;
        }
        self.springs.push(spring);
        Ok(self.springs.len() - 1)
    }

    pub fn add_torsional_spring(&mut self, spring: TorsionalSpring) -> DemResult<Handle> {
        self.check_particle("torsional spring part0", spring.part0)?;
        self.check_particle("torsional spring part1", spring.part1)?;
        self.torsional_springs.push(spring);
        Ok(self.torsional_springs.len() - 1)
    }

    /// Registers a bilateral joint and rebuilds the particle-to-joint
    /// adjacency used by the solver's off-diagonal block assembly (spec.md
    /// §4.6, "symbolic assembly ... once per joint-topology change").
    pub fn add_joint(&mut self, joint: Joint) -> DemResult<Handle> {
        self.check_particle("joint part0", joint.part0)?;
        if let Some(p1) = joint.part1 {
            self.check_particle("joint part1", p1)?;
        }
        self.joints.push(joint);
        self.joint_topology = JointTopology::rebuild(&self.joints);
        Ok(self.joints.len() - 1)
    }

    pub fn add_restraint(&mut self, restraint: Restraint) -> DemResult<Handle> {
        self.check_particle("restraint", restraint.particle)?;
        self.restraints.push(restraint);
        Ok(self.restraints.len() - 1)
    }

    pub fn add_prescribed_motion(&mut self, motion: PrescribedMotion) -> DemResult<Handle> {
        self.check_particle("prescribed motion", motion.particle)?;
        self.prescribed.push(motion);
        Ok(self.prescribed.len() - 1)
    }

    /// Registers an UNSPRING rule, validating that no `modified_springs`
    /// entry is already claimed by another rule and no `activate` entry is
    /// currently active (spec.md §7), then reserves the modified set so a
    /// later rule referencing the same spring is rejected.
    pub fn add_unspring_rule(&mut self, rule: UnspringRule) -> DemResult<Handle> {
        for &s in &rule.test_springs {
            self.check_spring("unspring test spring", s)?;
        }
        for &s in &rule.modified_springs {
            self.check_spring("unspring modified spring", s)?;
            if matches!(self.springs[s].status, SpringStatus::Reserved) {
                return Err(DemError::SpringAlreadyReserved {
                    spring: s,
                    rule: self.unspring_rules.len(),
                });
            }
        }
        for &s in &rule.activate {
            self.check_spring("unspring activate spring", s)?;
            if !matches!(self.springs[s].status, SpringStatus::Unused | SpringStatus::Inactive) {
                return Err(DemError::ActivateAlreadyActive { spring: s });
            }
        }
        for &s in &rule.modified_springs {
            self.springs[s].status = SpringStatus::Reserved;
        }
        self.unspring_rules.push(rule);
        Ok(self.unspring_rules.len() - 1)
    }

    pub fn set_gravity(&mut self, gravity: VectorFn) {
        self.gravity = gravity;
    }

    pub fn set_damping(&mut self, linear: f64, angular: f64) {
        self.damping_linear = linear;
        self.damping_angular = angular;
    }

    pub fn set_pair_params(&mut self, color1: i32, color2: i32, params: PairParams) {
        self.pair_table.set(color1, color2, params);
    }

    /// Re-homes the stepping clock without discarding any entity. Callers
    /// that want a fully independent run construct a new `World`; `reset`
    /// is for restarting the same model from its current kinematic state
    /// (spec.md §9, time series restart via a backwards time jump — the
    /// partition tree and contact persistence are dropped since they are
    /// pure caches of the previous stepping history).
    pub fn reset(&mut self) {
        self.step_count = 0;
        self.time = 0.0;
        self.started = false;
        self.tree.destroy();
        self.contact_detector = ContactDetector::new();
    }

    /// Runs one full OD -> CD -> FA -> PD -> RA -> JS -> IN -> SU -> SE -> AS
    /// pipeline step of size `h` (spec.md §2) and returns the critical-step
    /// estimate for the *next* step, scaled by `adaptive` (`1.0` for no
    /// scaling), plus any non-fatal warning raised by the adaptive
    /// controller (spec.md §4.10).
    #[instrument(level = "debug", skip(self), fields(step = self.step_count))]
    pub fn step(&mut self, h: f64, adaptive: f64) -> DemResult<(f64, Option<StepWarning>)> {
        advance_obstacles(&self.obstacles, &mut self.triangles, self.time, h);

        let imbalance = self.tree.store(&self.ellipsoids, &self.active_ellipsoids);
        if self.step_count == 0 || imbalance > 0 {
            self.tree = PartitionTree::create(&self.ellipsoids, &self.active_ellipsoids);
        }
        let contacts = self
            .contact_detector
            .detect(&self.ellipsoids, &self.active_ellipsoids, &self.triangles, &self.tree, self.particles.len());

        for p in &mut self.particles {
            p.reset_accumulators();
        }
        for acc in &mut self.accumulators {
            *acc = StepAccumulator::default();
        }

        apply_contact_forces(
            &mut self.particles,
            &contacts,
            &mut self.contact_detector,
            &self.obstacles,
            &self.pair_table,
            &mut self.accumulators,
            self.time,
            h,
        );
        apply_linear_springs(&mut self.particles, &mut self.springs, &mut self.accumulators, self.time, h);
        apply_torsional_springs(&mut self.particles, &mut self.torsional_springs);

        apply_prescribed_acceleration(&mut self.particles, &self.prescribed, self.time);
        restrain_forces(&mut self.particles, &self.restraints);

        solve_joints(&mut self.particles, &self.joints, &self.joint_topology, h)?;

        if !self.started {
            integrator::half_step_kinematics(&mut self.particles, h);
            self.started = true;
        }
        integrator::update_velocities(&mut self.particles, &self.gravity, self.damping_linear, self.damping_angular, self.time, h);
        apply_prescribed_velocity(&mut self.particles, &self.prescribed, self.time + h);
        restrain_velocities(&mut self.particles, &self.restraints);
        integrator::update_positions(&mut self.particles, h);
        integrator::snapshot_previous(&mut self.particles);

        update_ellipsoids(&self.particles, &mut self.ellipsoids);
        update_triangles(&self.particles, &mut self.triangles);

        check_unspring_rules(self.step_count, &mut self.springs, &mut self.unspring_rules);

        let (next_h, warning) = adaptive::next_step(&self.particles, &self.accumulators, adaptive, h);

        self.time += h;
        self.step_count += 1;

        Ok((next_h, warning))
    }

    /// Drives the simulation to `duration`, stepping by `step` when
    /// `adaptive <= 0.0`; otherwise `step` is the nominal (maximum) step and
    /// the AS-estimated critical step (scaled by `adaptive`) is used
    /// whenever it is smaller, so the controller can only shrink the step
    /// relative to the caller's resolution, never grow past it. The final
    /// step is clipped so the run lands exactly on `duration`. Returns
    /// wall-clock seconds spent (spec.md §6, "a thin batch driver belongs
    /// outside the simulation core, but a single blocking call is a
    /// reasonable minimal surface").
    pub fn dem(&mut self, duration: f64, step: f64, adaptive: f64) -> DemResult<f64> {
        let start = std::time::Instant::now();
        let mut h = step;
        while self.time < duration {
            h = h.min(duration - self.time).max(f64::MIN_POSITIVE);
            let (next_h, warning) = self.step(h, adaptive)?;
            if let Some(w) = warning {
                tracing::warn!(?w, "adaptive step collapsed; falling back to caller-supplied step");
            }
            h = if adaptive > 0.0 { next_h.min(step) } else { step };
        }
        Ok(start.elapsed().as_secs_f64())
    }
}
