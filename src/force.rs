//! Force assembler (FA) — granular contact force law (spec.md §4.3).

use glam::DVec3;
use tracing::instrument;

use crate::adaptive::StepAccumulator;
use crate::contact::{Contact, ContactDetector, Partner};
use crate::material::PairTable;
use crate::obstacle::Obstacle;
use crate::particle::Particle;

/// Velocity of whatever sits at `partner` (particle or obstacle) at the
/// given spatial point, with zero for a static obstacle/world.
fn partner_velocity(partner: Partner, point: DVec3, particles: &[Particle], obstacles: &[Obstacle], time: f64) -> DVec3 {
    match partner {
        Partner::Particle(p) => particles[p].point_velocity(point),
        Partner::StaticObstacle => DVec3::ZERO,
        Partner::MovingObstacle(k) => obstacles
            .get(k as usize)
            .map(|o| o.velocity_at(time, point))
            .unwrap_or(DVec3::ZERO),
    }
}

fn partner_angular_velocity(partner: Partner, particles: &[Particle]) -> DVec3 {
    match partner {
        Partner::Particle(p) => particles[p].ang_vel_spatial(),
        Partner::StaticObstacle | Partner::MovingObstacle(_) => DVec3::ZERO,
    }
}

/// Evaluates the contact law at every master contact and accumulates force
/// and torque into the owner and (when the partner is a real particle) the
/// partner, with opposite sign (spec.md §4.3).
#[instrument(level = "trace", skip_all)]
pub fn apply_contact_forces(
    particles: &mut [Particle],
    contacts: &[Vec<Contact>],
    detector: &mut ContactDetector,
    obstacles: &[Obstacle],
    pair_table: &PairTable,
    accumulators: &mut [StepAccumulator],
    time: f64,
    h: f64,
) {
    for per_particle in contacts {
        for c in per_particle {
            if !c.is_master {
                continue;
            }

            let params = pair_table.lookup(c.color_owner, c.color_partner);
            let normal = c.normal;

            let v_owner = particles[c.owner].point_velocity(c.point);
            let v_partner = partner_velocity(c.partner, c.point, particles, obstacles, time);
            let v_rel = v_owner - v_partner;

            let vn = v_rel.dot(normal);
            let f_n_mag = (-params.spring * c.gap - params.damper * vn).max(0.0);
            let f_n = f_n_mag * normal;

            let v_t = v_rel - vn * normal;
            let u_t_trial = c.tangential_disp + v_t * h;
            let f_t_trial = -params.kskn * params.spring * u_t_trial - params.kskn * params.damper * v_t;

            let cone = params.friction_static * f_n_mag;
            let (f_t, u_t_new) = if f_t_trial.length() <= cone || f_n_mag <= 0.0 {
                (f_t_trial, u_t_trial)
            } else {
                let slip_dir = (-v_t).try_normalize().unwrap_or(DVec3::ZERO);
                let f_t_slip = slip_dir * (params.friction_dynamic * f_n_mag);
                let denom = params.kskn * params.spring;
                let u_t = if denom > 1e-300 { -f_t_slip / denom } else { DVec3::ZERO };
                (f_t_slip, u_t)
            };
            detector.update_tangential(c, u_t_new);

            let omega_owner = particles[c.owner].ang_vel_spatial();
            let omega_partner = partner_angular_velocity(c.partner, particles);
            let rel_omega = omega_owner - omega_partner;
            let omega_n = rel_omega.dot(normal) * normal;
            let omega_t = rel_omega - omega_n;

            let lever_owner = c.point - particles[c.owner].pos;
            let char_len = lever_owner.length().max(1e-12);

            let m_roll = omega_t
                .try_normalize()
                .map(|dir| -dir * (params.rolling_resistance * f_n_mag * char_len))
                .unwrap_or(DVec3::ZERO);
            let m_drill = omega_n
                .try_normalize()
                .map(|dir| -dir * (params.drilling_resistance * f_n_mag * char_len))
                .unwrap_or(DVec3::ZERO);

            let total_force = f_n + f_t;
            let total_moment = m_roll + m_drill;

            particles[c.owner].force += total_force;
            particles[c.owner].torque += lever_owner.cross(total_force) + total_moment;
            accumulators[c.owner].accumulate_linear(params.spring, params.damper);
            accumulators[c.owner].accumulate_rotational(params.spring * char_len * char_len);

            if let Partner::Particle(p) = c.partner {
                let lever_partner = c.point - particles[p].pos;
                particles[p].force -= total_force;
                particles[p].torque -= lever_partner.cross(total_force) + total_moment;
                accumulators[p].accumulate_linear(params.spring, params.damper);
                accumulators[p].accumulate_rotational(params.spring * char_len * char_len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::PairParams;
    use crate::particle::Particle;
    use glam::DMat3;

    fn still_particle(pos: DVec3, mass: f64) -> Particle {
        let mut p = Particle::new(mass, DMat3::IDENTITY * mass, 0);
        p.pos = pos;
        p
    }

    #[test]
    fn repulsive_force_opposes_penetration_along_normal() {
        let mut particles = vec![still_particle(DVec3::ZERO, 1.0), still_particle(DVec3::new(1.0, 0.0, 0.0), 1.0)];
        let contact = Contact::for_test(0, Partner::Particle(1), DVec3::new(0.5, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0), -0.01);
        let contacts = vec![vec![contact], vec![]];
        let mut detector = ContactDetector::new();
        let mut pair_table = PairTable::default();
        pair_table.set(0, 0, PairParams::default());
        let mut accumulators = vec![StepAccumulator::default(); 2];

        apply_contact_forces(&mut particles, &contacts, &mut detector, &[], &pair_table, &mut accumulators, 0.0, 1e-3);

        assert!(particles[0].force.x > 0.0);
        assert!(particles[1].force.x < 0.0);
        assert!(accumulators[0].kmax > 0.0);
    }
}
