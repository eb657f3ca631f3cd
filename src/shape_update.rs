//! Shape updater (SU, spec.md §2/§9): maps every non-analytical particle's
//! referential geometry (ellipsoid center/orientation, mesh triangle
//! vertices) into the current spatial configuration from the particle's
//! position and rotation. `ANALYTICAL` particles are skipped — the spec's
//! "rigid body with externally supplied geometry" reading (spec.md §9).

use tracing::instrument;

use crate::geometry::{Ellipsoid, Triangle, TriangleOwner};
use crate::particle::Particle;

#[instrument(level = "trace", skip_all)]
pub fn update_ellipsoids(particles: &[Particle], ellipsoids: &mut [Ellipsoid]) {
    for e in ellipsoids.iter_mut() {
        let p = &particles[e.owner];
        if p.is_analytical() {
            continue;
        }
        e.center = p.pos + p.rotation * e.center_ref;
        e.orientation = p.rotation * e.orientation_ref;
    }
}

#[instrument(level = "trace", skip_all)]
pub fn update_triangles(particles: &[Particle], triangles: &mut [Triangle]) {
    for t in triangles.iter_mut() {
        if let TriangleOwner::Particle(owner) = t.owner {
            let p = &particles[owner];
            if p.is_analytical() {
                continue;
            }
            for i in 0..3 {
                t.vertices[i] = p.pos + p.rotation * t.local_vertices[i];
            }
        }
    }
}
