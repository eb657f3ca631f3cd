//! Contact detector (CD, spec.md §4.2): broad phase via the partitioning
//! tree, narrow phase via `geometry::ellipsoid_pair_contact` /
//! `geometry::triangle_ellipsoid`, and tangential-displacement persistence
//! across steps.

use std::collections::HashMap;

use glam::DVec3;
use tracing::instrument;

use crate::geometry::{ellipsoid_pair_contact, triangle_ellipsoid, Ellipsoid, Triangle, TriangleOwner};
use crate::partition::PartitionTree;

/// Identity of whatever is on the other side of a contact, following the
/// triangle ownership tag convention of spec.md §3: `>= 0` is a particle,
/// `-1` is the static obstacle/world, and any other negative value encodes
/// moving obstacle `k` as `-(k + 2)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Partner {
    Particle(usize),
    StaticObstacle,
    MovingObstacle(u32),
}

impl Partner {
    pub fn is_static(self) -> bool {
        matches!(self, Partner::StaticObstacle)
    }
}

/// A persistence key used to match a contact across consecutive steps so
/// that tangential displacement can be accumulated rather than reset
/// (spec.md §4.2). `local_feature` distinguishes multiple simultaneous
/// contacts between the same pair (e.g. several triangles of one mesh).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ContactKey {
    owner: usize,
    partner: Partner,
    local_feature: u64,
}

/// One contact, recorded on the "master" particle's list. The mirrored
/// "slave" view (same contact, opposite sign force) is recovered by the
/// force assembler directly from `owner`/`partner` without a second stored
/// copy, matching spec.md §4.2's single-writer-per-particle discipline.
#[derive(Clone, Debug)]
pub struct Contact {
    pub owner: usize,
    pub partner: Partner,
    pub point: DVec3,
    /// Unit normal pointing from the partner into the owner.
    pub normal: DVec3,
    /// Negative when overlapping.
    pub gap: f64,
    pub tangential_disp: DVec3,
    pub color_owner: i32,
    pub color_partner: i32,
    /// True for exactly one of the two mirrored records belonging to a
    /// physical contact; the force assembler computes the contact force
    /// once, on the master record, and applies it with opposite sign to
    /// the partner particle directly (spec.md §4.2).
    pub is_master: bool,
    key: ContactKey,
}

#[derive(Default)]
pub struct ContactDetector {
    persisted: HashMap<ContactKey, DVec3>,
}

impl ContactDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs broad + narrow phase and returns one contact list per particle,
    /// each entry a "master" record for that particle. Non-analytical
    /// particles only (spec.md §9: ANALYTICAL elides contact detection).
    #[instrument(level = "trace", skip_all)]
    pub fn detect(
        &mut self,
        ellipsoids: &[Ellipsoid],
        active_ellipsoids: &[usize],
        triangles: &[Triangle],
        tree: &PartitionTree,
        num_particles: usize,
    ) -> Vec<Vec<Contact>> {
        let mut out: Vec<Vec<Contact>> = (0..num_particles).map(|_| Vec::new()).collect();
        let mut next_persisted: HashMap<ContactKey, DVec3> = HashMap::new();

        // Ellipsoid <-> ellipsoid, deduplicated by visiting each broad-phase
        // pair once (i < j on the active-index ordering).
        for (pos, &i) in active_ellipsoids.iter().enumerate() {
            let a = &ellipsoids[i];
            if a.owner >= num_particles {
                continue;
            }
            tree.query_aabb(ellipsoids, &a.aabb(), |j| {
                if j <= i {
                    return;
                }
                let b = &ellipsoids[j];
                if b.owner == a.owner || b.owner >= num_particles {
                    return;
                }
                let c = ellipsoid_pair_contact(a, b);
                if c.gap >= 0.0 {
                    return;
                }

                let feature = (i as u64) << 32 | j as u64;
                let point = 0.5 * (c.point_a + c.point_b);

                let key_master = ContactKey {
                    owner: a.owner,
                    partner: Partner::Particle(b.owner),
                    local_feature: feature,
                };
                let tang_master = self.persisted.get(&key_master).copied().unwrap_or(DVec3::ZERO);
                next_persisted.insert(key_master, tang_master);
                out[a.owner].push(Contact {
                    owner: a.owner,
                    partner: Partner::Particle(b.owner),
                    point,
                    normal: c.normal,
                    gap: c.gap,
                    tangential_disp: tang_master,
                    color_owner: a.color,
                    color_partner: b.color,
                    is_master: true,
                    key: key_master,
                });

                let key_slave = ContactKey {
                    owner: b.owner,
                    partner: Partner::Particle(a.owner),
                    local_feature: feature,
                };
                let tang_slave = self.persisted.get(&key_slave).copied().unwrap_or(DVec3::ZERO);
                next_persisted.insert(key_slave, tang_slave);
                out[b.owner].push(Contact {
                    owner: b.owner,
                    partner: Partner::Particle(a.owner),
                    point,
                    normal: -c.normal,
                    gap: c.gap,
                    tangential_disp: tang_slave,
                    color_owner: b.color,
                    color_partner: a.color,
                    is_master: false,
                    key: key_slave,
                });
                let _ = pos;
            });
        }

        // Triangle <-> ellipsoid.
        for (tri_idx, tri) in triangles.iter().enumerate() {
            let tri_owner_particle = match tri.owner {
                TriangleOwner::Particle(p) => Some(p),
                _ => None,
            };
            let partner = match tri.owner {
                TriangleOwner::Particle(p) => Partner::Particle(p),
                TriangleOwner::StaticObstacle => Partner::StaticObstacle,
                TriangleOwner::MovingObstacle(k) => Partner::MovingObstacle(k),
            };

            tree.query_aabb(ellipsoids, &tri.aabb(), |ei| {
                let e = &ellipsoids[ei];
                if e.owner >= num_particles {
                    return;
                }
                if tri_owner_particle == Some(e.owner) {
                    return;
                }
                let c = triangle_ellipsoid(tri, e);
                if c.gap >= 0.0 {
                    return;
                }

                let key = ContactKey {
                    owner: e.owner,
                    partner,
                    local_feature: tri_idx as u64,
                };
                let tang = self.persisted.get(&key).copied().unwrap_or(DVec3::ZERO);
                next_persisted.insert(key, tang);
                out[e.owner].push(Contact {
                    owner: e.owner,
                    partner,
                    point: c.point_on_triangle,
                    normal: c.normal,
                    gap: c.gap,
                    tangential_disp: tang,
                    color_owner: e.color,
                    color_partner: tri.color,
                    is_master: true,
                    key,
                });

                if let Some(owner_particle) = tri_owner_particle {
                    let key_mirror = ContactKey {
                        owner: owner_particle,
                        partner: Partner::Particle(e.owner),
                        local_feature: tri_idx as u64,
                    };
                    let tang_mirror = self
                        .persisted
                        .get(&key_mirror)
                        .copied()
                        .unwrap_or(DVec3::ZERO);
                    next_persisted.insert(key_mirror, tang_mirror);
                    out[owner_particle].push(Contact {
                        owner: owner_particle,
                        partner: Partner::Particle(e.owner),
                        point: c.point_on_triangle,
                        normal: -c.normal,
                        gap: c.gap,
                        tangential_disp: tang_mirror,
                        color_owner: tri.color,
                        color_partner: e.color,
                        is_master: false,
                        key: key_mirror,
                    });
                }
            });
        }

        self.persisted = next_persisted;
        out
    }

    /// Updates the persisted tangential displacement for a contact after
    /// the force assembler computes the new value this step.
    pub fn update_tangential(&mut self, contact: &Contact, new_disp: DVec3) {
        self.persisted.insert(contact.key, new_disp);
    }
}

#[cfg(test)]
impl Contact {
    /// Builds a standalone `Contact` for unit tests outside this module,
    /// bypassing `ContactDetector::detect`'s broad/narrow phase.
    pub fn for_test(owner: usize, partner: Partner, point: DVec3, normal: DVec3, gap: f64) -> Self {
        Self {
            owner,
            partner,
            point,
            normal,
            gap,
            tangential_disp: DVec3::ZERO,
            color_owner: 0,
            color_partner: 0,
            is_master: true,
            key: ContactKey {
                owner,
                partner,
                local_feature: 0,
            },
        }
    }
}
