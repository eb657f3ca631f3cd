//! Shapes attached to particles and obstacles, and the closest-point
//! primitives the contact detector (CD, `contact.rs`) builds on.
//!
//! Ellipsoids are stored as center + orientation + three semi-axis radii
//! (spec.md §3, entity **Ellipsoid/Sphere**); `radius2 < 0` marks a sphere,
//! in which case `radius1` is the sphere radius and orientation is unused
//! for contact purposes.

use glam::{DMat3, DVec3};

/// Axis-aligned bounding box, used both by the partitioning tree and by
/// the broad-phase overlap test against triangles.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn longest_axis(&self) -> usize {
        let ext = self.max - self.min;
        if ext.x >= ext.y && ext.x >= ext.z {
            0
        } else if ext.y >= ext.z {
            1
        } else {
            2
        }
    }

    pub fn center(&self) -> DVec3 {
        0.5 * (self.min + self.max)
    }
}

/// The geometric part of an Ellipsoid/Sphere entity (spec.md §3).
#[derive(Clone, Copy, Debug)]
pub struct Ellipsoid {
    pub owner: usize,
    pub center: DVec3,
    pub center_ref: DVec3,
    pub radii: DVec3,
    pub orientation: DMat3,
    pub orientation_ref: DMat3,
    pub color: i32,
}

impl Ellipsoid {
    pub fn is_sphere(&self) -> bool {
        self.radii.y < 0.0
    }

    pub fn bounding_radius(&self) -> f64 {
        if self.is_sphere() {
            self.radii.x
        } else {
            self.radii.x.max(self.radii.y).max(self.radii.z)
        }
    }

    pub fn aabb(&self) -> Aabb {
        let r = DVec3::splat(self.bounding_radius());
        Aabb {
            min: self.center - r,
            max: self.center + r,
        }
    }

    /// The point on the ellipsoid's surface whose outward normal is
    /// parallel to `n_world` (unit vector).
    ///
    /// For `(x/r1)^2+(y/r2)^2+(z/r3)^2=1` the outward normal at `x` is
    /// proportional to `(x/r1^2, x/r2^2, x/r3^2)`; inverting that relation
    /// for a desired unit normal `n'` in the body frame gives
    /// `x' = r^2 n' / |r n'|` componentwise, which is exact for spheres and
    /// the standard "inverse support mapping" for general ellipsoids.
    pub fn support_point_for_normal(&self, n_world: DVec3) -> DVec3 {
        if self.is_sphere() {
            return self.center + self.radii.x * n_world;
        }
        let n_body = self.orientation.transpose() * n_world;
        let r2 = self.radii * self.radii;
        let scaled = r2 * n_body;
        let s = (self.radii * n_body).length();
        let point_body = if s > 1e-300 { scaled / s } else { DVec3::ZERO };
        self.center + self.orientation * point_body
    }
}

/// Surface triangle (spec.md §3, entity **Triangle**).
#[derive(Clone, Copy, Debug)]
pub enum TriangleOwner {
    StaticObstacle,
    MovingObstacle(u32),
    Particle(usize),
}

#[derive(Clone, Debug)]
pub struct Triangle {
    pub vertices: [DVec3; 3],
    /// Vertex offsets in the owning particle's referential (body) frame;
    /// meaningless for obstacle-owned triangles, which are advanced
    /// directly in spatial coordinates by the obstacle driver.
    pub local_vertices: [DVec3; 3],
    pub color: i32,
    pub owner: TriangleOwner,
}

impl Triangle {
    pub fn normal(&self) -> DVec3 {
        (self.vertices[1] - self.vertices[0])
            .cross(self.vertices[2] - self.vertices[0])
            .normalize_or_zero()
    }

    pub fn aabb(&self) -> Aabb {
        let [a, b, c] = self.vertices;
        Aabb {
            min: a.min(b).min(c),
            max: a.max(b).max(c),
        }
    }

    /// Closest point on the (solid, clamped) triangle to `p`.
    ///
    /// Standard closest-point-on-triangle via barycentric region tests
    /// (Ericson, *Real-Time Collision Detection* §5.1.5): project onto the
    /// plane, then clamp into vertex/edge/face Voronoi regions.
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        let [a, b, c] = self.vertices;
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;

        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + v * ab;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + w * ac;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + w * (c - b);
        }

        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }
}

/// A detected closest-point pair between two ellipsoids.
pub struct EllipsoidContact {
    pub point_a: DVec3,
    pub point_b: DVec3,
    /// Unit normal pointing from `b` into `a`.
    pub normal: DVec3,
    /// Signed gap: negative when overlapping.
    pub gap: f64,
}

/// Closest points between two spheres: exact, along the line of centers
/// (spec.md §4.2).
pub fn sphere_sphere(a: &Ellipsoid, b: &Ellipsoid) -> EllipsoidContact {
    let diff = a.center - b.center;
    let dist = diff.length();
    let normal = if dist > 1e-300 {
        diff / dist
    } else {
        DVec3::X
    };
    let gap = dist - (a.radii.x + b.radii.x);
    EllipsoidContact {
        point_a: a.center - a.radii.x * normal,
        point_b: b.center + b.radii.x * normal,
        normal,
        gap,
    }
}

/// Closest points between two general ellipsoids via fixed-point iteration
/// on the common-normal condition: at the closest-point pair, both surface
/// tangent planes share the connecting normal. Starting from the
/// line-of-centers direction, each iteration recomputes the surface points
/// whose outward normals equal the current guess and refines the guess from
/// their connecting direction. This converges quadratically near the
/// solution for well-separated convex ellipsoids and degrades gracefully
/// (bounded iteration count) under penetration, matching spec.md §4.2's
/// "Newton iteration on the Lagrangian condition" without committing to a
/// specific closed-form root solve.
pub fn ellipsoid_ellipsoid(a: &Ellipsoid, b: &Ellipsoid) -> EllipsoidContact {
    const MAX_ITERS: usize = 32;
    const TOL: f64 = 1e-12;

    let mut n = (b.center - a.center).try_normalize().unwrap_or(DVec3::X);
    let mut point_a = a.support_point_for_normal(n);
    let mut point_b = b.support_point_for_normal(-n);

    for _ in 0..MAX_ITERS {
        point_a = a.support_point_for_normal(n);
        point_b = b.support_point_for_normal(-n);
        let connecting = point_b - point_a;
        let new_n = match connecting.try_normalize() {
            Some(v) => v,
            None => break,
        };
        let delta = (new_n - n).length();
        n = new_n;
        if delta < TOL {
            break;
        }
    }

    let gap = n.dot(point_b - point_a);
    EllipsoidContact {
        point_a,
        point_b,
        normal: n,
        gap,
    }
}

/// Dispatches to the sphere/sphere fast path when both entities are
/// spheres, otherwise runs the general ellipsoid closest-point iteration.
pub fn ellipsoid_pair_contact(a: &Ellipsoid, b: &Ellipsoid) -> EllipsoidContact {
    if a.is_sphere() && b.is_sphere() {
        sphere_sphere(a, b)
    } else {
        ellipsoid_ellipsoid(a, b)
    }
}

/// Closest point between a triangle and an ellipsoid/sphere: project the
/// ellipsoid center onto the (clamped) triangle, then treat the result as a
/// normal direction and evaluate the ellipsoid's support point along it
/// (spec.md §4.2).
pub struct TriangleContact {
    pub point_on_triangle: DVec3,
    pub point_on_ellipsoid: DVec3,
    /// Unit normal pointing from the triangle towards the ellipsoid.
    pub normal: DVec3,
    pub gap: f64,
}

pub fn triangle_ellipsoid(tri: &Triangle, e: &Ellipsoid) -> TriangleContact {
    let cp = tri.closest_point(e.center);
    let diff = e.center - cp;
    let normal = diff.try_normalize().unwrap_or_else(|| tri.normal());
    let point_on_ellipsoid = e.support_point_for_normal(-normal);
    let gap = normal.dot(point_on_ellipsoid - cp);
    TriangleContact {
        point_on_triangle: cp,
        point_on_ellipsoid,
        normal,
        gap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(owner: usize, center: DVec3, radius: f64) -> Ellipsoid {
        Ellipsoid {
            owner,
            center,
            center_ref: DVec3::ZERO,
            radii: DVec3::new(radius, -1.0, -1.0),
            orientation: DMat3::IDENTITY,
            orientation_ref: DMat3::IDENTITY,
            color: 0,
        }
    }

    #[test]
    fn sphere_sphere_gap_matches_distance_minus_radii() {
        let a = sphere(0, DVec3::new(-3.0, 0.0, 0.0), 1.0);
        let b = sphere(1, DVec3::new(3.0, 0.0, 0.0), 1.0);
        let c = sphere_sphere(&a, &b);
        assert!((c.gap - 4.0).abs() < 1e-12);
        assert!((c.normal - DVec3::NEG_X).length() < 1e-12);
    }

    #[test]
    fn overlapping_spheres_have_negative_gap() {
        let a = sphere(0, DVec3::new(-0.5, 0.0, 0.0), 1.0);
        let b = sphere(1, DVec3::new(0.5, 0.0, 0.0), 1.0);
        let c = sphere_sphere(&a, &b);
        assert!(c.gap < 0.0);
    }

    #[test]
    fn ellipsoid_support_point_reduces_to_sphere() {
        let e = Ellipsoid {
            owner: 0,
            center: DVec3::ZERO,
            center_ref: DVec3::ZERO,
            radii: DVec3::splat(2.0),
            orientation: DMat3::IDENTITY,
            orientation_ref: DMat3::IDENTITY,
            color: 0,
        };
        let p = e.support_point_for_normal(DVec3::X);
        assert!((p - DVec3::new(2.0, 0.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn axis_aligned_ellipsoids_match_sphere_formula() {
        let a = Ellipsoid {
            owner: 0,
            center: DVec3::new(-5.0, 0.0, 0.0),
            center_ref: DVec3::ZERO,
            radii: DVec3::splat(1.0),
            orientation: DMat3::IDENTITY,
            orientation_ref: DMat3::IDENTITY,
            color: 0,
        };
        let mut b = a;
        b.center = DVec3::new(5.0, 0.0, 0.0);
        let contact = ellipsoid_ellipsoid(&a, &b);
        assert!((contact.gap - 8.0).abs() < 1e-6);
    }

    #[test]
    fn triangle_closest_point_clamps_to_nearest_vertex() {
        let tri = Triangle {
            vertices: [DVec3::ZERO, DVec3::X, DVec3::Y],
            local_vertices: [DVec3::ZERO, DVec3::X, DVec3::Y],
            color: 0,
            owner: TriangleOwner::StaticObstacle,
        };
        let far = DVec3::new(-5.0, -5.0, 0.0);
        assert_eq!(tri.closest_point(far), DVec3::ZERO);
    }
}
