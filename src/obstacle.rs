//! Obstacle driver (OD, spec.md §4/§2): advances obstacle triangles by
//! their prescribed linear/angular velocity and answers velocity-at-point
//! queries for the contact force law.

use glam::DVec3;
use tracing::instrument;

use crate::callback::VectorFn;
use crate::geometry::{Triangle, TriangleOwner};

/// One obstacle: a pivot point and a contiguous range of triangles that
/// share its prescribed linear/angular velocity (spec.md §3).
pub struct Obstacle {
    pub pivot: DVec3,
    pub triangle_range: std::ops::Range<usize>,
    pub linear_velocity: VectorFn,
    pub angular_velocity: VectorFn,
}

impl Obstacle {
    /// Velocity of the material point currently at `point`, combining the
    /// obstacle's translation and rotation about its pivot.
    pub fn velocity_at(&self, time: f64, point: DVec3) -> DVec3 {
        let lin = self.linear_velocity.eval(time);
        let ang = self.angular_velocity.eval(time);
        lin + ang.cross(point - self.pivot)
    }
}

/// Advances every obstacle's triangles rigidly about its pivot for one step
/// (spec.md §2, "OD" precedes "CD" each step using previous-step kinematics
/// for non-obstacle geometry, but obstacles are advanced first since they
/// carry no dynamics of their own to integrate).
#[instrument(level = "trace", skip_all)]
pub fn advance_obstacles(obstacles: &[Obstacle], triangles: &mut [Triangle], time: f64, dt: f64) {
    for (idx, obstacle) in obstacles.iter().enumerate() {
        let lin = obstacle.linear_velocity.eval(time);
        let ang = obstacle.angular_velocity.eval(time);
        let angle = ang.length() * dt;
        let rotation = if angle > 0.0 {
            glam::DQuat::from_axis_angle(ang / ang.length(), angle)
        } else {
            glam::DQuat::IDENTITY
        };

        for tri in &mut triangles[obstacle.triangle_range.clone()] {
            debug_assert!(matches!(
                tri.owner,
                TriangleOwner::StaticObstacle | TriangleOwner::MovingObstacle(_)
            ));
            if matches!(tri.owner, TriangleOwner::MovingObstacle(k) if k as usize == idx)
                || matches!(tri.owner, TriangleOwner::StaticObstacle)
            {
                for v in &mut tri.vertices {
                    let rel = *v - obstacle.pivot;
                    *v = obstacle.pivot + rotation * rel + lin * dt;
                }
            }
        }
    }
}
