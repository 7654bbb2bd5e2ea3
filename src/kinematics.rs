use faer::Mat;

use crate::util::{add, cross, mat3_vec, norm, rotation_matrix, scale, split6, sub};

/// Global position and velocity of a point fixed in a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointKinematics {
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// Pose and velocity handed to an attached rod.
///
/// `r6` holds the global position of end A followed by the unit axis
/// pointing from end A to end B; `v6` holds the velocity of end A followed
/// by the angular velocity of the rod.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RodKinematics {
    pub r6: [f64; 6],
    pub v6: [f64; 6],
}

/// Rigid-body transform from the body frame to the global frame.
///
/// Built from the body's 6-DOF pose and velocity; every attachment point is
/// positioned with `p + R d` and moves with `v + w x (R d)`.
#[derive(Debug, Clone)]
pub struct RigidKinematics {
    /// Reference point position (global)
    pub position: [f64; 3],
    /// Orientation matrix, body frame to global frame `[3][3]`
    pub orientation: Mat<f64>,
    /// Reference point velocity (global)
    pub velocity: [f64; 3],
    /// Angular velocity (global)
    pub angular_velocity: [f64; 3],
}

impl RigidKinematics {
    /// Creates the transform from a pose (position, roll/pitch/yaw) and a
    /// velocity (linear, angular)
    pub fn new(r6: &[f64; 6], v6: &[f64; 6]) -> Self {
        let (position, angles) = split6(r6);
        let (velocity, angular_velocity) = split6(v6);
        Self {
            position,
            orientation: rotation_matrix(&angles),
            velocity,
            angular_velocity,
        }
    }

    pub fn identity() -> Self {
        Self::new(&[0.; 6], &[0.; 6])
    }

    /// Rotates a body-frame vector into the global frame
    #[inline]
    pub fn rotate(&self, local: &[f64; 3]) -> [f64; 3] {
        mat3_vec(self.orientation.as_ref(), local)
    }

    /// Global position of the point at body-frame offset `local`
    pub fn point_position(&self, local: &[f64; 3]) -> [f64; 3] {
        add(&self.position, &self.rotate(local))
    }

    /// Global velocity of the point at body-frame offset `local`
    pub fn point_velocity(&self, local: &[f64; 3]) -> [f64; 3] {
        let arm = self.rotate(local);
        add(&self.velocity, &cross(&self.angular_velocity, &arm))
    }

    pub fn point(&self, local: &[f64; 3]) -> PointKinematics {
        let arm = self.rotate(local);
        PointKinematics {
            position: add(&self.position, &arm),
            velocity: add(&self.velocity, &cross(&self.angular_velocity, &arm)),
        }
    }

    /// Kinematics of a rod whose end coordinates `[A; B]` are fixed in the
    /// body frame.
    ///
    /// The rod axis is left as zero when both ends coincide.
    pub fn rod(&self, ends: &[f64; 6]) -> RodKinematics {
        let (end_a, end_b) = split6(ends);
        let a = self.point(&end_a);
        let axis = self.rotate(&sub(&end_b, &end_a));
        let length = norm(&axis);
        let unit = if length > 0. {
            scale(&axis, 1. / length)
        } else {
            [0.; 3]
        };
        RodKinematics {
            r6: [
                a.position[0],
                a.position[1],
                a.position[2],
                unit[0],
                unit[1],
                unit[2],
            ],
            v6: [
                a.velocity[0],
                a.velocity[1],
                a.velocity[2],
                self.angular_velocity[0],
                self.angular_velocity[1],
                self.angular_velocity[2],
            ],
        }
    }
}
