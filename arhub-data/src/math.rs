//! Geometry primitives: position, unit-quaternion orientation, pose.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum MathError {
    #[error("Invalid quaternion.")]
    InvalidQuaternion,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Rotates this vector by `rot` (or by its inverse).
    pub fn rotated(&self, rot: &Orientation, inverse: bool) -> Result<Self, MathError> {
        let q = if inverse {
            rot.normalized()?.conjugate()
        } else {
            rot.normalized()?
        };
        Ok(q.rotate_vector(self))
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        approx(self.x, other.x) && approx(self.y, other.y) && approx(self.z, other.z)
    }
}

impl std::ops::Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Quaternion orientation (x, y, z, w), kept normalized by the operations below.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Orientation {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Returns the normalized quaternion; a zero or non-finite norm is an error.
    pub fn normalized(&self) -> Result<Self, MathError> {
        let n = self.norm();
        if !n.is_finite() || n <= f64::EPSILON {
            return Err(MathError::InvalidQuaternion);
        }
        Ok(Self::new(self.x / n, self.y / n, self.z / n, self.w / n))
    }

    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Hamilton product `self * other`.
    pub fn multiplied(&self, other: &Self) -> Self {
        Self::new(
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
        )
    }

    /// Rotates `v` by this quaternion (assumed normalized): `q * (v, 0) * q⁻¹`.
    pub fn rotate_vector(&self, v: &Position) -> Position {
        let qv = Self::new(v.x, v.y, v.z, 0.0);
        let r = self.multiplied(&qv).multiplied(&self.conjugate());
        Position::new(r.x, r.y, r.z)
    }

    pub fn approx_eq(&self, other: &Self) -> bool {
        // q and -q describe the same rotation
        let dot =
            self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w;
        (dot.abs() - 1.0).abs() <= 1e-8
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rotation_keeps_vector() {
        let v = Position::new(1.0, 2.0, 3.0);
        let r = v.rotated(&Orientation::default(), false).unwrap();
        assert!(r.approx_eq(&v));
    }

    #[test]
    fn half_turn_about_z_flips_xy() {
        let q = Orientation::new(0.0, 0.0, 1.0, 0.0);
        let r = q.rotate_vector(&Position::new(1.0, 2.0, 3.0));
        assert!(r.approx_eq(&Position::new(-1.0, -2.0, 3.0)));
    }

    #[test]
    fn zero_quaternion_is_invalid() {
        let q = Orientation::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(q.normalized(), Err(MathError::InvalidQuaternion)));
    }

    #[test]
    fn multiply_then_conjugate_is_identity() {
        let q = Orientation::new(0.3, -0.2, 0.5, 0.8).normalized().unwrap();
        let i = q.multiplied(&q.conjugate());
        assert!(i.approx_eq(&Orientation::default()));
    }

    #[test]
    fn inverse_rotation_round_trips() {
        let q = Orientation::new(0.1, 0.7, -0.3, 0.2).normalized().unwrap();
        let v = Position::new(0.4, -1.5, 2.0);
        let there = v.rotated(&q, false).unwrap();
        let back = there.rotated(&q, true).unwrap();
        assert!(back.approx_eq(&v));
    }
}
