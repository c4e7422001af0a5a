#![warn(missing_docs)]

//! Math types for the lamina slicing kernel.
//!
//! Thin checked wrappers around nalgebra providing the value types the
//! slicer works with: 2D points/vectors on a cutting plane, 3D mesh
//! vertices, and the tolerance used to decide when two points coincide.

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when constructing math values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// A coordinate was NaN.
    #[error("coordinate {axis} is NaN")]
    NaN {
        /// Axis name (`x`, `y` or `z`).
        axis: char,
    },

    /// A tolerance was zero, negative or not finite.
    #[error("invalid tolerance {0}: must be finite and positive")]
    InvalidTolerance(f64),
}

fn check(axis: char, v: f64) -> Result<f64, MathError> {
    if v.is_nan() {
        Err(MathError::NaN { axis })
    } else {
        Ok(v)
    }
}

/// An immutable 2D point or vector on a cutting plane.
///
/// Equality via `==` is bit-exact; geometric code should use
/// [`Vector2::almost_equal`] instead.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Vector2 {
    inner: nalgebra::Vector2<f64>,
}

impl Vector2 {
    /// The origin.
    pub const ZERO: Self = Self {
        inner: nalgebra::Vector2::new(0.0, 0.0),
    };

    /// Create a vector, rejecting NaN coordinates.
    pub fn new(x: f64, y: f64) -> Result<Self, MathError> {
        Ok(Self::from_raw(nalgebra::Vector2::new(
            check('x', x)?,
            check('y', y)?,
        )))
    }

    fn from_raw(inner: nalgebra::Vector2<f64>) -> Self {
        debug_assert!(!inner.x.is_nan() && !inner.y.is_nan());
        Self { inner }
    }

    /// X coordinate.
    #[inline]
    pub fn x(&self) -> f64 {
        self.inner.x
    }

    /// Y coordinate.
    #[inline]
    pub fn y(&self) -> f64 {
        self.inner.y
    }

    /// Dot product.
    pub fn dot(&self, other: &Self) -> f64 {
        self.inner.dot(&other.inner)
    }

    /// Z component of the 3D cross product (`self.x * other.y - self.y * other.x`).
    pub fn cross(&self, other: &Self) -> f64 {
        self.inner.perp(&other.inner)
    }

    /// Euclidean length.
    pub fn norm(&self) -> f64 {
        self.inner.norm()
    }

    /// Squared euclidean distance to another point.
    pub fn distance_squared(&self, other: &Self) -> f64 {
        (self.inner - other.inner).norm_squared()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.inner - other.inner).norm()
    }

    /// True iff `|dx| + |dy| < epsilon`.
    pub fn almost_equal(&self, other: &Self, epsilon: f64) -> bool {
        (self.inner - other.inner).abs().sum() < epsilon
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalize(&self) -> Option<Self> {
        self.inner.try_normalize(f64::EPSILON).map(Self::from_raw)
    }

    /// This vector rotated 90 degrees clockwise.
    pub fn perp_right(&self) -> Self {
        Self::from_raw(nalgebra::Vector2::new(self.inner.y, -self.inner.x))
    }

    /// Linear interpolation `self + (other - self) * t`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::from_raw(self.inner.lerp(&other.inner, t))
    }

    /// Lexicographic comparison on `(x, y)`.
    pub fn lex_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner
            .x
            .total_cmp(&other.inner.x)
            .then(self.inner.y.total_cmp(&other.inner.y))
    }
}

impl fmt::Debug for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.inner.x, self.inner.y)
    }
}

impl fmt::Display for Vector2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.inner.x, self.inner.y)
    }
}

impl TryFrom<[f64; 2]> for Vector2 {
    type Error = MathError;

    fn try_from([x, y]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(x, y)
    }
}

impl From<Vector2> for [f64; 2] {
    fn from(v: Vector2) -> Self {
        [v.inner.x, v.inner.y]
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::from_raw(self.inner + rhs.inner)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::from_raw(self.inner - rhs.inner)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::from_raw(self.inner * rhs)
    }
}

/// An immutable 3D point or vector (mesh vertices).
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vector3 {
    inner: nalgebra::Vector3<f64>,
}

impl Vector3 {
    /// Create a vector, rejecting NaN coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, MathError> {
        Ok(Self::from_raw(nalgebra::Vector3::new(
            check('x', x)?,
            check('y', y)?,
            check('z', z)?,
        )))
    }

    fn from_raw(inner: nalgebra::Vector3<f64>) -> Self {
        debug_assert!(!inner.iter().any(|c| c.is_nan()));
        Self { inner }
    }

    /// X coordinate.
    #[inline]
    pub fn x(&self) -> f64 {
        self.inner.x
    }

    /// Y coordinate.
    #[inline]
    pub fn y(&self) -> f64 {
        self.inner.y
    }

    /// Z coordinate.
    #[inline]
    pub fn z(&self) -> f64 {
        self.inner.z
    }

    /// Cross product.
    pub fn cross(&self, other: &Self) -> Self {
        Self::from_raw(self.inner.cross(&other.inner))
    }

    /// Dot product.
    pub fn dot(&self, other: &Self) -> f64 {
        self.inner.dot(&other.inner)
    }

    /// Linear interpolation `self + (other - self) * t`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::from_raw(self.inner.lerp(&other.inner, t))
    }

    /// Projection onto the XY plane.
    pub fn xy(&self) -> Vector2 {
        Vector2::from_raw(self.inner.xy())
    }
}

impl fmt::Debug for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.inner.x, self.inner.y, self.inner.z)
    }
}

impl TryFrom<[f64; 3]> for Vector3 {
    type Error = MathError;

    fn try_from([x, y, z]: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(x, y, z)
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.inner.x, v.inner.y, v.inner.z]
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::from_raw(self.inner - rhs.inner)
    }
}

/// Tolerance used for geometric point comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// L1 distance below which two points are the same point.
    pub epsilon: f64,
}

impl Tolerance {
    /// Default slicing tolerance (1e-5 in model units).
    pub const DEFAULT: Self = Self { epsilon: 1e-5 };

    /// Create a tolerance, rejecting non-positive or non-finite values.
    pub fn new(epsilon: f64) -> Result<Self, MathError> {
        if epsilon.is_finite() && epsilon > 0.0 {
            Ok(Self { epsilon })
        } else {
            Err(MathError::InvalidTolerance(epsilon))
        }
    }

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Vector2, b: &Vector2) -> bool {
        a.almost_equal(b, self.epsilon)
    }

    /// Check if a scalar is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.epsilon
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde::de::value::{Error as ValueError, SeqDeserializer};

    #[test]
    fn test_rejects_nan() {
        assert_eq!(
            Vector2::new(f64::NAN, 1.0),
            Err(MathError::NaN { axis: 'x' })
        );
        assert_eq!(
            Vector3::new(0.0, 0.0, f64::NAN),
            Err(MathError::NaN { axis: 'z' })
        );
        assert!(Vector2::new(1.0, 2.0).is_ok());
    }

    #[test]
    fn test_almost_equal_is_manhattan() {
        let a = Vector2::new(0.0, 0.0).unwrap();
        let b = Vector2::new(0.25, 0.25).unwrap();
        // L1 distance is 0.5 while euclidean is ~0.354
        assert!(!a.almost_equal(&b, 0.5));
        assert!(a.almost_equal(&b, 0.5001));
    }

    #[test]
    fn test_cross_and_perp() {
        let x = Vector2::new(1.0, 0.0).unwrap();
        let y = Vector2::new(0.0, 1.0).unwrap();
        assert_relative_eq!(x.cross(&y), 1.0);
        let r = y.perp_right();
        assert_relative_eq!(r.x(), 1.0);
        assert_relative_eq!(r.y(), 0.0);
    }

    #[test]
    fn test_normalize_zero() {
        assert!(Vector2::ZERO.normalize().is_none());
        let n = Vector2::new(3.0, 4.0).unwrap().normalize().unwrap();
        assert_relative_eq!(n.norm(), 1.0);
    }

    #[test]
    fn test_vector3_cross_and_project() {
        let a = Vector3::new(1.0, 0.0, 0.0).unwrap();
        let b = Vector3::new(0.0, 1.0, 0.0).unwrap();
        let c = a.cross(&b);
        assert_relative_eq!(c.z(), 1.0);
        let mid = a.lerp(&b, 0.5).xy();
        assert_relative_eq!(mid.x(), 0.5);
        assert_relative_eq!(mid.y(), 0.5);
    }

    #[test]
    fn test_serde_roundtrip_rejects_nan() {
        let v: Vector2 = serde_json::from_str("[1.5, -2.0]").unwrap();
        assert_relative_eq!(v.x(), 1.5);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1.5,-2.0]");

        // JSON has no NaN literal; feed the values through a plain sequence
        let nan = SeqDeserializer::<_, ValueError>::new([1.0, f64::NAN].into_iter());
        let err = Vector2::deserialize(nan).unwrap_err();
        assert!(err.to_string().contains("coordinate y is NaN"));

        let nan = SeqDeserializer::<_, ValueError>::new([f64::NAN, 0.0, 0.0].into_iter());
        assert!(Vector3::deserialize(nan).is_err());
    }

    #[test]
    fn test_tolerance() {
        assert!(Tolerance::new(0.0).is_err());
        assert!(Tolerance::new(f64::INFINITY).is_err());
        let tol = Tolerance::new(1e-3).unwrap();
        let a = Vector2::new(1.0, 2.0).unwrap();
        let b = Vector2::new(1.0 + 1e-4, 2.0).unwrap();
        assert!(tol.points_equal(&a, &b));
        assert!(!tol.points_equal(&a, &Vector2::new(1.01, 2.0).unwrap()));
        assert!(tol.is_zero(5e-4));
    }
}
