//! Affine transform type used by the reflection math.
//!
//! The mirroring math reflects individual basis columns, so the transform is
//! kept as an explicit basis + origin pair rather than a packed `Mat4`.

use glam::{Mat3, Mat4, Vec3};

/// Componentwise tolerance for approximate transform comparison.
pub const APPROX_EPSILON: f32 = 1e-5;

/// A 3D affine transform: a 3x3 basis plus a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3 {
    /// Rotation/scale basis. Columns are the transformed unit axes.
    pub basis: Mat3,
    /// Translation component.
    pub origin: Vec3,
}

impl Transform3 {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        basis: Mat3::IDENTITY,
        origin: Vec3::ZERO,
    };

    /// Creates a transform from a basis and an origin.
    #[must_use]
    pub fn new(basis: Mat3, origin: Vec3) -> Self {
        Self { basis, origin }
    }

    /// Creates a pure translation.
    #[must_use]
    pub fn from_origin(origin: Vec3) -> Self {
        Self {
            basis: Mat3::IDENTITY,
            origin,
        }
    }

    /// Creates a rotation about the X axis (radians).
    #[must_use]
    pub fn from_rotation_x(angle: f32) -> Self {
        Self {
            basis: Mat3::from_rotation_x(angle),
            origin: Vec3::ZERO,
        }
    }

    /// Creates a rotation about the Y axis (radians).
    #[must_use]
    pub fn from_rotation_y(angle: f32) -> Self {
        Self {
            basis: Mat3::from_rotation_y(angle),
            origin: Vec3::ZERO,
        }
    }

    /// Creates a rotation about the Z axis (radians).
    #[must_use]
    pub fn from_rotation_z(angle: f32) -> Self {
        Self {
            basis: Mat3::from_rotation_z(angle),
            origin: Vec3::ZERO,
        }
    }

    /// Transforms a point.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.basis * point + self.origin
    }

    /// Returns the requested basis column (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub fn basis_column(&self, index: usize) -> Vec3 {
        self.basis.col(index)
    }

    /// Componentwise approximate equality within [`APPROX_EPSILON`].
    #[must_use]
    pub fn is_equal_approx(&self, other: &Self) -> bool {
        self.basis.abs_diff_eq(other.basis, APPROX_EPSILON)
            && self.origin.abs_diff_eq(other.origin, APPROX_EPSILON)
    }

    /// Expands to a homogeneous 4x4 matrix.
    #[must_use]
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols(
            self.basis.x_axis.extend(0.0),
            self.basis.y_axis.extend(0.0),
            self.basis.z_axis.extend(0.0),
            self.origin.extend(1.0),
        )
    }
}

impl Default for Transform3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Transform3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            basis: self.basis * rhs.basis,
            origin: self.basis * rhs.origin + self.origin,
        }
    }
}
