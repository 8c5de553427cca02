//! Reflection plane math.
//!
//! The plane is derived from the reflecting surface's world transform: the
//! surface is rotated 90 degrees about its local X axis and the rotated Z
//! column becomes the plane normal. Points and basis vectors are mirrored across
//! the plane individually; see [`ReflectionPlane::mirror_basis_vector`] for why this is not a
//! single reflection-matrix multiply.

use glam::Vec3;

use crate::cache::{ApproxTransform, Cache};
use crate::transform::Transform3;

/// A reflection plane: unit normal plus signed distance from the origin.
///
/// Invariant: `normal` is unit length and `d = normal.dot(point_on_plane)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionPlane {
    /// Unit plane normal.
    pub normal: Vec3,
    /// Signed distance from the world origin along the normal.
    pub d: f32,
}

impl ReflectionPlane {
    /// Sentinel for a surface that is not in an active scene. Callers must
    /// check [`Self::is_valid`] before mirroring through it.
    pub const INVALID: Self = Self {
        normal: Vec3::ZERO,
        d: 0.0,
    };

    /// Builds the plane for a reflecting surface's world transform.
    ///
    /// The transform is rotated 90 degrees about local X and the rotated Z
    /// column is normalized, so the normal runs along the surface's negated
    /// up axis (an identity surface yields `-Y`). The mirroring math is
    /// insensitive to which side the normal points.
    #[must_use]
    pub fn from_surface_transform(surface: &Transform3) -> Self {
        let rotated = *surface * Transform3::from_rotation_x(std::f32::consts::FRAC_PI_2);
        let origin = rotated.origin;
        let normal = rotated.basis_column(2).normalize();
        Self {
            normal,
            d: origin.dot(normal),
        }
    }

    /// Whether this plane carries usable geometry.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.normal != Vec3::ZERO
    }

    /// Orthogonal projection of `point` onto the plane.
    #[must_use]
    pub fn project(&self, point: Vec3) -> Vec3 {
        point - (point.dot(self.normal) - self.d) * self.normal
    }

    /// Mirrors `point` across the plane by reflecting it through its
    /// projection.
    #[must_use]
    pub fn mirror_point(&self, point: Vec3) -> Vec3 {
        let projected = self.project(point);
        point + (projected - point) * 2.0
    }

    /// Mirrors a basis vector by bouncing it off the plane normal.
    ///
    /// The input is normalized, bounced (`v - 2(v.n)n`) and normalized
    /// again. Mirroring a basis column-by-column this way can leave the
    /// resulting basis slightly non-orthogonal; downstream consumers
    /// tolerate that rather than re-orthogonalizing, which would visibly
    /// change the reflection.
    #[must_use]
    pub fn mirror_basis_vector(&self, v: Vec3) -> Vec3 {
        let v = v.normalize();
        let bounced = v - 2.0 * v.dot(self.normal) * self.normal;
        bounced.normalize()
    }
}

impl Default for ReflectionPlane {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Caches the derived plane until the surface transform moves.
#[derive(Debug, Clone, Default)]
pub struct PlaneCache {
    cache: Cache<ApproxTransform, ReflectionPlane>,
}

impl PlaneCache {
    /// Creates an empty plane cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the plane for `surface`, recomputing only when the transform
    /// changed since the last call.
    pub fn plane_for(&mut self, surface: &Transform3) -> ReflectionPlane {
        *self
            .cache
            .get_or_compute(ApproxTransform(*surface), |key| {
                ReflectionPlane::from_surface_transform(&key.0)
            })
    }

    /// Forces recomputation on the next lookup.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}
