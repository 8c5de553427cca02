//! Artistic offset blending for the mirrored camera transform.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::transform::Transform3;

/// How the configured offset combines with the mirrored base transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OffsetBlendMode {
    /// Origins add; the basis multiply is applied only when a rotation
    /// offset is configured.
    #[default]
    Add,
    /// Full transform composition, relative to the mirrored pose.
    Multiply,
    /// Offset translated into the viewer camera's local axes before adding.
    ScreenSpaceShift,
}

/// Offset configuration for a reflecting surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OffsetSettings {
    /// Whether any offset is applied.
    pub enabled: bool,
    /// Translation offset, in world units (scaled by `scale`).
    pub position: Vec3,
    /// Rotation offset in degrees, applied X then Y then Z.
    pub rotation_degrees: Vec3,
    /// Multiplier for the translation offset.
    pub scale: f32,
    /// Blend policy.
    pub mode: OffsetBlendMode,
}

impl Default for OffsetSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            position: Vec3::ZERO,
            rotation_degrees: Vec3::ZERO,
            scale: 1.0,
            mode: OffsetBlendMode::Add,
        }
    }
}

/// Offset parameters that feed the cached transform, compared by value.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OffsetKey {
    position: Vec3,
    rotation_degrees: Vec3,
    scale: f32,
}

/// Applies the configured offset to a mirrored camera transform.
#[derive(Debug, Clone, Default)]
pub struct OffsetBlender {
    transform_cache: Cache<OffsetKey, Transform3>,
}

impl OffsetBlender {
    /// Creates a blender with an empty transform cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blends `base` with the configured offset.
    ///
    /// Disabled settings return `base` untouched. `ScreenSpaceShift` needs
    /// the viewer camera's basis and falls back to `base` without one.
    pub fn apply(
        &mut self,
        settings: &OffsetSettings,
        base: Transform3,
        viewer_basis: Option<Mat3>,
    ) -> Transform3 {
        if !settings.enabled {
            return base;
        }

        let offset = self.offset_transform(settings);
        let mut result = base;

        match settings.mode {
            OffsetBlendMode::Add => {
                result.origin += offset.origin;
                // An exactly-zero rotation vector skips the basis multiply
                if settings.rotation_degrees != Vec3::ZERO {
                    result.basis *= offset.basis;
                }
            }
            OffsetBlendMode::Multiply => {
                result = result * offset;
            }
            OffsetBlendMode::ScreenSpaceShift => {
                let Some(viewer_basis) = viewer_basis else {
                    return base;
                };
                result.origin += viewer_basis * offset.origin;
                result.basis *= offset.basis;
            }
        }

        result
    }

    /// The offset transform itself: X, Y, Z axis rotations composed in
    /// order, translation scaled by the offset scale. Rebuilt only when the
    /// underlying parameters change.
    pub fn offset_transform(&mut self, settings: &OffsetSettings) -> Transform3 {
        let key = OffsetKey {
            position: settings.position,
            rotation_degrees: settings.rotation_degrees,
            scale: settings.scale,
        };
        *self.transform_cache.get_or_compute(key, |key| {
            let rot = key.rotation_degrees;
            let basis = Mat3::from_rotation_x(rot.x.to_radians())
                * Mat3::from_rotation_y(rot.y.to_radians())
                * Mat3::from_rotation_z(rot.z.to_radians());
            Transform3::new(basis, key.position * key.scale)
        })
    }

    /// Drops the cached offset transform.
    pub fn invalidate(&mut self) {
        self.transform_cache.invalidate();
    }
}
