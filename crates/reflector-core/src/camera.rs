//! Camera model and host collaborator traits.
//!
//! The solver never owns scene-graph nodes. The host hands it a snapshot of
//! the viewer camera each tick and applies the solver's outputs through the
//! [`MirrorCamera`] and [`RenderTarget`] traits.

use glam::{Mat3, UVec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::params::TextureHandle;
use crate::transform::Transform3;

/// Camera projection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectionMode {
    /// Perspective projection.
    #[default]
    Perspective,
    /// Orthogonal projection.
    Orthogonal,
}

/// Per-tick snapshot of the viewer camera, supplied by the host.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    /// World transform of the viewer camera.
    pub transform: Transform3,
    /// Projection mode.
    pub projection: ProjectionMode,
    /// Vertical field of view in degrees (perspective).
    pub fov_degrees: f32,
    /// Orthogonal frustum size (orthogonal).
    pub ortho_size: f32,
    /// Visible size of the viewport the camera renders to, in pixels.
    pub viewport_size: UVec2,
}

impl CameraState {
    /// World position.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.transform.origin
    }

    /// World basis.
    #[must_use]
    pub fn basis(&self) -> Mat3 {
        self.transform.basis
    }
}

/// Projection settings for the mirrored camera, derived from the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirroredProjection {
    /// Projection mode after auto-detect / pinning rules.
    pub mode: ProjectionMode,
    /// FOV in degrees, meaningful for perspective.
    pub fov_degrees: f32,
    /// Orthogonal size (already scaled by the multiplier), meaningful for
    /// orthogonal.
    pub ortho_size: f32,
}

/// The host-owned mirrored camera node the solver drives.
pub trait MirrorCamera {
    /// Applies the mirrored world transform.
    fn set_world_transform(&mut self, transform: Transform3);
    /// Applies projection mode and FOV/size.
    fn set_projection(&mut self, projection: MirroredProjection);
}

/// The host-owned offscreen render target for the mirrored view.
pub trait RenderTarget {
    /// Resizes the target. Called only when the resolved size changed.
    fn set_size(&mut self, size: UVec2);
    /// Handle of the sampleable color texture.
    fn color_texture(&self) -> TextureHandle;
}

/// Optional editor helper that knows the preview viewport's size.
///
/// Absence is the normal game-mode path; the solver then falls back to the
/// viewer camera's own viewport size.
pub trait EditorViewportProbe {
    /// Current editor viewport size, if the probe can provide one.
    fn try_get_viewport_size(&self) -> Option<UVec2>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_state_accessors() {
        let state = CameraState {
            transform: Transform3::from_origin(Vec3::new(0.0, 5.0, 10.0)),
            projection: ProjectionMode::Perspective,
            fov_degrees: 60.0,
            ortho_size: 1.0,
            viewport_size: UVec2::new(1280, 720),
        };
        assert_eq!(state.position(), Vec3::new(0.0, 5.0, 10.0));
        assert_eq!(state.basis(), Mat3::IDENTITY);
    }
}
